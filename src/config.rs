// Booking flow configuration

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

pub const SUBMIT_DELAY_MS_VAR: &str = "BOOKING_SUBMIT_DELAY_MS";
pub const PAYMENT_LATENCY_MS_VAR: &str = "BOOKING_PAYMENT_LATENCY_MS";
pub const HANDOFF_TTL_SECS_VAR: &str = "BOOKING_HANDOFF_TTL_SECS";
pub const TAX_RATE_PERCENT_VAR: &str = "BOOKING_TAX_RATE_PERCENT";

#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    // Pause between a valid selection submit and the handoff write
    pub submit_delay: Duration,
    // Latency of the simulated payment gateway
    pub payment_latency: Duration,
    // None keeps a stored draft until it is taken
    pub handoff_ttl: Option<Duration>,
    // Display-only; the nightly prices already include taxes
    pub tax_rate_percent: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            submit_delay: Duration::from_millis(1500),
            payment_latency: Duration::from_millis(2000),
            handoff_ttl: Some(Duration::from_secs(30 * 60)),
            tax_rate_percent: 12,
        }
    }
}

impl FlowConfig {
    // Same as `default()` with any BOOKING_* variables applied on top
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, SUBMIT_DELAY_MS_VAR)? {
            config.submit_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, PAYMENT_LATENCY_MS_VAR)? {
            config.payment_latency = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, HANDOFF_TTL_SECS_VAR)? {
            config.handoff_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(rate) = parse_var::<u32, _>(&lookup, TAX_RATE_PERCENT_VAR)? {
            if rate > 100 {
                return Err(ConfigError::InvalidValue {
                    key: TAX_RATE_PERCENT_VAR,
                    value: rate.to_string(),
                });
            }
            config.tax_rate_percent = rate;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = FlowConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.tax_rate_percent, 12);
    }

    #[test]
    fn test_overrides_applied() {
        let config = FlowConfig::from_lookup(lookup_from(&[
            (SUBMIT_DELAY_MS_VAR, "0"),
            (PAYMENT_LATENCY_MS_VAR, " 250 "),
            (HANDOFF_TTL_SECS_VAR, "60"),
            (TAX_RATE_PERCENT_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.submit_delay, Duration::ZERO);
        assert_eq!(config.payment_latency, Duration::from_millis(250));
        assert_eq!(config.handoff_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.tax_rate_percent, 5);
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = FlowConfig::from_lookup(lookup_from(&[(HANDOFF_TTL_SECS_VAR, "0")])).unwrap();
        assert_eq!(config.handoff_ttl, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = FlowConfig::from_lookup(lookup_from(&[(PAYMENT_LATENCY_MS_VAR, "fast")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: PAYMENT_LATENCY_MS_VAR,
                value: "fast".to_string()
            }
        );

        let err = FlowConfig::from_lookup(lookup_from(&[(TAX_RATE_PERCENT_VAR, "150")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == TAX_RATE_PERCENT_VAR));
    }
}
