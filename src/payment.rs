// Payment step
// Simulated gateway behind an async trait, and the per-booking payment state machine

use crate::catalog::HotelInfo;
use crate::handoff::HandoffRecord;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("A payment for this booking is already in progress")]
    AlreadyProcessing,

    #[error("This booking has already been paid")]
    AlreadyCompleted,

    #[error("Payment cancelled")]
    Cancelled,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub cardholder_name: String,
    pub number: String,
    pub expiry: String,
    pub cvc: String,
}

// Keep card numbers and CVCs out of logs
impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("cardholder_name", &self.cardholder_name)
            .field("last_four", &last_four_digits(&self.number))
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

// Accepted as typed; nothing here is checked against a card network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentInstrument {
    Card(CardDetails),
    PayPal,
}

impl PaymentInstrument {
    pub fn card(cardholder_name: &str, number: &str, expiry: &str, cvc: &str) -> Self {
        PaymentInstrument::Card(CardDetails {
            cardholder_name: cardholder_name.to_string(),
            number: number.to_string(),
            expiry: expiry.to_string(),
            cvc: cvc.to_string(),
        })
    }

    pub fn label(&self) -> String {
        match self {
            PaymentInstrument::Card(card) => match last_four_digits(&card.number) {
                Some(last_four) => format!("Card ending {}", last_four),
                None => "Card".to_string(),
            },
            PaymentInstrument::PayPal => "PayPal".to_string(),
        }
    }

    pub fn payer_name(&self) -> Option<&str> {
        match self {
            PaymentInstrument::Card(card) => {
                Some(card.cardholder_name.trim()).filter(|name| !name.is_empty())
            }
            PaymentInstrument::PayPal => None,
        }
    }
}

fn last_four_digits(number: &str) -> Option<String> {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits[digits.len().saturating_sub(4)..].iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: u64,
    pub currency: String,
    pub instrument: PaymentInstrument,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub reference: String,
    pub amount: u64,
    pub currency: String,
}

// Seam for a real payment backend; the session state machine only sees this trait
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError>;
}

// Waits a fixed latency and always approves
#[derive(Debug)]
pub struct SimulatedGateway {
    latency: Duration,
    charges: AtomicUsize,
}

impl SimulatedGateway {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            charges: AtomicUsize::new(0),
        }
    }

    pub fn charges_made(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        debug!(
            amount = request.amount,
            currency = %request.currency,
            instrument = %request.instrument.label(),
            latency_ms = self.latency.as_millis() as u64,
            "simulating payment"
        );
        tokio::time::sleep(self.latency).await;

        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeReceipt {
            reference: generate_reference(),
            amount: request.amount,
            currency: request.currency.clone(),
        })
    }
}

pub const REFERENCE_PREFIX: &str = "RC-";
const REFERENCE_LEN: usize = 8;
// No 0/O or 1/I so references survive being read out over the phone
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// Display reference; not checked for collisions
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..REFERENCE_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", REFERENCE_PREFIX, code)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub reference: String,
    pub hotel_name: String,
    pub guest_name: String,
    pub room_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub total_price: u64,
    pub currency: String,
    pub paid_with: String,
    pub issued_at: DateTime<Utc>,
}

// Booking review shown next to the payment form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub room_name: String,
    pub nights: u32,
    pub guest_count: u8,
    pub room_subtotal: u64,
    // Already included in the total
    pub taxes: u64,
    pub total: u64,
    pub currency: String,
}

impl PaymentSummary {
    pub fn new(record: &HandoffRecord, tax_rate_percent: u32) -> Self {
        Self {
            room_name: record.room_name.clone(),
            nights: record.nights,
            guest_count: record.guest_count,
            room_subtotal: u64::from(record.price_per_night) * u64::from(record.nights),
            // Rounded half up
            taxes: (record.total_price * u64::from(tax_rate_percent) + 50) / 100,
            total: record.total_price,
            currency: record.currency.clone(),
        }
    }

    pub fn pay_label(&self) -> String {
        format!("Pay {} {}", self.currency, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPhase {
    Idle,
    Processing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    Processing,
    Succeeded(Confirmation),
    // The instrument is kept so the form can be shown again as the user left it
    Failed {
        error: PaymentError,
        instrument: PaymentInstrument,
    },
}

impl PaymentState {
    pub fn phase(&self) -> PaymentPhase {
        match self {
            PaymentState::Idle => PaymentPhase::Idle,
            PaymentState::Processing => PaymentPhase::Processing,
            PaymentState::Succeeded(_) => PaymentPhase::Succeeded,
            PaymentState::Failed { .. } => PaymentPhase::Failed,
        }
    }
}

// One payment attempt for one handed-off booking
pub struct PaymentSession<G: PaymentGateway + ?Sized> {
    record: HandoffRecord,
    hotel: HotelInfo,
    tax_rate_percent: u32,
    gateway: Arc<G>,
    state: Mutex<PaymentState>,
    phase_tx: watch::Sender<PaymentPhase>,
}

impl<G: PaymentGateway + ?Sized> PaymentSession<G> {
    pub fn new(record: HandoffRecord, gateway: Arc<G>, hotel: HotelInfo, tax_rate_percent: u32) -> Self {
        let (phase_tx, _) = watch::channel(PaymentPhase::Idle);
        Self {
            record,
            hotel,
            tax_rate_percent,
            gateway,
            state: Mutex::new(PaymentState::Idle),
            phase_tx,
        }
    }

    pub fn record(&self) -> &HandoffRecord {
        &self.record
    }

    pub fn summary(&self) -> PaymentSummary {
        PaymentSummary::new(&self.record, self.tax_rate_percent)
    }

    pub fn state(&self) -> PaymentState {
        self.state.lock().clone()
    }

    pub fn phase(&self) -> PaymentPhase {
        self.state.lock().phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentPhase> {
        self.phase_tx.subscribe()
    }

    // What to pre-fill the form with after a failed attempt
    pub fn last_instrument(&self) -> Option<PaymentInstrument> {
        match &*self.state.lock() {
            PaymentState::Failed { instrument, .. } => Some(instrument.clone()),
            _ => None,
        }
    }

    pub async fn pay(&self, instrument: PaymentInstrument) -> Result<Confirmation, PaymentError> {
        self.pay_or_cancel(instrument, futures::future::pending::<()>())
            .await
    }

    // Like `pay`, but gives up and returns to Idle if `cancel` resolves first
    pub async fn pay_or_cancel<F>(
        &self,
        instrument: PaymentInstrument,
        cancel: F,
    ) -> Result<Confirmation, PaymentError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut attempt = self.begin_processing()?;

        let request = ChargeRequest {
            amount: self.record.total_price,
            currency: self.record.currency.clone(),
            instrument: instrument.clone(),
            description: format!(
                "{}: {} x{} nights from {}",
                self.hotel.name, self.record.room_name, self.record.nights, self.record.check_in
            ),
        };

        let outcome = tokio::select! {
            result = self.gateway.charge(&request) => Some(result),
            _ = cancel => None,
        };

        match outcome {
            None => {
                info!(room_id = %self.record.room_id, "payment cancelled before completion");
                attempt.settle(PaymentState::Idle);
                Err(PaymentError::Cancelled)
            }
            Some(Ok(receipt)) => {
                let confirmation = self.confirm(receipt, &instrument);
                info!(
                    reference = %confirmation.reference,
                    total_price = confirmation.total_price,
                    currency = %confirmation.currency,
                    "payment succeeded"
                );
                attempt.settle(PaymentState::Succeeded(confirmation.clone()));
                Ok(confirmation)
            }
            Some(Err(error)) => {
                warn!(error = %error, room_id = %self.record.room_id, "payment failed");
                attempt.settle(PaymentState::Failed {
                    error: error.clone(),
                    instrument,
                });
                Err(error)
            }
        }
    }

    fn begin_processing(&self) -> Result<Attempt<'_, G>, PaymentError> {
        {
            let mut state = self.state.lock();
            match *state {
                PaymentState::Processing => return Err(PaymentError::AlreadyProcessing),
                PaymentState::Succeeded(_) => return Err(PaymentError::AlreadyCompleted),
                PaymentState::Idle | PaymentState::Failed { .. } => {
                    *state = PaymentState::Processing;
                }
            }
        }
        debug!(room_id = %self.record.room_id, "payment processing");
        self.phase_tx.send_replace(PaymentPhase::Processing);
        Ok(Attempt {
            session: self,
            settled: false,
        })
    }

    fn set_state(&self, state: PaymentState) {
        let phase = state.phase();
        *self.state.lock() = state;
        self.phase_tx.send_replace(phase);
    }

    fn confirm(&self, receipt: ChargeReceipt, instrument: &PaymentInstrument) -> Confirmation {
        Confirmation {
            reference: receipt.reference,
            hotel_name: self.hotel.name.to_string(),
            guest_name: instrument.payer_name().unwrap_or("Guest").to_string(),
            room_name: self.record.room_name.clone(),
            check_in: self.record.check_in,
            check_out: self.record.check_out,
            nights: self.record.nights,
            total_price: receipt.amount,
            currency: receipt.currency,
            paid_with: instrument.label(),
            issued_at: Utc::now(),
        }
    }
}

// An in-flight charge. Dropped unsettled (the paying future was dropped), it puts the session back to Idle
struct Attempt<'a, G: PaymentGateway + ?Sized> {
    session: &'a PaymentSession<G>,
    settled: bool,
}

impl<G: PaymentGateway + ?Sized> Attempt<'_, G> {
    fn settle(&mut self, state: PaymentState) {
        self.settled = true;
        self.session.set_state(state);
    }
}

impl<G: PaymentGateway + ?Sized> Drop for Attempt<'_, G> {
    fn drop(&mut self) {
        if !self.settled {
            info!(room_id = %self.session.record.room_id, "payment abandoned before completion");
            self.session.set_state(PaymentState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HOTEL;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;
    use test_case::test_case;

    fn record() -> HandoffRecord {
        HandoffRecord {
            room_id: "standard".to_string(),
            check_in: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            guest_count: 2,
            room_name: "Heritage Classic".to_string(),
            price_per_night: 35,
            nights: 3,
            total_price: 105,
            currency: "OMR".to_string(),
        }
    }

    fn visa() -> PaymentInstrument {
        PaymentInstrument::card("Priya Sundaram", "4242 4242 4242 4242", "12/27", "123")
    }

    // Declines a fixed number of charges, then approves
    struct FlakyGateway {
        declines_left: AtomicU32,
    }

    #[async_trait]
    impl PaymentGateway for FlakyGateway {
        async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
            let left = self.declines_left.load(Ordering::SeqCst);
            if left > 0 {
                self.declines_left.store(left - 1, Ordering::SeqCst);
                return Err(PaymentError::Declined("insufficient funds".to_string()));
            }
            Ok(ChargeReceipt {
                reference: "RC-TESTTEST".to_string(),
                amount: request.amount,
                currency: request.currency.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_simulated_payment_succeeds() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(10)));
        let session = PaymentSession::new(record(), gateway.clone(), HOTEL, 12);
        assert_eq!(session.phase(), PaymentPhase::Idle);

        let confirmation = session.pay(visa()).await.unwrap();
        assert_eq!(confirmation.total_price, 105);
        assert_eq!(confirmation.currency, "OMR");
        assert_eq!(confirmation.nights, 3);
        assert_eq!(confirmation.room_name, "Heritage Classic");
        assert_eq!(confirmation.guest_name, "Priya Sundaram");
        assert_eq!(confirmation.hotel_name, "The Royal Chettinad");
        assert_eq!(confirmation.paid_with, "Card ending 4242");
        assert!(confirmation.reference.starts_with(REFERENCE_PREFIX));

        assert_eq!(session.phase(), PaymentPhase::Succeeded);
        assert_eq!(session.state(), PaymentState::Succeeded(confirmation));
        assert_eq!(gateway.charges_made(), 1);
    }

    #[tokio::test]
    async fn test_paid_session_rejects_second_payment() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::ZERO));
        let session = PaymentSession::new(record(), gateway.clone(), HOTEL, 12);

        session.pay(PaymentInstrument::PayPal).await.unwrap();
        assert_eq!(
            session.pay(PaymentInstrument::PayPal).await,
            Err(PaymentError::AlreadyCompleted)
        );
        assert_eq!(gateway.charges_made(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submit_rejected_while_processing() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(50)));
        let session = PaymentSession::new(record(), gateway.clone(), HOTEL, 12);

        let (first, second) = tokio::join!(session.pay(visa()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.pay(visa()).await
        });

        assert!(first.is_ok());
        assert_eq!(second, Err(PaymentError::AlreadyProcessing));
        assert_eq!(gateway.charges_made(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_instrument_and_allows_retry() {
        let gateway = Arc::new(FlakyGateway {
            declines_left: AtomicU32::new(1),
        });
        let session = PaymentSession::new(record(), gateway, HOTEL, 12);

        let error = session.pay(visa()).await.unwrap_err();
        assert_eq!(error, PaymentError::Declined("insufficient funds".to_string()));
        assert_eq!(session.phase(), PaymentPhase::Failed);
        assert_eq!(session.last_instrument(), Some(visa()));

        let confirmation = session.pay(session.last_instrument().unwrap()).await.unwrap();
        assert_eq!(confirmation.reference, "RC-TESTTEST");
        assert_eq!(session.phase(), PaymentPhase::Succeeded);
        assert_eq!(session.last_instrument(), None);
    }

    #[tokio::test]
    async fn test_cancel_returns_to_idle() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_secs(30)));
        let session = PaymentSession::new(record(), gateway.clone(), HOTEL, 12);

        let result = session
            .pay_or_cancel(visa(), tokio::time::sleep(Duration::from_millis(10)))
            .await;
        assert_eq!(result, Err(PaymentError::Cancelled));
        assert_eq!(session.phase(), PaymentPhase::Idle);
        assert_eq!(gateway.charges_made(), 0);
    }

    #[tokio::test]
    async fn test_dropped_payment_returns_to_idle() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(200)));
        let session = PaymentSession::new(record(), gateway.clone(), HOTEL, 12);
        let mut phases = session.subscribe();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            session.pay(PaymentInstrument::PayPal),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(session.phase(), PaymentPhase::Idle);
        assert_eq!(*phases.borrow_and_update(), PaymentPhase::Idle);
        assert_eq!(gateway.charges_made(), 0);

        let confirmation = session.pay(PaymentInstrument::PayPal).await.unwrap();
        assert_eq!(confirmation.total_price, 105);
        assert_eq!(session.phase(), PaymentPhase::Succeeded);
        assert_eq!(gateway.charges_made(), 1);
    }

    #[tokio::test]
    async fn test_phase_notifications() {
        let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(30)));
        let session = PaymentSession::new(record(), gateway, HOTEL, 12);
        let mut phases = session.subscribe();
        assert_eq!(*phases.borrow(), PaymentPhase::Idle);

        let watcher = async {
            phases.changed().await.unwrap();
            let seen = *phases.borrow_and_update();
            seen
        };
        let (seen, paid) = tokio::join!(watcher, session.pay(PaymentInstrument::PayPal));

        assert_eq!(seen, PaymentPhase::Processing);
        assert!(paid.is_ok());
        assert_eq!(*phases.borrow(), PaymentPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_paypal_payer_is_guest() {
        let session = PaymentSession::new(
            record(),
            Arc::new(SimulatedGateway::new(Duration::ZERO)),
            HOTEL,
            12,
        );
        let confirmation = session.pay(PaymentInstrument::PayPal).await.unwrap();
        assert_eq!(confirmation.guest_name, "Guest");
        assert_eq!(confirmation.paid_with, "PayPal");
    }

    #[test]
    fn test_summary_with_taxes() {
        let summary = PaymentSummary::new(&record(), 12);
        assert_eq!(summary.room_subtotal, 105);
        // 105 * 0.12 = 12.6
        assert_eq!(summary.taxes, 13);
        assert_eq!(summary.total, 105);
        assert_eq!(summary.pay_label(), "Pay OMR 105");
    }

    #[test_case("4242 4242 4242 4242", "Card ending 4242"; "spaced number")]
    #[test_case("12", "Card ending 12"; "short number")]
    #[test_case("", "Card"; "blank number")]
    #[test_case("abcd-9876", "Card ending 9876"; "junk mixed in")]
    fn test_card_label(number: &str, expected: &str) {
        assert_eq!(PaymentInstrument::card("A", number, "", "").label(), expected);
    }

    #[test]
    fn test_blank_cardholder_falls_back() {
        assert_eq!(PaymentInstrument::card("   ", "1", "", "").payer_name(), None);
    }

    #[test]
    fn test_card_debug_hides_secrets() {
        let rendered = format!("{:?}", visa());
        assert!(!rendered.contains("4242 4242 4242 4242"));
        assert!(!rendered.contains("123"));
        assert!(rendered.contains("Priya Sundaram"));
    }

    #[test]
    fn test_reference_format_and_spread() {
        let references: HashSet<String> = (0..1000).map(|_| generate_reference()).collect();
        assert!(references.len() > 990);
        for reference in &references {
            assert_eq!(reference.len(), REFERENCE_PREFIX.len() + REFERENCE_LEN);
            assert!(reference[REFERENCE_PREFIX.len()..]
                .bytes()
                .all(|b| REFERENCE_ALPHABET.contains(&b)));
        }
    }
}
