// Transient handoff store
// A single slot carrying one submitted draft from the selection step to the payment step

use crate::draft::{BookingDraft, ReadyStay};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("No booking is waiting for payment")]
    Missing,

    #[error("Stored booking expired after {0:?}")]
    Expired(Duration),

    #[error("Stored booking is unreadable: {0}")]
    Corrupt(String),

    #[error("Booking could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

// The payload written at submission: the draft plus what the payment page needs to render it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(rename = "guests")]
    pub guest_count: u8,
    pub room_name: String,
    pub price_per_night: u32,
    pub nights: u32,
    pub total_price: u64,
    pub currency: String,
}

impl HandoffRecord {
    pub fn new(draft: &BookingDraft, stay: &ReadyStay<'_>, currency: &str) -> Self {
        Self {
            room_id: stay.room.id.clone(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            guest_count: draft.guest_count,
            room_name: stay.room.name.clone(),
            price_per_night: stay.room.price_per_night,
            nights: draft.nights,
            total_price: draft.total_price,
            currency: currency.to_string(),
        }
    }
}

pub trait HandoffStore: Send + Sync + 'static {
    // Replaces whatever was stored before
    fn put(&self, record: &HandoffRecord) -> Result<(), HandoffError>;

    // Destructive read; a second take without a new put reports Missing
    fn take(&self) -> Result<HandoffRecord, HandoffError>;

    // Drop any stored booking, e.g. when the user abandons the flow
    fn clear(&self);
}

struct SlotEntry {
    payload: String,
    stored_at: Instant,
}

// In-process stand-in for per-tab session storage
pub struct SessionSlot {
    entry: Mutex<Option<SlotEntry>>,
    ttl: Option<Duration>,
}

impl SessionSlot {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entry: Mutex::new(None),
            ttl,
        }
    }

    // True only when a take() would hand back a booking that has not expired
    pub fn is_occupied(&self) -> bool {
        self.entry
            .lock()
            .as_ref()
            .map_or(false, |entry| !self.is_expired(entry))
    }

    fn is_expired(&self, entry: &SlotEntry) -> bool {
        self.ttl.map_or(false, |ttl| entry.stored_at.elapsed() > ttl)
    }

    fn put_payload(&self, payload: String) {
        *self.entry.lock() = Some(SlotEntry {
            payload,
            stored_at: Instant::now(),
        });
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HandoffStore for SessionSlot {
    fn put(&self, record: &HandoffRecord) -> Result<(), HandoffError> {
        let payload = serde_json::to_string(record)?;
        debug!(
            room_id = %record.room_id,
            nights = record.nights,
            total_price = record.total_price,
            "storing booking for payment"
        );
        self.put_payload(payload);
        Ok(())
    }

    fn take(&self) -> Result<HandoffRecord, HandoffError> {
        let entry = self.entry.lock().take().ok_or_else(|| {
            debug!("no booking waiting in handoff slot");
            HandoffError::Missing
        })?;

        if let Some(ttl) = self.ttl.filter(|_| self.is_expired(&entry)) {
            warn!(?ttl, "discarding expired booking from handoff slot");
            return Err(HandoffError::Expired(ttl));
        }

        serde_json::from_str(&entry.payload).map_err(|e| {
            warn!(error = %e, "discarding unreadable booking from handoff slot");
            HandoffError::Corrupt(e.to_string())
        })
    }

    fn clear(&self) {
        if self.entry.lock().take().is_some() {
            debug!("handoff slot cleared");
        }
    }
}
