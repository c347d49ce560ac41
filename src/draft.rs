// Booking draft builder
// Turns the raw selection form into a draft with nights and price derived

use crate::catalog::{Catalog, RoomOffering};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_GUESTS: u8 = 1;
pub const MAX_GUESTS: u8 = 4;
pub const DEFAULT_GUESTS: u8 = 2;

// What the selection form currently holds, every field optional while the user is editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub room_id: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guest_count: u8,
}

impl Default for BookingInput {
    fn default() -> Self {
        Self {
            room_id: None,
            check_in: None,
            check_out: None,
            guest_count: DEFAULT_GUESTS,
        }
    }
}

impl BookingInput {
    // Form pre-filled from a room deep link; an empty id leaves the room unselected
    pub fn for_room(room_id: &str) -> Self {
        Self {
            room_id: Some(room_id.to_string()).filter(|id| !id.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_dates(mut self, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        self.check_in = Some(check_in);
        self.check_out = Some(check_out);
        self
    }

    pub fn with_guests(mut self, guest_count: u8) -> Self {
        self.guest_count = guest_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub room_id: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guest_count: u8,
    pub nights: u32,
    pub total_price: u64,
}

// A draft that passed every submission check, with its room and dates resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyStay<'a> {
    pub room: &'a RoomOffering,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

// Reasons the "proceed to payment" action is disabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlocker {
    MissingRoom,
    UnknownRoom(String),
    MissingCheckIn,
    MissingCheckOut,
    NoNights,
    CheckInInPast { check_in: NaiveDate, today: NaiveDate },
    GuestCountOutOfRange(u8),
    OverCapacity { guests: u8, capacity: u8 },
}

impl fmt::Display for SubmitBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitBlocker::MissingRoom => write!(f, "Please select a room"),
            SubmitBlocker::UnknownRoom(id) => write!(f, "Room {} is not offered", id),
            SubmitBlocker::MissingCheckIn => write!(f, "Check-in date is required"),
            SubmitBlocker::MissingCheckOut => write!(f, "Check-out date is required"),
            SubmitBlocker::NoNights => write!(f, "Check-out must be after check-in"),
            SubmitBlocker::CheckInInPast { check_in, today } => {
                write!(f, "Check-in {} is before today ({})", check_in, today)
            }
            SubmitBlocker::GuestCountOutOfRange(n) => write!(
                f,
                "Guest count {} must be between {} and {}",
                n, MIN_GUESTS, MAX_GUESTS
            ),
            SubmitBlocker::OverCapacity { guests, capacity } => write!(
                f,
                "{} guests exceed the room capacity of {}",
                guests, capacity
            ),
        }
    }
}

// Whole nights between two calendar dates, zero unless check-out is strictly later
pub fn stay_nights(check_in: NaiveDate, check_out: NaiveDate) -> u32 {
    let days = (check_out - check_in).num_days();
    u32::try_from(days.max(0)).unwrap_or(0)
}

// Recomputed by the caller on every form change
pub fn compute_draft(catalog: &Catalog, input: &BookingInput) -> BookingDraft {
    let nights = match (input.check_in, input.check_out) {
        (Some(check_in), Some(check_out)) => stay_nights(check_in, check_out),
        _ => 0,
    };

    let total_price = input
        .room_id
        .as_deref()
        .and_then(|id| catalog.find(id))
        .map_or(0, |room| u64::from(nights) * u64::from(room.price_per_night));

    BookingDraft {
        room_id: input.room_id.clone(),
        check_in: input.check_in,
        check_out: input.check_out,
        guest_count: input.guest_count,
        nights,
        total_price,
    }
}

// First check-out date worth offering in the calendar
pub fn earliest_check_out(check_in: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    match check_in {
        Some(date) => date.succ_opt().unwrap_or(date),
        None => today,
    }
}

impl BookingDraft {
    // Empty when the draft may be handed to the payment step
    pub fn blockers(&self, catalog: &Catalog, today: NaiveDate) -> Vec<SubmitBlocker> {
        self.check(catalog, today).err().unwrap_or_default()
    }

    // Resolves the room and dates once; Err always carries at least one blocker
    pub fn check<'a>(
        &self,
        catalog: &'a Catalog,
        today: NaiveDate,
    ) -> Result<ReadyStay<'a>, Vec<SubmitBlocker>> {
        let mut blockers = Vec::new();

        let room = match self.room_id.as_deref() {
            None => {
                blockers.push(SubmitBlocker::MissingRoom);
                None
            }
            Some(id) => {
                let room = catalog.find(id);
                if room.is_none() {
                    blockers.push(SubmitBlocker::UnknownRoom(id.to_string()));
                }
                room
            }
        };

        match self.check_in {
            None => blockers.push(SubmitBlocker::MissingCheckIn),
            Some(check_in) if check_in < today => {
                blockers.push(SubmitBlocker::CheckInInPast { check_in, today })
            }
            Some(_) => {}
        }

        if self.check_out.is_none() {
            blockers.push(SubmitBlocker::MissingCheckOut);
        }

        if self.check_in.is_some() && self.check_out.is_some() && self.nights == 0 {
            blockers.push(SubmitBlocker::NoNights);
        }

        if !(MIN_GUESTS..=MAX_GUESTS).contains(&self.guest_count) {
            blockers.push(SubmitBlocker::GuestCountOutOfRange(self.guest_count));
        } else if let Some(room) = room {
            if self.guest_count > room.capacity {
                blockers.push(SubmitBlocker::OverCapacity {
                    guests: self.guest_count,
                    capacity: room.capacity,
                });
            }
        }

        match (room, self.check_in, self.check_out) {
            (Some(room), Some(check_in), Some(check_out)) if blockers.is_empty() => Ok(ReadyStay {
                room,
                check_in,
                check_out,
            }),
            _ => Err(blockers),
        }
    }

    pub fn can_submit(&self, catalog: &Catalog, today: NaiveDate) -> bool {
        self.blockers(catalog, today).is_empty()
    }
}
