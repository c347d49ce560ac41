// Booking core for The Royal Chettinad's reservation pages:
// room selection, the handoff to payment, and the simulated payment itself

pub mod catalog;
pub mod clock;
pub mod config;
pub mod draft;
pub mod flow;
pub mod handoff;
pub mod payment;

// Re-export key types for convenience
pub use catalog::{Catalog, CatalogError, HotelInfo, RoomOffering, HOTEL};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, FlowConfig};
pub use draft::{compute_draft, BookingDraft, BookingInput, ReadyStay, SubmitBlocker};
pub use flow::{BookingFlow, Redirect, SelectionOutcome, Step};
pub use handoff::{HandoffError, HandoffRecord, HandoffStore, SessionSlot};
pub use payment::{
    Confirmation, PaymentError, PaymentGateway, PaymentInstrument, PaymentPhase, PaymentSession,
    PaymentState, PaymentSummary, SimulatedGateway,
};
