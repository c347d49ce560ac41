// Booking flow
// Selection -> payment -> confirmation, wired together over an injected handoff store

use crate::catalog::{Catalog, HotelInfo, HOTEL};
use crate::clock::{Clock, SystemClock};
use crate::config::FlowConfig;
use crate::draft::{compute_draft, BookingDraft, BookingInput, SubmitBlocker};
use crate::handoff::{HandoffError, HandoffRecord, HandoffStore, SessionSlot};
use crate::payment::{PaymentGateway, PaymentSession, SimulatedGateway};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Selection,
    Payment,
    Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    // Submit was a no-op; the form stays as it is
    Blocked(Vec<SubmitBlocker>),
    AdvanceToPayment(HandoffRecord),
}

impl SelectionOutcome {
    pub fn next_step(&self) -> Step {
        match self {
            SelectionOutcome::Blocked(_) => Step::Selection,
            SelectionOutcome::AdvanceToPayment(_) => Step::Payment,
        }
    }
}

// Payment step reached without a usable handoff
#[derive(Debug)]
pub struct Redirect {
    pub to: Step,
    pub reason: HandoffError,
}

pub struct BookingFlow<S: HandoffStore, G: PaymentGateway + ?Sized> {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    store: Arc<S>,
    gateway: Arc<G>,
    hotel: HotelInfo,
    config: FlowConfig,
}

impl BookingFlow<SessionSlot, SimulatedGateway> {
    // Built-in rooms, wall-clock dates, in-memory slot and the always-approving gateway
    pub fn simulated(config: FlowConfig) -> Self {
        Self::new(
            Arc::new(Catalog::builtin().clone()),
            Arc::new(SystemClock),
            Arc::new(SessionSlot::new(config.handoff_ttl)),
            Arc::new(SimulatedGateway::new(config.payment_latency)),
            config,
        )
    }
}

impl<S: HandoffStore, G: PaymentGateway + ?Sized> BookingFlow<S, G> {
    pub fn new(
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        store: Arc<S>,
        gateway: Arc<G>,
        config: FlowConfig,
    ) -> Self {
        Self {
            catalog,
            clock,
            store,
            gateway,
            hotel: HOTEL,
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    // Live summary for the selection page
    pub fn preview(&self, input: &BookingInput) -> BookingDraft {
        compute_draft(&self.catalog, input)
    }

    pub fn blockers(&self, input: &BookingInput) -> Vec<SubmitBlocker> {
        self.preview(input)
            .blockers(&self.catalog, self.clock.today())
    }

    // Writes the handoff and signals the move to payment, or reports why it can't yet
    pub async fn submit_selection(
        &self,
        input: &BookingInput,
    ) -> Result<SelectionOutcome, HandoffError> {
        let draft = self.preview(input);
        let stay = match draft.check(&self.catalog, self.clock.today()) {
            Ok(stay) => stay,
            Err(blockers) => {
                debug!(?blockers, "selection submit ignored");
                return Ok(SelectionOutcome::Blocked(blockers));
            }
        };
        let record = HandoffRecord::new(&draft, &stay, self.hotel.currency);

        if !self.config.submit_delay.is_zero() {
            tokio::time::sleep(self.config.submit_delay).await;
        }

        self.store.put(&record)?;
        info!(
            room_id = %record.room_id,
            check_in = %record.check_in,
            nights = record.nights,
            total_price = record.total_price,
            "selection accepted, advancing to payment"
        );
        Ok(SelectionOutcome::AdvanceToPayment(record))
    }

    // Consumes the stored booking; without one the caller goes back to selection
    pub fn open_payment(&self) -> Result<PaymentSession<G>, Redirect> {
        match self.store.take() {
            Ok(record) => {
                debug!(room_id = %record.room_id, "payment step opened");
                Ok(PaymentSession::new(
                    record,
                    self.gateway.clone(),
                    self.hotel,
                    self.config.tax_rate_percent,
                ))
            }
            Err(reason) => {
                info!(%reason, "payment step without a booking, returning to selection");
                Err(Redirect {
                    to: Step::Selection,
                    reason,
                })
            }
        }
    }

    pub fn abandon(&self) {
        self.store.clear();
    }
}
