// Runs one booking from room selection to confirmation against the simulated gateway

use chrono::Days;
use hotel_reservation::{
    BookingFlow, BookingInput, Clock, FlowConfig, PaymentInstrument, SelectionOutcome, SystemClock,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = FlowConfig::from_env()?;
    let flow = BookingFlow::simulated(config);

    // Nothing submitted yet, so payment sends us back
    if let Err(redirect) = flow.open_payment() {
        tracing::info!(to = ?redirect.to, "payment opened too early: {}", redirect.reason);
    }

    let check_in = SystemClock
        .today()
        .checked_add_days(Days::new(30))
        .ok_or_else(|| anyhow::anyhow!("check-in date out of range"))?;
    let check_out = check_in
        .checked_add_days(Days::new(3))
        .ok_or_else(|| anyhow::anyhow!("check-out date out of range"))?;

    let input = BookingInput::for_room("standard").with_dates(check_in, check_out);
    let draft = flow.preview(&input);
    tracing::info!(nights = draft.nights, total_price = draft.total_price, "draft ready");

    let record = match flow.submit_selection(&input).await? {
        SelectionOutcome::AdvanceToPayment(record) => record,
        SelectionOutcome::Blocked(blockers) => {
            for blocker in &blockers {
                tracing::warn!("cannot submit: {}", blocker);
            }
            anyhow::bail!("selection was blocked");
        }
    };
    tracing::info!(room = %record.room_name, "handed off to payment");

    let session = flow
        .open_payment()
        .map_err(|redirect| anyhow::anyhow!("no booking to pay for: {}", redirect.reason))?;
    let summary = session.summary();
    tracing::info!(
        subtotal = summary.room_subtotal,
        taxes = summary.taxes,
        "{}",
        summary.pay_label()
    );

    let instrument =
        PaymentInstrument::card("James Wilson", "4000 0000 0000 0002", "09/28", "321");
    let confirmation = session.pay(instrument).await?;

    println!("{}", serde_json::to_string_pretty(&confirmation)?);
    Ok(())
}
