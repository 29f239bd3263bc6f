//! Per-target UI sequences: login, account switch, and one flow per
//! report type. Each flow is a fixed step sequence bounded by explicit
//! waits; retrying on failure is the orchestrator's job.

pub mod login;
pub mod mutual_funds;
pub mod orderbook;
pub mod portfolio;
pub mod switch;
pub mod tradebook;

use std::time::Duration;

use crate::portal::Locator;

/// Fixed wait for UI transitions that expose no readiness signal.
pub(crate) async fn settle(seconds: u64) {
    tokio::time::sleep(Duration::from_secs(seconds)).await;
}

/// The portal's period filter is a radio group addressed by label, e.g.
/// `label[for='month']`; the option key is the last word of the
/// configured period ("1 Month" -> "month").
pub(crate) fn period_label(period: &str) -> Locator {
    let key = period
        .split_whitespace()
        .last()
        .unwrap_or("month")
        .to_lowercase();
    Locator::css(format!("label[for='{key}']"))
}

/// The CSV anchor inside an opened export menu, shared by several flows.
pub(crate) fn csv_export_link() -> Vec<Locator> {
    vec![Locator::xpath("//a[contains(text(),'CSV')]")]
}
