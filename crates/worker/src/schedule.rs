//! Curation timing: first tick at month end, then a fixed period.

use crate::config::CurationTarget;
use chrono::{DateTime, Utc};
use std::time::Duration;
use workers_core::YearMonth;

/// Time from `now` until the first instant of the next calendar month.
/// Never negative; an unrepresentable boundary yields zero.
pub fn until_month_end(now: DateTime<Utc>) -> Duration {
    YearMonth::of(now)
        .next()
        .start()
        .and_then(|boundary| (boundary - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

/// Month compacted by a tick firing at `now`.
pub fn target_month(now: DateTime<Utc>, target: CurationTarget) -> YearMonth {
    let month = YearMonth::of(now);
    match target {
        CurationTarget::Current => month,
        CurationTarget::Previous => month.previous(),
    }
}

/// Wait after failed attempt `attempt` (1-based): `base`, then doubling.
pub fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift)
}
