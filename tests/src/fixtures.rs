//! Test fixtures and metric generators.

use broker::Delivery;
use chrono::{DateTime, TimeZone, Utc};
use workers_core::Metric;

/// JSON body of a metric as publishers send it.
pub fn metric_body(username: &str, count: i64, metric: &str) -> Vec<u8> {
    serde_json::json!({
        "username": username,
        "count": count,
        "metric": metric,
    })
    .to_string()
    .into_bytes()
}

/// A delivery carrying a well-formed metric.
pub fn metric_delivery(tag: i64, username: &str, metric: &str) -> Delivery {
    Delivery::new(tag, metric_body(username, 1, metric))
}

/// A delivery whose body is not valid JSON.
pub fn garbage_delivery(tag: i64) -> Delivery {
    Delivery::new(tag, b"{username: alice, count".to_vec())
}

pub fn metric(username: &str, event: &str) -> Metric {
    Metric::new(username, 1, event)
}

/// UTC instant at the given date and hour.
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{} {}h", year, month, day, hour))
}
