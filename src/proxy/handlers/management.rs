use std::time::Duration;

use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::usage::{LimitDialect, RateLimitStore};

const FIVE_HOURS: Duration = Duration::from_secs(5 * 60 * 60);
const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Flat read-out of the latest unified rate-limit snapshot. Usage values are
/// percentages in [0, 100] rounded to two decimals; an empty store reports
/// zero usage, "unknown" statuses, and empty reset strings.
#[derive(Debug, Serialize)]
pub struct UsageLimits {
    #[serde(rename = "5h_usage")]
    pub usage_5h: f64,
    #[serde(rename = "5h_status")]
    pub status_5h: String,
    #[serde(rename = "5h_reset")]
    pub reset_5h: String,
    #[serde(rename = "7d_usage")]
    pub usage_7d: f64,
    #[serde(rename = "7d_status")]
    pub status_7d: String,
    #[serde(rename = "7d_reset")]
    pub reset_7d: String,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            usage_5h: 0.0,
            status_5h: "unknown".to_string(),
            reset_5h: String::new(),
            usage_7d: 0.0,
            status_7d: "unknown".to_string(),
            reset_7d: String::new(),
        }
    }
}

fn round_percent(utilization: f64) -> f64 {
    (utilization * 100.0 * 100.0).round() / 100.0
}

fn status_or_unknown(status: &str) -> String {
    if status.is_empty() {
        "unknown".to_string()
    } else {
        status.to_string()
    }
}

pub(crate) fn simple_usage_limits(store: &RateLimitStore) -> UsageLimits {
    let Some(latest) = store.latest() else {
        return UsageLimits::default();
    };
    if latest.dialect != Some(LimitDialect::Unified) {
        return UsageLimits::default();
    }

    UsageLimits {
        usage_5h: round_percent(latest.utilization_5h),
        status_5h: status_or_unknown(&latest.status_5h),
        reset_5h: latest
            .reset_5h
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default(),
        usage_7d: round_percent(latest.utilization_7d),
        status_7d: status_or_unknown(&latest.status_7d),
        reset_7d: latest
            .reset_7d
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default(),
    }
}

/// GET /v0/management/usage/limits
pub async fn get_usage_limits() -> Json<UsageLimits> {
    Json(simple_usage_limits(RateLimitStore::global()))
}

/// GET /v0/management/usage/windows
///
/// Window-summary shape over the same data: aggregates for the last five
/// hours and the last week.
pub async fn get_usage_windows() -> Json<Value> {
    let store = RateLimitStore::global();
    Json(json!({
        "last_5h": store.query_by_window(FIVE_HOURS),
        "last_week": store.query_by_window(ONE_WEEK),
    }))
}
