use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Which header family produced a record. Unified covers OAuth/subscription
/// style headers, standard covers API-key token buckets; a record never mixes
/// the two field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitDialect {
    Unified,
    Standard,
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

/// One snapshot of upstream throttling state, parsed from a single response's
/// headers. The capture timestamp and the server-supplied reset instants are
/// independent observations; neither is ever derived from the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Credential label, or "unknown".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<LimitDialect>,

    // Unified fields (OAuth/subscription).
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub utilization_5h: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_5h: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_5h: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub utilization_7d: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_7d: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_7d: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unified_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified_reset: Option<DateTime<Utc>>,
    /// "five_hour" or "seven_day".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub representative_claim: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub fallback_percentage: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub overage_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub overage_disabled_reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization_id: String,

    // Standard fields (API key).
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub requests_limit: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub requests_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_reset: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub tokens_limit: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub tokens_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_reset: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub input_tokens_limit: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub input_tokens_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens_reset: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub output_tokens_limit: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub output_tokens_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens_reset: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// A unified record is empty when all three statuses are blank; any other
    /// record is empty when all four limits are zero. Empty records never
    /// enter the store.
    pub fn is_empty(&self) -> bool {
        if self.dialect == Some(LimitDialect::Unified) {
            return self.status_5h.is_empty()
                && self.status_7d.is_empty()
                && self.unified_status.is_empty();
        }
        self.requests_limit == 0
            && self.tokens_limit == 0
            && self.input_tokens_limit == 0
            && self.output_tokens_limit == 0
    }
}

pub(crate) fn format_reset(reset: &Option<DateTime<Utc>>) -> String {
    reset
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Convenience read-out of the most recent unified record inside a window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedSummary {
    pub total_requests: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_record: Option<RateLimitRecord>,
    pub utilization_5h: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_5h: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reset_5h: String,
    pub utilization_7d: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_7d: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reset_7d: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub overage_status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceUsage {
    pub requests: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_limit: Option<RateLimitRecord>,
}

/// Aggregate over all records whose capture timestamp falls inside a window.
/// `unified` and `latest_limit` are mutually exclusive, keyed off the dialect
/// of the newest record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSummary {
    pub total_requests: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified: Option<UnifiedSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_limit: Option<RateLimitRecord>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub by_source: HashMap<String, SourceUsage>,
}
