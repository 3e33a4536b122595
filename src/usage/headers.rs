use axum::http::HeaderMap;
use chrono::{DateTime, TimeZone, Utc};

use super::record::{LimitDialect, RateLimitRecord};

/// Parses rate-limit headers from an upstream response. Unified headers take
/// precedence: if any is present the record is unified and the standard family
/// is never consulted. A record that stays empty keeps no dialect and is
/// discarded by the caller.
pub fn parse_rate_limit_headers(headers: &HeaderMap) -> RateLimitRecord {
    let mut record = RateLimitRecord {
        timestamp: Some(Utc::now()),
        ..Default::default()
    };

    if parse_unified_headers(headers, &mut record) {
        record.dialect = Some(LimitDialect::Unified);
        return record;
    }

    parse_standard_headers(headers, &mut record);
    if !record.is_empty() {
        record.dialect = Some(LimitDialect::Standard);
    }
    record
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Returns true when at least one unified header was present.
fn parse_unified_headers(headers: &HeaderMap, record: &mut RateLimitRecord) -> bool {
    let mut found = false;

    let v = header_str(headers, "anthropic-organization-id");
    if !v.is_empty() {
        record.organization_id = v.to_string();
        found = true;
    }

    // 5-hour window.
    let v = header_str(headers, "anthropic-ratelimit-unified-5h-utilization");
    if !v.is_empty() {
        record.utilization_5h = parse_float(v);
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-5h-status");
    if !v.is_empty() {
        record.status_5h = v.trim().to_lowercase();
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-5h-reset");
    if !v.is_empty() {
        record.reset_5h = parse_unix_timestamp(v);
        found = true;
    }

    // 7-day window.
    let v = header_str(headers, "anthropic-ratelimit-unified-7d-utilization");
    if !v.is_empty() {
        record.utilization_7d = parse_float(v);
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-7d-status");
    if !v.is_empty() {
        record.status_7d = v.trim().to_lowercase();
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-7d-reset");
    if !v.is_empty() {
        record.reset_7d = parse_unix_timestamp(v);
        found = true;
    }

    // Aggregate window.
    let v = header_str(headers, "anthropic-ratelimit-unified-status");
    if !v.is_empty() {
        record.unified_status = v.trim().to_lowercase();
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-reset");
    if !v.is_empty() {
        record.unified_reset = parse_unix_timestamp(v);
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-representative-claim");
    if !v.is_empty() {
        record.representative_claim = v.trim().to_string();
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-fallback-percentage");
    if !v.is_empty() {
        record.fallback_percentage = parse_float(v);
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-overage-status");
    if !v.is_empty() {
        record.overage_status = v.trim().to_lowercase();
        found = true;
    }
    let v = header_str(headers, "anthropic-ratelimit-unified-overage-disabled-reason");
    if !v.is_empty() {
        record.overage_disabled_reason = v.trim().to_string();
        found = true;
    }

    found
}

fn parse_standard_headers(headers: &HeaderMap, record: &mut RateLimitRecord) {
    record.requests_limit = parse_int(headers, "anthropic-ratelimit-requests-limit");
    record.requests_remaining = parse_int(headers, "anthropic-ratelimit-requests-remaining");
    record.requests_reset = parse_rfc3339(headers, "anthropic-ratelimit-requests-reset");
    record.tokens_limit = parse_int(headers, "anthropic-ratelimit-tokens-limit");
    record.tokens_remaining = parse_int(headers, "anthropic-ratelimit-tokens-remaining");
    record.tokens_reset = parse_rfc3339(headers, "anthropic-ratelimit-tokens-reset");
    record.input_tokens_limit = parse_int(headers, "anthropic-ratelimit-input-tokens-limit");
    record.input_tokens_remaining = parse_int(headers, "anthropic-ratelimit-input-tokens-remaining");
    record.input_tokens_reset = parse_rfc3339(headers, "anthropic-ratelimit-input-tokens-reset");
    record.output_tokens_limit = parse_int(headers, "anthropic-ratelimit-output-tokens-limit");
    record.output_tokens_remaining =
        parse_int(headers, "anthropic-ratelimit-output-tokens-remaining");
    record.output_tokens_reset = parse_rfc3339(headers, "anthropic-ratelimit-output-tokens-reset");
}

fn parse_int(headers: &HeaderMap, name: &str) -> i64 {
    header_str(headers, name).trim().parse::<i64>().unwrap_or(0)
}

fn parse_float(v: &str) -> f64 {
    v.trim().parse::<f64>().unwrap_or(0.0)
}

fn parse_rfc3339(headers: &HeaderMap, name: &str) -> Option<DateTime<Utc>> {
    let v = header_str(headers, name).trim();
    if v.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(v)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Unix seconds with optional fraction, preserved to nanosecond precision.
/// Falls back to RFC3339 for providers that send formatted instants.
fn parse_unix_timestamp(v: &str) -> Option<DateTime<Utc>> {
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(f) = v.parse::<f64>() {
        let sec = f.trunc() as i64;
        let nsec = ((f - sec as f64) * 1e9) as u32;
        return Utc.timestamp_opt(sec, nsec).single();
    }
    DateTime::parse_from_rfc3339(v)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
