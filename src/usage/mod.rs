mod headers;
mod record;
mod store;

pub use headers::parse_rate_limit_headers;
pub use record::{LimitDialect, RateLimitRecord, SourceUsage, UnifiedSummary, WindowSummary};
pub use store::{
    rate_limit_file_path, set_rate_limit_file_path, start_auto_save, stop_auto_save, RateLimitStore,
};

use axum::http::HeaderMap;

/// Parses rate-limit headers off an upstream response and records the
/// snapshot, stamped with the credential label and model. Responses without
/// any ratelimit header are skipped cheaply.
pub fn capture_rate_limit(headers: &HeaderMap, source: &str, model: &str) {
    let has_rate_limit = headers.keys().any(|name| name.as_str().contains("ratelimit"));
    if !has_rate_limit {
        return;
    }

    let mut record = parse_rate_limit_headers(headers);
    if record.is_empty() {
        tracing::debug!(
            "ratelimit: headers found but parsed empty for model={} source={}",
            model,
            source
        );
        return;
    }

    match record.dialect {
        Some(LimitDialect::Unified) => tracing::info!(
            "ratelimit: [unified] model={} source={} 5h={:.2}% ({}) 7d={:.2}% ({}) overage={}",
            model,
            source,
            record.utilization_5h * 100.0,
            record.status_5h,
            record.utilization_7d * 100.0,
            record.status_7d,
            record.overage_status
        ),
        _ => tracing::info!(
            "ratelimit: [standard] model={} source={} requests={}/{} tokens={}/{}",
            model,
            source,
            record.requests_remaining,
            record.requests_limit,
            record.tokens_remaining,
            record.tokens_limit
        ),
    }

    record.source = source.to_string();
    record.model = model.to_string();
    RateLimitStore::global().record(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn capture_skips_header_maps_without_ratelimit_names() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let before = RateLimitStore::global().len();
        capture_rate_limit(&headers, "acct@example.com", "claude-sonnet-4-5");
        assert_eq!(RateLimitStore::global().len(), before);
    }

    #[test]
    fn capture_records_into_global_store() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "anthropic-ratelimit-unified-5h-status",
            HeaderValue::from_static("allowed"),
        );
        let before = RateLimitStore::global().len();
        capture_rate_limit(&headers, "acct@example.com", "claude-sonnet-4-5");
        assert_eq!(RateLimitStore::global().len(), before + 1);
    }
}
