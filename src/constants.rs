/// Claude Messages API version header sent with every upstream request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default `max_tokens` applied when the inbound request does not carry one.
pub const DEFAULT_MAX_TOKENS: u64 = 32000;

/// Default listen port for the proxy surface.
pub const DEFAULT_PORT: u16 = 8790;

/// Default upstream endpoint.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.anthropic.com";

/// Interval between periodic rate-limit snapshot writes.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 300;

pub fn user_agent() -> String {
    format!(
        "trestle/{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
