use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::proxy::signature_cache::SignatureCache;
use crate::proxy::thinking_cache::ThinkingCache;

static THINK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("invalid think tag regex"));

// Tolerates whitespace on either side of the triple-backtick fences.
static THINK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("```\\s*plaintext:thinkId:([a-f0-9]+)\\s*```").expect("invalid thinkId regex")
});

// Legacy inline format kept for older clients.
static LEGACY_THINKING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?s)```plaintext:Thinking\\n(.*?)```").expect("invalid legacy thinking regex")
});
static LEGACY_SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?s)```plaintext:Signature:(.*?)```").expect("invalid legacy signature regex")
});

/// Turns one text fragment into Claude content parts, restoring a signed
/// thinking block when the text carries a marker the cache can resolve.
///
/// Resolution order: thinkId marker (cache lookup), then the legacy
/// Thinking/Signature pair, then plain text with any orphan markers stripped.
pub fn extract_thinking_parts(session_id: &str, model_name: &str, text: &str) -> Vec<Value> {
    if let Some(captures) = THINK_ID_RE.captures(text) {
        let thinking_id = &captures[1];
        if let Some(entry) = ThinkingCache::global().get(session_id, thinking_id) {
            if SignatureCache::has_valid_signature(model_name, &entry.signature) {
                tracing::debug!(
                    "Restoring cached thinking (session={}, id={})",
                    session_id,
                    thinking_id
                );
                let remaining = THINK_TAG_RE.replace_all(text, "");
                let remaining = THINK_ID_RE.replace_all(&remaining, "");
                let remaining = remaining.trim();

                let mut parts = vec![json!({
                    "type": "thinking",
                    "thinking": entry.thinking,
                    "signature": entry.signature,
                })];
                if !remaining.is_empty() {
                    parts.push(json!({"type": "text", "text": remaining}));
                }
                return parts;
            }
        }
        tracing::debug!(
            "Thinking cache miss (session={}, id={}); thinking will be regenerated",
            session_id,
            thinking_id
        );
    }

    let thinking_match = LEGACY_THINKING_RE.captures(text);
    let signature_match = LEGACY_SIGNATURE_RE.captures(text);
    if let (Some(thinking_caps), Some(signature_caps)) = (thinking_match, signature_match) {
        let thinking = thinking_caps[1].replace("\\`\\`\\`", "```");
        let signature = signature_caps[1].to_string();

        let remaining = LEGACY_THINKING_RE.replace_all(text, "");
        let remaining = LEGACY_SIGNATURE_RE.replace_all(&remaining, "");
        let remaining = remaining.trim();

        let mut parts = vec![json!({
            "type": "thinking",
            "thinking": thinking,
            "signature": signature,
        })];
        if !remaining.is_empty() {
            parts.push(json!({"type": "text", "text": remaining}));
        }
        return parts;
    }

    let clean = THINK_TAG_RE.replace_all(text, "");
    let clean = THINK_ID_RE.replace_all(&clean, "");
    let clean = LEGACY_THINKING_RE.replace_all(&clean, "");
    let clean = LEGACY_SIGNATURE_RE.replace_all(&clean, "");
    let clean = clean.trim();

    if clean.is_empty() {
        return Vec::new();
    }
    vec![json!({"type": "text", "text": clean})]
}

/// Maps an OpenAI `reasoning_effort` value to a Claude thinking budget.
/// `Some(0)` disables thinking, `Some(-1)` enables it without a budget, a
/// positive value enables it with that budget. `None` leaves thinking unset.
pub fn convert_effort_to_budget(effort: &Value) -> Option<i64> {
    if let Some(n) = effort.as_i64() {
        return Some(n);
    }
    let level = effort.as_str()?.trim().to_lowercase();
    match level.as_str() {
        "" => None,
        "none" | "off" | "disabled" => Some(0),
        "auto" => Some(-1),
        "low" => Some(1024),
        "medium" => Some(8192),
        "high" => Some(24576),
        other => other.parse::<i64>().ok(),
    }
}

/// Renders a thinking block back into OpenAI-visible text: the raw reasoning
/// wrapped in `<think>` plus the marker a later turn uses to restore it.
pub fn render_thinking_marker(thinking: &str, thinking_id: &str) -> String {
    format!("<think>{}</think>\n```plaintext:thinkId:{}```\n", thinking, thinking_id)
}
