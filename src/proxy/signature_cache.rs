use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Sentinel returned on miss for Gemini-group models, which accept unsigned
/// thinking blocks.
pub const GEMINI_SENTINEL: &str = "skip_thought_signature_validator";

const SIGNATURE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const MIN_SIGNATURE_LENGTH: usize = 50;

/// 16 hex chars = 64-bit key space.
const TEXT_HASH_LEN: usize = 16;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Debug)]
struct SignatureEntry {
    signature: String,
    timestamp: SystemTime,
}

type GroupBucket = Arc<Mutex<HashMap<String, SignatureEntry>>>;

/// Model-group-scoped map of text hash to signature with a sliding TTL.
/// A background sweeper purges expired entries and empty buckets every ten
/// minutes; it starts on first cache access and never blocks callers.
pub struct SignatureCache {
    groups: DashMap<String, GroupBucket>,
}

impl SignatureCache {
    fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    pub fn global() -> &'static SignatureCache {
        static INSTANCE: OnceLock<SignatureCache> = OnceLock::new();
        INSTANCE.get_or_init(SignatureCache::new)
    }

    /// Case-sensitive substring classification, tested in declaration order.
    pub fn model_group(model_name: &str) -> &str {
        if model_name.contains("gpt") {
            "gpt"
        } else if model_name.contains("claude") {
            "claude"
        } else if model_name.contains("gemini") {
            "gemini"
        } else {
            model_name
        }
    }

    fn hash_text(text: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
        digest[..TEXT_HASH_LEN].to_string()
    }

    fn bucket(&self, group: &str) -> GroupBucket {
        self.groups
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .value()
            .clone()
    }

    pub fn put(&self, model_name: &str, text: &str, signature: &str) {
        start_sweeper();
        if text.is_empty() || signature.is_empty() || signature.len() < MIN_SIGNATURE_LENGTH {
            return;
        }

        let group = Self::model_group(model_name).to_string();
        let bucket = self.bucket(&group);
        if let Ok(mut entries) = bucket.lock() {
            tracing::debug!(
                "[SignatureCache] Caching signature (group={}, len={})",
                group,
                signature.len()
            );
            entries.insert(
                Self::hash_text(text),
                SignatureEntry {
                    signature: signature.to_string(),
                    timestamp: SystemTime::now(),
                },
            );
        };
    }

    /// Returns the cached signature for this model group and text, refreshing
    /// its timestamp on hit. A miss yields the Gemini sentinel for the gemini
    /// group and the empty string otherwise.
    pub fn get(&self, model_name: &str, text: &str) -> String {
        start_sweeper();
        let group = Self::model_group(model_name);
        let miss = || {
            if group == "gemini" {
                GEMINI_SENTINEL.to_string()
            } else {
                String::new()
            }
        };

        if text.is_empty() {
            return miss();
        }
        let Some(bucket) = self.groups.get(group).map(|b| b.value().clone()) else {
            return miss();
        };
        let Ok(mut entries) = bucket.lock() else {
            return miss();
        };

        let text_hash = Self::hash_text(text);
        let now = SystemTime::now();
        let expired = match entries.get(&text_hash) {
            Some(entry) => now
                .duration_since(entry.timestamp)
                .map(|age| age > SIGNATURE_TTL)
                .unwrap_or(false),
            None => return miss(),
        };
        if expired {
            entries.remove(&text_hash);
            tracing::debug!("[SignatureCache] Entry expired (group={})", group);
            return miss();
        }
        match entries.get_mut(&text_hash) {
            Some(entry) => {
                // Sliding expiration: reads keep the entry warm.
                entry.timestamp = now;
                entry.signature.clone()
            }
            None => miss(),
        }
    }

    /// A signature is usable when long enough, or when it is the Gemini
    /// sentinel for a Gemini-group model.
    pub fn has_valid_signature(model_name: &str, signature: &str) -> bool {
        (!signature.is_empty() && signature.len() >= MIN_SIGNATURE_LENGTH)
            || (signature == GEMINI_SENTINEL && Self::model_group(model_name) == "gemini")
    }

    /// Drops one model group, or every group when `None`.
    pub fn clear(&self, model_name: Option<&str>) {
        match model_name {
            Some(name) => {
                self.groups.remove(Self::model_group(name));
            }
            None => self.groups.clear(),
        }
    }

    fn purge_expired(&self) {
        let now = SystemTime::now();
        let keys: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let Some(bucket) = self.groups.get(&key).map(|b| b.value().clone()) else {
                continue;
            };
            if let Ok(mut entries) = bucket.lock() {
                entries.retain(|_, entry| {
                    now.duration_since(entry.timestamp)
                        .map(|age| age <= SIGNATURE_TTL)
                        .unwrap_or(true)
                });
            }
            self.groups
                .remove_if(&key, |_, b| b.lock().map(|e| e.is_empty()).unwrap_or(false));
        }
    }

    #[cfg(test)]
    fn backdate(&self, model_name: &str, text: &str, age: Duration) {
        let group = Self::model_group(model_name).to_string();
        let bucket = self.bucket(&group);
        if let Ok(mut entries) = bucket.lock() {
            if let Some(entry) = entries.get_mut(&Self::hash_text(text)) {
                entry.timestamp = SystemTime::now() - age;
            }
        };
    }
}

/// Process-wide sweeper; short critical sections per bucket, one lock at a
/// time, so callers are never blocked for long.
fn start_sweeper() {
    static SWEEPER: Once = Once::new();
    SWEEPER.call_once(|| {
        let _ = std::thread::Builder::new()
            .name("signature-sweeper".to_string())
            .spawn(|| loop {
                std::thread::sleep(SWEEP_INTERVAL);
                SignatureCache::global().purge_expired();
            });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> String {
        "x".repeat(64)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "thinking text", &sig());
        assert_eq!(cache.get("claude-sonnet-4-5", "thinking text"), sig());
    }

    #[test]
    fn short_signature_is_rejected() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "thinking text", "short");
        assert_eq!(cache.get("claude-sonnet-4-5", "thinking text"), "");
    }

    #[test]
    fn model_group_order_is_declared() {
        assert_eq!(SignatureCache::model_group("gpt-5"), "gpt");
        assert_eq!(SignatureCache::model_group("claude-sonnet-4-5"), "claude");
        assert_eq!(SignatureCache::model_group("gemini-3-pro"), "gemini");
        assert_eq!(SignatureCache::model_group("mistral-large"), "mistral-large");
        // Mixed names resolve by declaration order, not lexical accident.
        assert_eq!(SignatureCache::model_group("claude-via-gemini-adapter"), "claude");
    }

    #[test]
    fn gemini_miss_returns_sentinel() {
        let cache = SignatureCache::new();
        assert_eq!(cache.get("gemini-3-flash", "never stored"), GEMINI_SENTINEL);
        assert_eq!(cache.get("claude-sonnet-4-5", "never stored"), "");
        assert!(SignatureCache::has_valid_signature("gemini-3-flash", GEMINI_SENTINEL));
        assert!(!SignatureCache::has_valid_signature("claude-sonnet-4-5", GEMINI_SENTINEL));
        assert!(SignatureCache::has_valid_signature("claude-sonnet-4-5", &sig()));
    }

    #[test]
    fn get_slides_the_ttl() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "sliding text", &sig());

        // 90 minutes old: still fresh, and the hit resets the clock.
        cache.backdate("claude-sonnet-4-5", "sliding text", Duration::from_secs(90 * 60));
        assert_eq!(cache.get("claude-sonnet-4-5", "sliding text"), sig());

        // Another 90 minutes after the refresh: total age exceeds the original
        // 2h cutoff, yet the entry survives because reads refreshed it.
        cache.backdate("claude-sonnet-4-5", "sliding text", Duration::from_secs(90 * 60));
        assert_eq!(cache.get("claude-sonnet-4-5", "sliding text"), sig());
    }

    #[test]
    fn expired_entry_is_dropped_on_get() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "stale text", &sig());
        cache.backdate("claude-sonnet-4-5", "stale text", Duration::from_secs(3 * 60 * 60));
        assert_eq!(cache.get("claude-sonnet-4-5", "stale text"), "");
    }

    #[test]
    fn purge_removes_expired_entries_and_empty_buckets() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "stale text", &sig());
        cache.put("gpt-5", "fresh text", &sig());
        cache.backdate("claude-sonnet-4-5", "stale text", Duration::from_secs(3 * 60 * 60));

        cache.purge_expired();
        assert!(!cache.groups.contains_key("claude"));
        assert_eq!(cache.get("gpt-5", "fresh text"), sig());
    }

    #[test]
    fn clear_scopes_to_one_group() {
        let cache = SignatureCache::new();
        cache.put("claude-sonnet-4-5", "text-a", &sig());
        cache.put("gpt-5", "text-b", &sig());

        cache.clear(Some("claude-sonnet-4-5"));
        assert_eq!(cache.get("claude-sonnet-4-5", "text-a"), "");
        assert_eq!(cache.get("gpt-5", "text-b"), sig());

        cache.clear(None);
        assert_eq!(cache.get("gpt-5", "text-b"), "");
    }
}
