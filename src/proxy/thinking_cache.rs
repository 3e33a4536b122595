use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// How long a cached thinking block stays restorable.
const THINKING_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Per-session entry cap; overflow triggers the eviction sweep.
const MAX_ENTRIES_PER_SESSION: usize = 100;

/// 32 hex chars = 128-bit key space.
const THINKING_ID_LEN: usize = 32;

/// A provider-returned reasoning fragment with the opaque signature that must
/// be echoed verbatim on the next turn.
#[derive(Clone, Debug)]
pub struct ThinkingEntry {
    pub thinking: String,
    pub signature: String,
    pub timestamp: SystemTime,
}

type SessionBucket = Arc<Mutex<HashMap<String, ThinkingEntry>>>;

/// Content-addressed store of thinking blocks keyed by session id and
/// thinking id. The top-level map is concurrent; each session bucket owns its
/// mutex, and no operation holds more than one bucket lock at a time.
pub struct ThinkingCache {
    sessions: DashMap<String, SessionBucket>,
}

impl ThinkingCache {
    fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn global() -> &'static ThinkingCache {
        static INSTANCE: OnceLock<ThinkingCache> = OnceLock::new();
        INSTANCE.get_or_init(ThinkingCache::new)
    }

    /// Stable hash-based id for a thinking text. Identical content yields the
    /// same id across processes.
    pub fn generate_id(text: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
        digest[..THINKING_ID_LEN].to_string()
    }

    fn bucket(&self, session_id: &str) -> SessionBucket {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .value()
            .clone()
    }

    pub fn put(&self, session_id: &str, thinking_id: &str, thinking: &str, signature: &str) {
        if session_id.is_empty() || thinking_id.is_empty() || thinking.is_empty() || signature.is_empty() {
            return;
        }
        self.put_at(session_id, thinking_id, thinking, signature, SystemTime::now());
    }

    fn put_at(
        &self,
        session_id: &str,
        thinking_id: &str,
        thinking: &str,
        signature: &str,
        timestamp: SystemTime,
    ) {
        let bucket = self.bucket(session_id);
        let Ok(mut entries) = bucket.lock() else {
            return;
        };

        if entries.len() >= MAX_ENTRIES_PER_SESSION {
            Self::evict_locked(&mut entries);
        }

        entries.insert(
            thinking_id.to_string(),
            ThinkingEntry {
                thinking: thinking.to_string(),
                signature: signature.to_string(),
                timestamp,
            },
        );
    }

    /// Capacity relief for a full bucket: drop expired entries first, then the
    /// oldest quarter (at least one) by insertion timestamp.
    fn evict_locked(entries: &mut HashMap<String, ThinkingEntry>) {
        let now = SystemTime::now();
        entries.retain(|_, entry| {
            now.duration_since(entry.timestamp)
                .map(|age| age <= THINKING_TTL)
                .unwrap_or(true)
        });

        if entries.len() >= MAX_ENTRIES_PER_SESSION {
            let mut oldest: Vec<(String, SystemTime)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.timestamp))
                .collect();
            oldest.sort_by_key(|(_, ts)| *ts);

            let to_remove = (oldest.len() / 4).max(1);
            for (key, _) in oldest.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }
    }

    /// Returns the entry iff present and unexpired; an expired entry is
    /// deleted under the same bucket lock.
    pub fn get(&self, session_id: &str, thinking_id: &str) -> Option<ThinkingEntry> {
        if session_id.is_empty() || thinking_id.is_empty() {
            return None;
        }
        let bucket = self.sessions.get(session_id)?.value().clone();
        let Ok(mut entries) = bucket.lock() else {
            return None;
        };

        let expired = match entries.get(thinking_id) {
            Some(entry) => entry
                .timestamp
                .elapsed()
                .map(|age| age > THINKING_TTL)
                .unwrap_or(false),
            None => return None,
        };
        if expired {
            entries.remove(thinking_id);
            tracing::debug!(
                "[ThinkingCache] Entry expired (session={}, id={})",
                session_id,
                thinking_id
            );
            return None;
        }
        entries.get(thinking_id).cloned()
    }

    /// Drops one session, or every session when `None`.
    pub fn clear(&self, session_id: Option<&str>) {
        match session_id {
            Some(sid) => {
                self.sessions.remove(sid);
            }
            None => self.sessions.clear(),
        }
    }

    #[cfg(test)]
    fn session_len(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|bucket| bucket.lock().map(|entries| entries.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> String {
        "s".repeat(64)
    }

    #[test]
    fn generate_id_is_stable_lowercase_hex() {
        let a = ThinkingCache::generate_id("Because addition is commutative");
        let b = ThinkingCache::generate_id("Because addition is commutative");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ThinkingCache::new();
        let id = ThinkingCache::generate_id("step one");
        cache.put("session-a", &id, "step one", &sig());

        let entry = cache.get("session-a", &id).expect("entry should be cached");
        assert_eq!(entry.thinking, "step one");
        assert_eq!(entry.signature, sig());
    }

    #[test]
    fn empty_inputs_are_ignored() {
        let cache = ThinkingCache::new();
        cache.put("", "id", "text", &sig());
        cache.put("session", "", "text", &sig());
        cache.put("session", "id", "", &sig());
        cache.put("session", "id", "text", "");
        assert!(cache.get("session", "id").is_none());
    }

    #[test]
    fn expired_entry_is_removed_on_get() {
        let cache = ThinkingCache::new();
        let stale = SystemTime::now() - Duration::from_secs(3 * 60 * 60);
        cache.put_at("session-a", "deadbeef", "old thought", &sig(), stale);

        assert!(cache.get("session-a", "deadbeef").is_none());
        assert_eq!(cache.session_len("session-a"), 0);
    }

    #[test]
    fn overflow_evicts_oldest_quarter() {
        let cache = ThinkingCache::new();
        let base = SystemTime::now() - Duration::from_secs(600);
        for i in 0..100 {
            cache.put_at(
                "session-a",
                &format!("id-{i:03}"),
                "thought",
                &sig(),
                base + Duration::from_secs(i),
            );
        }
        assert_eq!(cache.session_len("session-a"), 100);

        // The 101st insertion sweeps the oldest 25 unexpired entries.
        cache.put("session-a", "id-100", "thought", &sig());
        assert_eq!(cache.session_len("session-a"), 76);
        for i in 0..25 {
            assert!(cache.get("session-a", &format!("id-{i:03}")).is_none());
        }
        assert!(cache.get("session-a", "id-025").is_some());
        assert!(cache.get("session-a", "id-100").is_some());
    }

    #[test]
    fn overflow_prefers_dropping_expired_entries() {
        let cache = ThinkingCache::new();
        let stale = SystemTime::now() - Duration::from_secs(3 * 60 * 60);
        for i in 0..50 {
            cache.put_at("session-a", &format!("stale-{i}"), "thought", &sig(), stale);
        }
        for i in 0..50 {
            cache.put("session-a", &format!("fresh-{i}"), "thought", &sig());
        }
        cache.put("session-a", "trigger", "thought", &sig());

        // All stale entries go before any fresh one does.
        assert!(cache.get("session-a", "stale-0").is_none());
        assert!(cache.get("session-a", "fresh-0").is_some());
        assert!(cache.get("session-a", "trigger").is_some());
        assert_eq!(cache.session_len("session-a"), 51);
    }

    #[test]
    fn clear_scopes_to_one_session() {
        let cache = ThinkingCache::new();
        cache.put("session-a", "id-a", "text", &sig());
        cache.put("session-b", "id-b", "text", &sig());

        cache.clear(Some("session-a"));
        assert!(cache.get("session-a", "id-a").is_none());
        assert!(cache.get("session-b", "id-b").is_some());

        cache.clear(None);
        assert!(cache.get("session-b", "id-b").is_none());
    }
}
