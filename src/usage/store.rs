use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, OnceLock, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::record::{LimitDialect, RateLimitRecord, UnifiedSummary, WindowSummary};
use crate::error::AppResult;

/// Records older than this are dropped on cleanup, save, and load.
const MAX_RECORD_AGE_DAYS: i64 = 7;

/// Retention sweep cadence, counted in appends.
const CLEANUP_EVERY: usize = 100;

/// Fire-and-forget save cadence, counted in appends.
const SAVE_EVERY: usize = 10;

static RATE_LIMIT_FILE: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

static AUTOSAVE: LazyLock<Mutex<Option<CancellationToken>>> = LazyLock::new(|| Mutex::new(None));

pub fn set_rate_limit_file_path<P: Into<PathBuf>>(path: P) {
    if let Ok(mut guard) = RATE_LIMIT_FILE.write() {
        *guard = Some(path.into());
    }
}

pub fn rate_limit_file_path() -> Option<PathBuf> {
    RATE_LIMIT_FILE.read().ok().and_then(|guard| guard.clone())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RateLimitSnapshot {
    records: Vec<RateLimitRecord>,
}

/// Append-only in-memory log of rate-limit records with JSON persistence.
/// Appends are totally ordered by the write lock; saves copy the filtered
/// slice under the read lock and do file I/O with no lock held.
pub struct RateLimitStore {
    records: RwLock<Vec<RateLimitRecord>>,
}

impl Default for RateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn global() -> &'static RateLimitStore {
        static INSTANCE: OnceLock<RateLimitStore> = OnceLock::new();
        INSTANCE.get_or_init(RateLimitStore::new)
    }

    fn retention_cutoff() -> DateTime<Utc> {
        Utc::now() - Duration::days(MAX_RECORD_AGE_DAYS)
    }

    /// Appends a record. Empty records are ignored; a missing timestamp
    /// defaults to now. Every 100th append sweeps retention, every 10th
    /// append kicks off an asynchronous save that never blocks the caller.
    pub fn record(&self, mut record: RateLimitRecord) {
        if record.is_empty() {
            return;
        }
        if record.timestamp.is_none() {
            record.timestamp = Some(Utc::now());
        }

        let count = {
            let Ok(mut records) = self.records.write() else {
                return;
            };
            records.push(record);
            if records.len() % CLEANUP_EVERY == 0 {
                Self::cleanup_locked(&mut records);
            }
            records.len()
        };

        if count % SAVE_EVERY == 0 {
            if let Some(path) = rate_limit_file_path() {
                let snapshot = self.in_window_records();
                std::thread::spawn(move || {
                    if let Err(e) = write_snapshot(&path, snapshot) {
                        tracing::debug!("ratelimit: background save failed: {}", e);
                    }
                });
            }
        }
    }

    fn cleanup_locked(records: &mut Vec<RateLimitRecord>) {
        let cutoff = Self::retention_cutoff();
        records.retain(|r| r.timestamp.map(|t| t > cutoff).unwrap_or(false));
    }

    /// The most recently appended record, by insertion order.
    pub fn latest(&self) -> Option<RateLimitRecord> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregates records whose capture timestamp falls within the window.
    /// Per-source sub-maps are allocated fresh per call and never shared.
    pub fn query_by_window(&self, window: StdDuration) -> WindowSummary {
        let mut summary = WindowSummary::default();
        let cutoff = Utc::now() - Duration::from_std(window).unwrap_or_else(|_| Duration::zero());

        let Ok(records) = self.records.read() else {
            return summary;
        };

        let mut latest_time: Option<DateTime<Utc>> = None;
        let mut latest_record: Option<RateLimitRecord> = None;

        for record in records.iter() {
            let Some(timestamp) = record.timestamp else {
                continue;
            };
            if timestamp < cutoff {
                continue;
            }
            summary.total_requests += 1;

            if latest_time.map(|t| timestamp > t).unwrap_or(true) {
                latest_time = Some(timestamp);
                latest_record = Some(record.clone());
            }

            let source = if record.source.is_empty() {
                "unknown"
            } else {
                record.source.as_str()
            };
            let usage = summary.by_source.entry(source.to_string()).or_default();
            usage.requests += 1;
            let newer = usage
                .latest_limit
                .as_ref()
                .and_then(|r| r.timestamp)
                .map(|t| timestamp > t)
                .unwrap_or(true);
            if newer {
                usage.latest_limit = Some(record.clone());
            }
        }

        if let Some(latest) = latest_record {
            if latest.dialect == Some(LimitDialect::Unified) {
                summary.unified = Some(UnifiedSummary {
                    total_requests: summary.total_requests,
                    utilization_5h: latest.utilization_5h,
                    status_5h: latest.status_5h.clone(),
                    reset_5h: super::record::format_reset(&latest.reset_5h),
                    utilization_7d: latest.utilization_7d,
                    status_7d: latest.status_7d.clone(),
                    reset_7d: super::record::format_reset(&latest.reset_7d),
                    overage_status: latest.overage_status.clone(),
                    latest_record: Some(latest),
                });
            } else {
                summary.latest_limit = Some(latest);
            }
        }

        summary
    }

    fn in_window_records(&self) -> Vec<RateLimitRecord> {
        let cutoff = Self::retention_cutoff();
        self.records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.timestamp.map(|t| t > cutoff).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Persists the in-window records to the configured path. No path set is
    /// a no-op.
    pub fn save(&self) -> AppResult<()> {
        let Some(path) = rate_limit_file_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        write_snapshot(path, self.in_window_records())
    }

    /// Hydrates the store from the configured path. A missing file is not an
    /// error; malformed content surfaces as a decode error.
    pub fn load(&self) -> AppResult<()> {
        let Some(path) = rate_limit_file_path() else {
            return Ok(());
        };
        self.load_from(&path)
    }

    pub fn load_from(&self, path: &Path) -> AppResult<()> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(());
        }

        let snapshot: RateLimitSnapshot = serde_json::from_slice(&data)?;
        if let Ok(mut records) = self.records.write() {
            *records = snapshot.records;
            Self::cleanup_locked(&mut records);
        }
        Ok(())
    }
}

/// Atomic write: temp file then rename. Either step failing falls back to a
/// direct overwrite, so a reader snapshotting the path sees the old content
/// or the whole new content, never a truncated file.
fn write_snapshot(path: &Path, records: Vec<RateLimitRecord>) -> AppResult<()> {
    let snapshot = RateLimitSnapshot { records };
    let data = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if fs::write(&tmp, &data).is_err() {
        fs::write(path, &data)?;
        return Ok(());
    }
    if fs::rename(&tmp, path).is_err() {
        let _ = fs::remove_file(&tmp);
        fs::write(path, &data)?;
    }
    Ok(())
}

/// Launches the periodic snapshot writer, replacing any prior instance. The
/// task is cancellation-aware and exits within one tick of being cancelled.
pub fn start_auto_save(interval: StdDuration) {
    let token = CancellationToken::new();
    {
        let Ok(mut guard) = AUTOSAVE.lock() else {
            return;
        };
        if let Some(prev) = guard.take() {
            prev.cancel();
        }
        *guard = Some(token.clone());
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval fires immediately; skip it so the
        // cadence matches the configured period.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = RateLimitStore::global().save() {
                        tracing::debug!("ratelimit: periodic save failed: {}", e);
                    }
                }
            }
        }
    });
}

/// Cancels the auto-save task and performs one final synchronous save.
pub fn stop_auto_save() {
    if let Ok(mut guard) = AUTOSAVE.lock() {
        if let Some(token) = guard.take() {
            token.cancel();
        }
    }
    if let Err(e) = RateLimitStore::global().save() {
        tracing::debug!("ratelimit: final save failed: {}", e);
    }
}
