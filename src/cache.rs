//! Short-TTL persistence of the last detection outcome
//!
//! One JSON document per user avoids re-running the probe pipeline on every
//! call. Anything wrong with the file — missing, unparsable, expired,
//! recorded for a different platform — is a silent cache miss, never an
//! error: detection is idempotent and safe to repeat. The file is written
//! without cross-process locking; concurrent writers can clobber each
//! other's entry, which only costs a re-probe.

use crate::types::{DetectionResult, HostPlatform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Confirmed installs stay valid for a while.
pub const SUCCESS_TTL: Duration = Duration::from_secs(30 * 60);

/// Failed detections retry much sooner (the user may be installing the CLI
/// right now).
pub const FAILURE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: DateTime<Utc>,
    platform: HostPlatform,
    ttl_secs: u64,
    result: DetectionResult,
}

/// On-disk cache for the last [`DetectionResult`].
#[derive(Debug, Clone)]
pub struct DetectionCache {
    path: PathBuf,
}

impl DetectionCache {
    /// Cache at the per-user default location.
    #[must_use]
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: base.join("claude-scout").join("detection.json"),
        }
    }

    /// Cache backed by an explicit file (tests, alternate profiles).
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the cached result, if there is a valid one for this host.
    #[must_use]
    pub fn get(&self) -> Option<DetectionResult> {
        let content = fs::read_to_string(&self.path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;

        if entry.platform != HostPlatform::current() {
            tracing::debug!(
                target: "claude_scout::cache",
                "cache entry recorded for a different platform, ignoring"
            );
            return None;
        }

        let age = Utc::now().signed_duration_since(entry.timestamp);
        if age.num_seconds() < 0 || age.num_seconds() as u64 >= entry.ttl_secs {
            tracing::debug!(
                target: "claude_scout::cache",
                age_secs = age.num_seconds(),
                ttl_secs = entry.ttl_secs,
                "cache entry expired"
            );
            return None;
        }

        Some(entry.result)
    }

    /// Persist a detection outcome. TTL depends on success; write failures
    /// are logged and swallowed.
    pub fn put(&self, result: &DetectionResult) {
        let ttl = if result.success {
            SUCCESS_TTL
        } else {
            FAILURE_TTL
        };

        let entry = CacheEntry {
            timestamp: Utc::now(),
            platform: HostPlatform::current(),
            ttl_secs: ttl.as_secs(),
            result: result.clone(),
        };

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&entry)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            fs::write(&self.path, json)
        };

        if let Err(e) = write() {
            tracing::debug!(
                target: "claude_scout::cache",
                error = %e,
                path = %self.path.display(),
                "failed to write detection cache"
            );
        }
    }

    /// Delete the cache file; forces the next detection to probe fresh.
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}
