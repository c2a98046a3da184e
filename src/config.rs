use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "offline-catalog";
const AUDIO_CACHE_SUBDIR: &str = "audio_cache";
const DATABASE_FILE: &str = "catalog.db";
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10 * 60);

/// Tunables for the resolver, the download orchestrator and the worker pool.
///
/// Stored as a JSON blob in the `settings` table; fields missing from an
/// older blob fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSettings {
    #[serde(default = "default_download_batch_size")]
    pub download_batch_size: usize,
    #[serde(default = "default_download_batch_delay_ms")]
    pub download_batch_delay_ms: u64,
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,
    #[serde(default = "default_max_download_attempts")]
    pub max_download_attempts: u32,
    /// Delay before the first retry of a failed download. Doubles with
    /// every further attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How long finished, cancelled and failed jobs are kept.
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: u64,
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
    #[serde(default = "default_remote_search_song_count")]
    pub remote_search_song_count: u32,
    #[serde(default = "default_remote_collection_limit")]
    pub remote_collection_limit: u32,
    #[serde(default)]
    pub audio_cache_dir: Option<PathBuf>,
}

fn default_download_batch_size() -> usize {
    50
}

fn default_download_batch_delay_ms() -> u64 {
    100
}

fn default_download_workers() -> usize {
    2
}

fn default_max_download_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    5_000
}

fn default_job_retention_hours() -> u64 {
    24
}

fn default_worker_poll_interval_ms() -> u64 {
    500
}

fn default_remote_search_song_count() -> u32 {
    20
}

fn default_remote_collection_limit() -> u32 {
    50
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            download_batch_size: default_download_batch_size(),
            download_batch_delay_ms: default_download_batch_delay_ms(),
            download_workers: default_download_workers(),
            max_download_attempts: default_max_download_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            job_retention_hours: default_job_retention_hours(),
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
            remote_search_song_count: default_remote_search_song_count(),
            remote_collection_limit: default_remote_collection_limit(),
            audio_cache_dir: None,
        }
    }
}

impl CoreSettings {
    /// Batch size, never zero.
    pub fn batch_size(&self) -> usize {
        self.download_batch_size.max(1)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.download_batch_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms.max(10))
    }

    /// Wait before retrying a job that has failed `attempt` times,
    /// capped at ten minutes.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_hours.saturating_mul(3600))
    }

    pub fn worker_count(&self) -> usize {
        self.download_workers.clamp(1, 16)
    }

    /// Directory downloaded audio is written to. `None` only when no
    /// override is set and the platform has no cache directory.
    pub fn resolved_audio_cache_dir(&self) -> Option<PathBuf> {
        match &self.audio_cache_dir {
            Some(dir) => Some(dir.clone()),
            None => Some(dirs::cache_dir()?.join(APP_DIR).join(AUDIO_CACHE_SUBDIR)),
        }
    }
}

pub fn default_database_path() -> Option<PathBuf> {
    Some(dirs::data_dir()?.join(APP_DIR).join(DATABASE_FILE))
}
