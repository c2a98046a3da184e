use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::task_queue::{ClaimedJob, SqliteTaskQueue};
use super::DownloadError;
use crate::api::CatalogClient;
use crate::config::CoreSettings;
use crate::db::{JobState, LocalStore};
use crate::offline_audio::{self, JobError};

/// Reports whether the device currently has a usable network connection.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Downloaded(PathBuf),
    /// Failed, but will be attempted again.
    Retrying,
    Failed,
}

/// Executes queued download jobs while the device is online.
pub struct DownloadWorker {
    queue: Arc<SqliteTaskQueue>,
    client: Arc<dyn CatalogClient>,
    store: LocalStore,
    connectivity: Arc<dyn Connectivity>,
    settings: CoreSettings,
}

impl DownloadWorker {
    pub fn new(
        queue: Arc<SqliteTaskQueue>,
        client: Arc<dyn CatalogClient>,
        store: LocalStore,
        connectivity: Arc<dyn Connectivity>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            queue,
            client,
            store,
            connectivity,
            settings,
        }
    }

    /// Claims and executes one job. `None` when the queue has nothing
    /// pending.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, DownloadError> {
        let Some(ClaimedJob { job, attempt }) = self.queue.claim_next()? else {
            return Ok(None);
        };

        let result = match self.settings.resolved_audio_cache_dir() {
            Some(dir) => {
                offline_audio::execute_download_job(self.client.as_ref(), &self.store, &job, &dir)
                    .await
            }
            None => Err(JobError::NoCacheDir),
        };

        let outcome = match result {
            Ok(path) => {
                self.queue.complete(&job.id)?;
                JobOutcome::Downloaded(path)
            }
            Err(err) => {
                log::warn!(
                    "Download of '{}' failed on attempt {attempt}: {err}",
                    job.song.title
                );
                match self.queue.fail(&job.id, attempt, &err)? {
                    JobState::Pending => JobOutcome::Retrying,
                    _ => JobOutcome::Failed,
                }
            }
        };
        Ok(Some(outcome))
    }

    /// Runs jobs on the current task until none are due or the device goes
    /// offline. Jobs waiting out a retry delay are left for a later run.
    /// Returns how many jobs were processed.
    pub async fn run_until_idle(&self) -> Result<usize, DownloadError> {
        let mut processed = 0usize;
        while self.connectivity.is_online().await {
            match self.run_once().await? {
                Some(_) => processed += 1,
                None => break,
            }
        }
        Ok(processed)
    }

    /// Requeues interrupted jobs and starts the configured number of worker
    /// tasks. They stop between jobs once `token` is cancelled.
    pub fn spawn(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>, DownloadError> {
        self.queue.recover_interrupted()?;
        let count = self.settings.worker_count();
        log::info!("Starting {count} download workers");
        Ok((0..count)
            .map(|index| tokio::spawn(self.clone().work(index, token.clone())))
            .collect())
    }

    async fn work(self: Arc<Self>, index: usize, token: CancellationToken) {
        while !token.is_cancelled() {
            let worked = if self.connectivity.is_online().await {
                match self.run_once().await {
                    Ok(outcome) => outcome.is_some(),
                    Err(err) => {
                        log::error!("Download worker {index} failed to process a job: {err}");
                        false
                    }
                }
            } else {
                false
            };

            if !worked {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval()) => {}
                }
            }
        }
        log::debug!("Download worker {index} stopped");
    }
}
