use async_trait::async_trait;
use thiserror::Error;

use super::{DownloadJob, GroupTag, JobConstraints};
use crate::config::CoreSettings;
use crate::db::{JobCounts, JobState, LocalStore, StoreError};
use crate::offline_audio::JobError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Queue rejected job: {0}")]
    Rejected(String),
}

/// Persistent scheduler for download jobs.
#[async_trait]
pub trait DurableTaskQueue: Send + Sync {
    async fn enqueue(&self, job: &DownloadJob, constraints: JobConstraints)
        -> Result<(), QueueError>;

    /// Whether a pending or running job exists for the server's song.
    async fn is_queued(&self, server_id: &str, song_id: &str) -> Result<bool, QueueError>;

    /// Removes jobs that have not run yet. Used to undo a partial enqueue.
    async fn withdraw(&self, job_ids: &[String]) -> Result<usize, QueueError>;

    /// Stops the group's remaining pending jobs.
    async fn cancel_group(&self, group: &GroupTag) -> Result<usize, QueueError>;
}

/// A job handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub job: DownloadJob,
    pub attempt: u32,
}

/// [`DurableTaskQueue`] backed by the `download_jobs` table of the local
/// store. Jobs survive restarts; ones interrupted mid-run are put back with
/// [`SqliteTaskQueue::recover_interrupted`].
#[derive(Debug, Clone)]
pub struct SqliteTaskQueue {
    store: LocalStore,
    settings: CoreSettings,
}

impl SqliteTaskQueue {
    pub fn new(store: LocalStore, settings: &CoreSettings) -> Self {
        Self {
            store,
            settings: settings.clone(),
        }
    }

    fn max_attempts(&self) -> u32 {
        self.settings.max_download_attempts.max(1)
    }

    /// Claims the oldest pending job. Rows whose payload cannot be decoded
    /// are failed permanently and skipped.
    pub fn claim_next(&self) -> Result<Option<ClaimedJob>, QueueError> {
        while let Some(record) = self.store.claim_next_job()? {
            match serde_json::from_str::<DownloadJob>(&record.payload) {
                Ok(job) => {
                    return Ok(Some(ClaimedJob {
                        job,
                        attempt: record.attempts,
                    }))
                }
                Err(err) => {
                    log::error!("Dropping download job {} with bad payload: {err}", record.id);
                    self.store
                        .fail_job_permanently(&record.id, &JobError::from(err).to_string())?;
                }
            }
        }
        Ok(None)
    }

    pub fn complete(&self, job_id: &str) -> Result<(), QueueError> {
        Ok(self.store.finish_job(job_id)?)
    }

    /// Records failed attempt number `attempt`. Transient errors are
    /// retried after a growing delay until the attempt limit; anything else
    /// fails the job at once.
    pub fn fail(
        &self,
        job_id: &str,
        attempt: u32,
        error: &JobError,
    ) -> Result<JobState, QueueError> {
        let message = error.to_string();
        if error.is_transient() {
            let delay = self.settings.retry_delay(attempt);
            Ok(self
                .store
                .fail_job(job_id, &message, self.max_attempts(), delay)?)
        } else {
            self.store.fail_job_permanently(job_id, &message)?;
            Ok(JobState::Error)
        }
    }

    /// Requeues jobs left running by an interrupted process and drops
    /// settled jobs older than the retention period.
    pub fn recover_interrupted(&self) -> Result<usize, QueueError> {
        let recovered = self.store.reset_started_jobs()?;
        if recovered > 0 {
            log::info!("Requeued {recovered} interrupted download jobs");
        }
        let pruned = self.store.prune_jobs(self.settings.job_retention())?;
        if pruned > 0 {
            log::debug!("Pruned {pruned} settled download jobs");
        }
        Ok(recovered)
    }

    pub fn counts(&self) -> Result<JobCounts, QueueError> {
        Ok(self.store.job_counts()?)
    }
}

#[async_trait]
impl DurableTaskQueue for SqliteTaskQueue {
    async fn enqueue(
        &self,
        job: &DownloadJob,
        constraints: JobConstraints,
    ) -> Result<(), QueueError> {
        if !constraints.persisted {
            return Err(QueueError::Rejected(
                "only persisted jobs are supported".to_string(),
            ));
        }
        let payload = serde_json::to_string(job)?;
        self.store.insert_job(
            &job.id,
            &job.song.id,
            &job.server.id,
            job.group.as_ref().map(GroupTag::as_str),
            &payload,
        )?;
        Ok(())
    }

    async fn is_queued(&self, server_id: &str, song_id: &str) -> Result<bool, QueueError> {
        Ok(self.store.has_active_job(server_id, song_id)?)
    }

    async fn withdraw(&self, job_ids: &[String]) -> Result<usize, QueueError> {
        Ok(self.store.delete_jobs(job_ids)?)
    }

    async fn cancel_group(&self, group: &GroupTag) -> Result<usize, QueueError> {
        Ok(self.store.cancel_job_group(group.as_str())?)
    }
}
