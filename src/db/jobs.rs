use std::time::Duration;

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, timestamp_ago, timestamp_in, LocalStore, StoreError};

const JOB_COLUMNS: &str =
    "id, song_id, server_id, group_tag, payload, state, attempts, last_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Pending,
    Started,
    Finished,
    Error,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "STARTED" => Self::Started,
            "FINISHED" => Self::Finished,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Error,
        }
    }
}

/// A row of the durable download queue. `payload` is the serialized job
/// descriptor and is opaque to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: String,
    pub song_id: String,
    pub server_id: String,
    pub group_tag: Option<String>,
    pub payload: String,
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl JobRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let state: String = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            song_id: row.get(1)?,
            server_id: row.get(2)?,
            group_tag: row.get(3)?,
            payload: row.get(4)?,
            state: JobState::parse(&state),
            attempts: row.get(6)?,
            last_error: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobCounts {
    pub pending: usize,
    pub started: usize,
    pub finished: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl JobCounts {
    /// Jobs that still have work ahead of them.
    pub fn active(&self) -> usize {
        self.pending + self.started
    }
}

impl LocalStore {
    pub fn insert_job(
        &self,
        id: &str,
        song_id: &str,
        server_id: &str,
        group_tag: Option<&str>,
        payload: &str,
    ) -> Result<(), StoreError> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO download_jobs
                    (id, song_id, server_id, group_tag, payload, state, attempts,
                     next_attempt_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7, ?7)",
                params![
                    id,
                    song_id,
                    server_id,
                    group_tag,
                    payload,
                    JobState::Pending.as_str(),
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn job(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {JOB_COLUMNS} FROM download_jobs WHERE id = ?1");
            Ok(conn
                .query_row(&sql, params![id], JobRecord::from_row)
                .optional()?)
        })
    }

    /// Whether a pending or running job exists for the song, including
    /// jobs waiting out a retry delay.
    pub fn has_active_job(&self, server_id: &str, song_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM download_jobs
                               WHERE server_id = ?1 AND song_id = ?2
                                 AND state IN ('PENDING', 'STARTED'))",
                params![server_id, song_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Deletes job rows outright. Returns how many were removed.
    pub fn delete_jobs(&self, ids: &[String]) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for id in ids {
                removed += tx.execute("DELETE FROM download_jobs WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Cancels the pending jobs of a group. Running and finished jobs are
    /// left as they are.
    pub fn cancel_job_group(&self, group_tag: &str) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE download_jobs SET state = 'CANCELLED', updated_at = ?2
                 WHERE group_tag = ?1 AND state = 'PENDING'",
                params![group_tag, now_timestamp()],
            )?)
        })
    }

    /// Atomically moves the oldest due pending job to `STARTED` and counts
    /// the attempt. Jobs whose retry delay has not passed are skipped.
    pub fn claim_next_job(&self) -> Result<Option<JobRecord>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM download_jobs
                 WHERE state = 'PENDING' AND next_attempt_at <= ?1
                 ORDER BY next_attempt_at, rowid LIMIT 1"
            );
            let Some(mut job) = tx
                .query_row(&sql, params![now], JobRecord::from_row)
                .optional()?
            else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE download_jobs
                 SET state = 'STARTED', attempts = attempts + 1, updated_at = ?2
                 WHERE id = ?1",
                params![job.id, now],
            )?;
            tx.commit()?;
            job.state = JobState::Started;
            job.attempts += 1;
            Ok(Some(job))
        })
    }

    pub fn finish_job(&self, id: &str) -> Result<(), StoreError> {
        self.set_job_state(id, JobState::Finished, None)
    }

    /// Records a failed attempt. Until `max_attempts` is used up the job
    /// goes back to `PENDING` and is not claimed again before `retry_delay`
    /// has passed; after that it ends in `ERROR`.
    pub fn fail_job(
        &self,
        id: &str,
        error: &str,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<JobState, StoreError> {
        let attempts = self
            .job(id)?
            .map(|job| job.attempts)
            .unwrap_or(max_attempts);
        if attempts >= max_attempts {
            self.set_job_state(id, JobState::Error, Some(error))?;
            return Ok(JobState::Error);
        }

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE download_jobs SET state = 'PENDING', last_error = ?2,
                        next_attempt_at = ?3, updated_at = ?4
                 WHERE id = ?1",
                params![id, error, timestamp_in(retry_delay), now_timestamp()],
            )?;
            Ok(())
        })?;
        Ok(JobState::Pending)
    }

    pub fn fail_job_permanently(&self, id: &str, error: &str) -> Result<(), StoreError> {
        self.set_job_state(id, JobState::Error, Some(error))
    }

    fn set_job_state(
        &self,
        id: &str,
        state: JobState,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE download_jobs SET state = ?2, last_error = COALESCE(?3, last_error),
                        updated_at = ?4
                 WHERE id = ?1",
                params![id, state.as_str(), error, now_timestamp()],
            )?;
            Ok(())
        })
    }

    /// Puts jobs left `STARTED` by an interrupted run back in the queue.
    pub fn reset_started_jobs(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE download_jobs SET state = 'PENDING', updated_at = ?1
                 WHERE state = 'STARTED'",
                params![now_timestamp()],
            )?)
        })
    }

    /// Deletes finished, cancelled and failed jobs last updated more than
    /// `older_than` ago. Returns how many rows were removed.
    pub fn prune_jobs(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = timestamp_ago(older_than);
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM download_jobs
                 WHERE state IN ('FINISHED', 'CANCELLED', 'ERROR') AND updated_at <= ?1",
                params![cutoff],
            )?)
        })
    }

    pub fn job_counts(&self) -> Result<JobCounts, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT state, COUNT(*) FROM download_jobs GROUP BY state")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = JobCounts::default();
            for row in rows {
                let (state, count) = row?;
                let count = count.max(0) as usize;
                match JobState::parse(&state) {
                    JobState::Pending => counts.pending += count,
                    JobState::Started => counts.started += count,
                    JobState::Finished => counts.finished += count,
                    JobState::Error => counts.error += count,
                    JobState::Cancelled => counts.cancelled += count,
                }
            }
            Ok(counts)
        })
    }
}
