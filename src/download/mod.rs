//! Bulk download orchestration.
//!
//! [`DownloadOrchestrator`] turns a list of songs into persisted download
//! jobs. It skips songs that are already available offline or already
//! queued, enqueues the rest in fixed-size batches with a short pause
//! between batches, and keeps the playlist/album rows of the local mirror
//! in step with what was requested. Executing the jobs is the job of
//! [`worker::DownloadWorker`].

pub mod task_queue;
pub mod worker;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::models::{Album, Playlist, ServerConfig, Song};
use crate::api::{ApiError, CatalogClient};
use crate::config::CoreSettings;
use crate::db::{CachedPlaylist, LocalStore, StoreError};

pub use task_queue::{DurableTaskQueue, QueueError, SqliteTaskQueue};
pub use worker::{AlwaysOnline, Connectivity, DownloadWorker, JobOutcome};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Label shared by every job of one bulk operation, used to cancel the
/// remaining ones together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTag(String);

impl GroupTag {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn playlist(playlist_id: &str) -> Self {
        Self(format!("playlist:{playlist_id}"))
    }

    pub fn album(album_id: &str) -> Self {
        Self(format!("album:{album_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a worker needs to fetch one song, including a snapshot of the
/// server credentials taken at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub song: Song,
    pub server: ServerConfig,
    #[serde(default)]
    pub group: Option<GroupTag>,
}

impl DownloadJob {
    pub fn new(mut song: Song, server: ServerConfig, group: Option<GroupTag>) -> Self {
        song.server_id = server.id.clone();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            song,
            server,
            group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConstraints {
    pub requires_network: bool,
    pub persisted: bool,
}

impl JobConstraints {
    /// Constraints every download job carries.
    pub const fn download() -> Self {
        Self {
            requires_network: true,
            persisted: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueReport {
    pub requested: usize,
    pub enqueued: usize,
    pub skipped: usize,
    pub batches: usize,
}

pub struct DownloadOrchestrator {
    store: LocalStore,
    queue: Arc<dyn DurableTaskQueue>,
    settings: CoreSettings,
}

impl DownloadOrchestrator {
    pub fn new(
        store: LocalStore,
        queue: Arc<dyn DurableTaskQueue>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    /// Enqueues a download job for every song of `server` that is neither
    /// available offline nor already queued.
    ///
    /// Store and queue lookups all happen before the first job is enqueued.
    /// If enqueueing fails part way, the jobs this call already enqueued are
    /// withdrawn and the error is returned.
    pub async fn enqueue_songs(
        &self,
        songs: &[Song],
        server: &ServerConfig,
        group: Option<GroupTag>,
    ) -> Result<EnqueueReport, DownloadError> {
        let mut report = EnqueueReport {
            requested: songs.len(),
            ..EnqueueReport::default()
        };

        let mut seen = HashSet::<&str>::new();
        let mut jobs = Vec::<DownloadJob>::new();
        for song in songs {
            if song.id.trim().is_empty() || !seen.insert(song.id.as_str()) {
                report.skipped += 1;
                continue;
            }
            let offline = self
                .store
                .get_song(&server.id, &song.id)?
                .is_some_and(|cached| cached.is_available_offline());
            if offline || self.queue.is_queued(&server.id, &song.id).await? {
                report.skipped += 1;
                continue;
            }
            jobs.push(DownloadJob::new(song.clone(), server.clone(), group.clone()));
        }

        let mut enqueued_ids = Vec::<String>::with_capacity(jobs.len());
        for (index, batch) in jobs.chunks(self.settings.batch_size()).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.batch_delay()).await;
            }
            for job in batch {
                if let Err(err) = self.queue.enqueue(job, JobConstraints::download()).await {
                    log::error!(
                        "Enqueue failed after {} jobs, withdrawing them: {err}",
                        enqueued_ids.len()
                    );
                    if let Err(withdraw_err) = self.queue.withdraw(&enqueued_ids).await {
                        log::error!("Failed to withdraw enqueued jobs: {withdraw_err}");
                    }
                    return Err(err.into());
                }
                enqueued_ids.push(job.id.clone());
            }
            report.batches += 1;
        }

        report.enqueued = enqueued_ids.len();
        log::debug!(
            "Download request for {} songs: {} enqueued in {} batches, {} skipped",
            report.requested,
            report.enqueued,
            report.batches,
            report.skipped
        );
        Ok(report)
    }

    /// Mirrors the playlist and its full song order locally, then enqueues
    /// the songs under the `playlist:{id}` group.
    ///
    /// The relation always lists every song, including ones skipped because
    /// they are already downloaded or queued.
    pub async fn download_playlist(
        &self,
        playlist: &Playlist,
        songs: &[Song],
        server: &ServerConfig,
    ) -> Result<EnqueueReport, DownloadError> {
        let songs = with_server_id(songs, server);
        let mut cached = CachedPlaylist::from_playlist(playlist);
        cached.server_id = server.id.clone();
        cached.song_count = songs.len() as u32;
        self.store.save_playlist_with_songs(&cached, &songs)?;

        let report = self
            .enqueue_songs(&songs, server, Some(GroupTag::playlist(&playlist.id)))
            .await?;
        log::info!(
            "Playlist '{}': {} of {} songs queued for download",
            playlist.name,
            report.enqueued,
            report.requested
        );
        Ok(report)
    }

    /// Stores the album's song metadata and enqueues the songs under the
    /// `album:{id}` group.
    pub async fn download_album(
        &self,
        album: &Album,
        songs: &[Song],
        server: &ServerConfig,
    ) -> Result<EnqueueReport, DownloadError> {
        let songs = with_server_id(songs, server);
        self.store.upsert_songs(&songs)?;
        self.enqueue_songs(&songs, server, Some(GroupTag::album(&album.id)))
            .await
    }

    pub async fn download_remote_playlist(
        &self,
        client: &dyn CatalogClient,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<EnqueueReport, DownloadError> {
        let (playlist, songs) = client.get_playlist(server, playlist_id).await?;
        self.download_playlist(&playlist, &songs, server).await
    }

    pub async fn download_remote_album(
        &self,
        client: &dyn CatalogClient,
        server: &ServerConfig,
        album_id: &str,
    ) -> Result<EnqueueReport, DownloadError> {
        let (album, songs) = client.get_album(server, album_id).await?;
        self.download_album(&album, &songs, server).await
    }

    /// Cancels the group's remaining pending jobs. Completed downloads and
    /// playlist rows are kept.
    pub async fn cancel_group(&self, group: &GroupTag) -> Result<usize, DownloadError> {
        let cancelled = self.queue.cancel_group(group).await?;
        log::info!("Cancelled {cancelled} pending downloads for {group}");
        Ok(cancelled)
    }
}

fn with_server_id(songs: &[Song], server: &ServerConfig) -> Vec<Song> {
    songs
        .iter()
        .cloned()
        .map(|mut song| {
            song.server_id = server.id.clone();
            song
        })
        .collect()
}
