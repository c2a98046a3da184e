//! Audio files on disk: where downloads land, how a download job is
//! executed and how downloaded audio is removed again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::api::{ApiError, CatalogClient};
use crate::db::{CachedSong, LocalStore, StoreError};
use crate::download::DownloadJob;

const AUDIO_EXTENSION: &str = "audio";
const PARTIAL_EXTENSION: &str = "part";

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Job payload is invalid: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Server credentials are incomplete")]
    MissingCredentials,
    #[error("Server returned an empty audio payload")]
    EmptyPayload,
    #[error("No audio cache directory available")]
    NoCacheDir,
}

impl JobError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(ApiError::Http(_)) | Self::Api(ApiError::EmptyBody) => true,
            Self::Api(ApiError::Status(status)) => *status >= 500 || *status == 429,
            Self::Api(_) => false,
            Self::Store(_) | Self::Io(_) | Self::EmptyPayload => true,
            Self::InvalidPayload(_) | Self::MissingCredentials | Self::NoCacheDir => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadStats {
    pub song_count: usize,
    pub total_size_bytes: u64,
}

fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// `{cache_dir}/{server}__{song}.audio`, both ids sanitized.
pub fn audio_file_path(cache_dir: &Path, server_id: &str, song_id: &str) -> PathBuf {
    let sid = sanitize_file_component(server_id);
    let song = sanitize_file_component(song_id);
    cache_dir.join(format!("{sid}__{song}.{AUDIO_EXTENSION}"))
}

/// Fetches the audio for one job, writes it under `cache_dir` and records
/// the song as downloaded. Returns the file path.
///
/// A song that is already available offline is not fetched again.
pub async fn execute_download_job(
    client: &dyn CatalogClient,
    store: &LocalStore,
    job: &DownloadJob,
    cache_dir: &Path,
) -> Result<PathBuf, JobError> {
    if !job.server.has_credentials() {
        return Err(JobError::MissingCredentials);
    }

    if let Some(path) = store
        .get_song(&job.server.id, &job.song.id)?
        .and_then(|cached| cached.local_path())
    {
        log::debug!("Song {} already downloaded, skipping fetch", job.song.id);
        return Ok(path);
    }

    let bytes = client.download_song(&job.server, &job.song.id).await?;
    if bytes.is_empty() {
        return Err(JobError::EmptyPayload);
    }

    tokio::fs::create_dir_all(cache_dir).await?;
    let path = audio_file_path(cache_dir, &job.server.id, &job.song.id);
    let partial = path.with_extension(PARTIAL_EXTENSION);
    if let Err(err) = write_then_rename(&partial, &path, &bytes).await {
        if let Err(cleanup_err) = tokio::fs::remove_file(&partial).await {
            if cleanup_err.kind() != ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {cleanup_err}", partial.display());
            }
        }
        return Err(err.into());
    }

    let mut song = job.song.clone();
    song.server_id = job.server.id.clone();
    store.mark_downloaded(&song, &path)?;

    log::debug!(
        "Downloaded '{}' ({} bytes) to {}",
        song.title,
        bytes.len(),
        path.display()
    );
    Ok(path)
}

async fn write_then_rename(partial: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(partial, bytes).await?;
    tokio::fs::rename(partial, path).await
}

fn remove_audio_file(path: &str) -> Result<bool, std::io::Error> {
    if path.is_empty() {
        return Ok(false);
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Removes a downloaded song's file and its store row (demoting the row
/// instead when a cached playlist still references it). Returns whether
/// the song was known.
pub fn delete_downloaded_song(
    store: &LocalStore,
    server_id: &str,
    song_id: &str,
) -> Result<bool, StoreError> {
    let Some(previous) = store.delete_song(server_id, song_id)? else {
        return Ok(false);
    };
    remove_audio_file(&previous.file_path)?;
    Ok(true)
}

/// Removes every downloaded song, along with the history of settled
/// download jobs. Returns the number of files deleted.
pub fn clear_downloads(store: &LocalStore) -> Result<usize, StoreError> {
    let removed_rows = store.delete_all_downloaded()?;
    let mut removed = 0usize;
    for row in removed_rows {
        match remove_audio_file(&row.file_path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(err) => log::warn!("Failed to remove {}: {err}", row.file_path),
        }
    }
    store.prune_jobs(Duration::ZERO)?;
    log::info!("Cleared {removed} downloaded audio files");
    Ok(removed)
}

/// Song count and bytes on disk for downloaded audio. Rows whose file has
/// gone missing are demoted first.
pub fn download_stats(store: &LocalStore) -> Result<DownloadStats, StoreError> {
    store.reconcile_missing_files()?;
    let mut stats = DownloadStats::default();
    for row in store.downloaded_rows()? {
        if let Ok(meta) = std::fs::metadata(&row.file_path) {
            stats.song_count += 1;
            stats.total_size_bytes = stats.total_size_bytes.saturating_add(meta.len());
        }
    }
    Ok(stats)
}

/// Deletes the least recently written downloads until at most `max_count`
/// songs and `max_size_mb` megabytes remain. Returns how many songs were
/// removed.
pub fn prune_download_cache(
    store: &LocalStore,
    max_count: usize,
    max_size_mb: u64,
) -> Result<usize, StoreError> {
    store.reconcile_missing_files()?;

    let mut files = Vec::<(CachedSong, u64, SystemTime)>::new();
    let mut total_bytes = 0u64;
    for row in store.downloaded_rows()? {
        let Ok(meta) = std::fs::metadata(&row.file_path) else {
            continue;
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        total_bytes = total_bytes.saturating_add(meta.len());
        files.push((row, meta.len(), modified));
    }

    let max_bytes = max_size_mb.saturating_mul(1024 * 1024);
    let mut remaining = files.len();
    if remaining <= max_count && total_bytes <= max_bytes {
        return Ok(0);
    }

    files.sort_by_key(|(_, _, modified)| *modified);
    let mut removed = 0usize;
    for (song, size, _) in files {
        if remaining <= max_count && total_bytes <= max_bytes {
            break;
        }
        if delete_downloaded_song(store, &song.server_id, &song.id)? {
            total_bytes = total_bytes.saturating_sub(size);
            remaining -= 1;
            removed += 1;
        }
    }

    log::info!("Pruned {removed} downloads from the audio cache");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockCatalogClient;
    use crate::db::test_support::{server, song};
    use crate::download::DownloadJob;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn client_with_audio() -> MockCatalogClient {
        MockCatalogClient {
            audio: b"ID3 audio bytes".to_vec(),
            ..MockCatalogClient::default()
        }
    }

    #[test_log::test]
    fn file_names_are_sanitized() {
        let path = audio_file_path(Path::new("/cache"), "srv/1", "song id");
        assert_eq!(path, PathBuf::from("/cache/srv_1__song_id.audio"));
        assert_eq!(sanitize_file_component(""), "unknown");
    }

    #[test_log::test(tokio::test)]
    async fn job_writes_file_and_marks_song_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let job = DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None);

        let path = execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"ID3 audio bytes");
        let row = store.get_song("srv", "1").unwrap().unwrap();
        assert!(row.is_available_offline());
        assert_eq!(row.local_path(), Some(path));
    }

    #[test_log::test(tokio::test)]
    async fn already_downloaded_song_is_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let job = DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None);

        execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap();
        execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap();
        assert_eq!(client.downloads(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn missing_credentials_fail_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let mut creds = server();
        creds.token.clear();
        let job = DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), creds, None);

        let err = execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::MissingCredentials));
        assert!(!err.is_transient());
        assert_eq!(client.downloads(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn server_errors_are_transient() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        client.download_failures.store(1, Ordering::SeqCst);
        let job = DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None);

        let err = execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(store.get_song("srv", "1").unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn delete_and_clear_remove_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let first = execute_download_job(
            &client,
            &store,
            &DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None),
            dir.path(),
        )
        .await
        .unwrap();
        let second = execute_download_job(
            &client,
            &store,
            &DownloadJob::new(song("2", "Sweet Dreams", "Beyonce", "I Am"), server(), None),
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(
            download_stats(&store).unwrap(),
            DownloadStats {
                song_count: 2,
                total_size_bytes: 30,
            }
        );

        assert!(delete_downloaded_song(&store, "srv", "1").unwrap());
        assert!(!first.exists());
        assert!(!delete_downloaded_song(&store, "srv", "1").unwrap());

        assert_eq!(clear_downloads(&store).unwrap(), 1);
        assert!(!second.exists());
        assert_eq!(download_stats(&store).unwrap(), DownloadStats::default());
    }

    #[test_log::test(tokio::test)]
    async fn prune_keeps_the_newest_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        for id in ["1", "2", "3"] {
            let job = DownloadJob::new(song(id, &format!("Song {id}"), "A", "B"), server(), None);
            execute_download_job(&client, &store, &job, dir.path())
                .await
                .unwrap();
        }

        assert_eq!(prune_download_cache(&store, 10, 1024).unwrap(), 0);
        assert_eq!(prune_download_cache(&store, 1, 1024).unwrap(), 2);
        assert_eq!(download_stats(&store).unwrap().song_count, 1);
    }

    #[test_log::test(tokio::test)]
    async fn same_song_id_on_another_server_is_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let mut work = server();
        work.id = "srv-b".to_string();

        let home = execute_download_job(
            &client,
            &store,
            &DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None),
            dir.path(),
        )
        .await
        .unwrap();
        let other = execute_download_job(
            &client,
            &store,
            &DownloadJob::new(song("1", "Intro", "Other", "Other"), work, None),
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(client.downloads(), 2);
        assert_ne!(home, other);
        assert!(home.exists());
        assert_eq!(store.downloaded_songs("srv-b").unwrap().len(), 1);
        assert_eq!(store.downloaded_songs("srv").unwrap().len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_in_memory().unwrap();
        let client = client_with_audio();
        let target = audio_file_path(dir.path(), "srv", "1");
        std::fs::create_dir_all(target.join("blocker")).unwrap();
        let job = DownloadJob::new(song("1", "Halo", "Beyonce", "I Am"), server(), None);

        let err = execute_download_job(&client, &store, &job, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Io(_)));
        assert!(!target.with_extension(PARTIAL_EXTENSION).exists());
        assert!(store.get_song("srv", "1").unwrap().is_none());
    }

    #[test_log::test]
    fn clearing_downloads_drops_settled_job_history() {
        let store = LocalStore::open_in_memory().unwrap();
        store.insert_job("j1", "1", "srv", None, "{}").unwrap();
        store.insert_job("j2", "2", "srv", None, "{}").unwrap();
        store.claim_next_job().unwrap();
        store.finish_job("j1").unwrap();

        clear_downloads(&store).unwrap();

        let counts = store.job_counts().unwrap();
        assert_eq!(counts.finished, 0);
        assert_eq!(counts.pending, 1);
    }
}
