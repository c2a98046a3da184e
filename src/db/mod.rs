//! Local cache store.
//!
//! A single SQLite connection behind a mutex mirrors the parts of the remote
//! catalog that matter offline: songs (with their download state), playlists
//! and their ordered song relation, configured servers, persisted settings
//! and the durable download job table.
//!
//! All access is serialized through one connection, so the store is the
//! single writer for everything it holds. Operations that touch more than one
//! row set run inside a transaction.

mod jobs;
mod models;
mod playlists;
mod songs;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::models::ServerConfig;
use crate::config::{self, CoreSettings};

pub use jobs::{JobCounts, JobRecord, JobState};
pub use models::{CachedPlaylist, CachedSong, PlaylistWithSongs};

const SETTINGS_KEY: &str = "core_settings";
const PLAYBACK_KEY: &str = "playback_state";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS servers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    username TEXT NOT NULL,
    token TEXT NOT NULL,
    salt TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS songs (
    id TEXT NOT NULL,
    server_id TEXT NOT NULL,
    title TEXT NOT NULL,
    title_key TEXT NOT NULL,
    artist TEXT,
    artist_key TEXT,
    album TEXT,
    album_key TEXT,
    album_id TEXT,
    genre TEXT,
    genre_key TEXT,
    track INTEGER,
    disc_number INTEGER,
    year INTEGER,
    duration INTEGER NOT NULL DEFAULT 0,
    cover_art TEXT,
    file_path TEXT NOT NULL DEFAULT '',
    downloaded INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (server_id, id)
);
CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(server_id, title_key);
CREATE INDEX IF NOT EXISTS idx_songs_album ON songs(server_id, album_key);
CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(server_id, artist_key);
CREATE INDEX IF NOT EXISTS idx_songs_genre ON songs(server_id, genre_key);

CREATE TABLE IF NOT EXISTS playlists (
    id TEXT NOT NULL,
    server_id TEXT NOT NULL,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL,
    cover_art TEXT,
    song_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (server_id, id)
);
CREATE INDEX IF NOT EXISTS idx_playlists_name ON playlists(server_id, name_key);

CREATE TABLE IF NOT EXISTS playlist_songs (
    server_id TEXT NOT NULL,
    playlist_id TEXT NOT NULL,
    song_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (server_id, playlist_id, position),
    FOREIGN KEY (server_id, playlist_id) REFERENCES playlists(server_id, id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_playlist_songs_song ON playlist_songs(server_id, song_id);

CREATE TABLE IF NOT EXISTS download_jobs (
    id TEXT PRIMARY KEY,
    song_id TEXT NOT NULL,
    server_id TEXT NOT NULL,
    group_tag TEXT,
    payload TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    next_attempt_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_download_jobs_state ON download_jobs(state, next_attempt_at);
CREATE INDEX IF NOT EXISTS idx_download_jobs_song ON download_jobs(server_id, song_id, state);
CREATE INDEX IF NOT EXISTS idx_download_jobs_group ON download_jobs(group_tag, state);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("No data directory available for the database")]
    NoDataDir,
}

/// The last queue handed to the playback controller, kept so a `continue`
/// request can rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlaybackState {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub song_ids: Vec<String>,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub current_song_id: Option<String>,
}

#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

/// Longest offset accepted by the timestamp helpers.
const MAX_TIMESTAMP_OFFSET: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn offset(by: Duration) -> TimeDelta {
    TimeDelta::from_std(by.min(MAX_TIMESTAMP_OFFSET)).unwrap_or_else(|_| TimeDelta::zero())
}

/// UTC timestamps in one fixed format, so they also compare as strings.
pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn timestamp_in(by: Duration) -> String {
    format_timestamp(Utc::now() + offset(by))
}

pub(crate) fn timestamp_ago(by: Duration) -> String {
    format_timestamp(Utc::now() - offset(by))
}

/// Normalized form used for every case-insensitive exact match.
pub(crate) fn match_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl LocalStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::from_connection(conn)
    }

    /// Opens the database at the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = config::default_database_path().ok_or(StoreError::NoDataDir)?;
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("Local cache store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut conn)
    }

    // Servers

    /// Inserts or replaces a server. Saving an active server deactivates
    /// every other one.
    pub fn save_server(&self, server: &ServerConfig) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if server.active {
                tx.execute(
                    "UPDATE servers SET active = 0 WHERE id != ?1",
                    params![server.id],
                )?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO servers (id, name, url, username, token, salt, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    server.id,
                    server.name,
                    server.url,
                    server.username,
                    server.token,
                    server.salt,
                    server.active,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn load_servers(&self) -> Result<Vec<ServerConfig>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, url, username, token, salt, active FROM servers ORDER BY name",
            )?;
            let servers = stmt
                .query_map([], server_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(servers)
        })
    }

    pub fn active_server(&self) -> Result<Option<ServerConfig>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, url, username, token, salt, active
                     FROM servers WHERE active = 1 LIMIT 1",
                    [],
                    server_from_row,
                )
                .optional()?)
        })
    }

    /// Makes `server_id` the only active server. Returns `false` (and
    /// changes nothing) when the id is unknown.
    pub fn set_active_server(&self, server_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM servers WHERE id = ?1)",
                params![server_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }
            tx.execute("UPDATE servers SET active = (id = ?1)", params![server_id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn delete_server(&self, server_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM servers WHERE id = ?1", params![server_id])?;
            Ok(removed > 0)
        })
    }

    // Settings

    pub fn save_settings(&self, settings: &CoreSettings) -> Result<(), StoreError> {
        self.put_json(SETTINGS_KEY, settings)
    }

    pub fn load_settings(&self) -> Result<CoreSettings, StoreError> {
        Ok(self.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_playback_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        self.put_json(PLAYBACK_KEY, state)
    }

    pub fn load_playback_state(&self) -> Result<PlaybackState, StoreError> {
        Ok(self.get_json(PLAYBACK_KEY)?.unwrap_or_default())
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, json],
            )?;
            Ok(())
        })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let json: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

fn server_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServerConfig> {
    Ok(ServerConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        username: row.get(3)?,
        token: row.get(4)?,
        salt: row.get(5)?,
        active: row.get(6)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::api::models::{ServerConfig, Song};

    pub fn server() -> ServerConfig {
        ServerConfig {
            id: "srv".to_string(),
            name: "Home".to_string(),
            url: "https://music.example.com".to_string(),
            username: "alice".to_string(),
            token: "tok".to_string(),
            salt: "salt".to_string(),
            active: true,
        }
    }

    pub fn song(id: &str, title: &str, artist: &str, album: &str) -> Song {
        Song {
            id: id.to_string(),
            title: title.to_string(),
            artist: Some(artist.to_string()),
            album: Some(album.to_string()),
            album_id: Some(format!("al-{}", album.to_lowercase().replace(' ', "-"))),
            duration: 200,
            server_id: "srv".to_string(),
            ..Song::default()
        }
    }
}
