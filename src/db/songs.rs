use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::models::SONG_COLUMNS;
use super::{match_key, now_timestamp, CachedSong, LocalStore, StoreError};
use crate::api::models::Song;

const NATURAL_ORDER: &str = "s.artist_key, s.album_key, s.disc_number, s.track, s.title_key, s.id";
const ALBUM_ORDER: &str = "s.album_id, s.disc_number, s.track, s.title_key, s.id";

/// Writes a song's metadata. Download state is only touched when
/// `file_path` is given, in which case the row is marked downloaded.
pub(crate) fn upsert_song(
    conn: &Connection,
    song: &Song,
    file_path: Option<&str>,
) -> Result<(), StoreError> {
    let keys = (
        match_key(&song.title),
        song.artist.as_deref().map(match_key),
        song.album.as_deref().map(match_key),
        song.genre.as_deref().map(match_key),
    );
    let download_update = if file_path.is_some() {
        ", file_path = excluded.file_path, downloaded = excluded.downloaded"
    } else {
        ""
    };
    let sql = format!(
        "INSERT INTO songs (id, server_id, title, title_key, artist, artist_key, album, album_key,
                            album_id, genre, genre_key, track, disc_number, year, duration,
                            cover_art, file_path, downloaded, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
         ON CONFLICT(server_id, id) DO UPDATE SET
            title = excluded.title,
            title_key = excluded.title_key,
            artist = excluded.artist,
            artist_key = excluded.artist_key,
            album = excluded.album,
            album_key = excluded.album_key,
            album_id = excluded.album_id,
            genre = excluded.genre,
            genre_key = excluded.genre_key,
            track = excluded.track,
            disc_number = excluded.disc_number,
            year = excluded.year,
            duration = excluded.duration,
            cover_art = excluded.cover_art,
            updated_at = excluded.updated_at{download_update}"
    );
    conn.execute(
        &sql,
        params![
            song.id,
            song.server_id,
            song.title,
            keys.0,
            song.artist,
            keys.1,
            song.album,
            keys.2,
            song.album_id,
            song.genre,
            keys.3,
            song.track,
            song.disc_number,
            song.year,
            song.duration,
            song.cover_art,
            file_path.unwrap_or_default(),
            file_path.is_some(),
            now_timestamp(),
        ],
    )?;
    Ok(())
}

fn select_song(
    conn: &Connection,
    server_id: &str,
    song_id: &str,
) -> Result<Option<CachedSong>, StoreError> {
    let sql = format!("SELECT {SONG_COLUMNS} FROM songs s WHERE s.server_id = ?1 AND s.id = ?2");
    Ok(conn
        .query_row(&sql, params![server_id, song_id], CachedSong::from_row)
        .optional()?)
}

/// Runs a query over downloaded rows and keeps the ones whose file is
/// still on disk.
fn query_available(
    conn: &Connection,
    filter: &str,
    order: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<CachedSong>, StoreError> {
    let sql = format!(
        "SELECT {SONG_COLUMNS} FROM songs s WHERE s.downloaded = 1 AND {filter} ORDER BY {order}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, CachedSong::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .filter(CachedSong::is_available_offline)
        .collect())
}

impl LocalStore {
    pub fn get_song(
        &self,
        server_id: &str,
        song_id: &str,
    ) -> Result<Option<CachedSong>, StoreError> {
        self.with_conn(|conn| select_song(conn, server_id, song_id))
    }

    /// Inserts or refreshes metadata rows without touching download state.
    pub fn upsert_songs(&self, songs: &[Song]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for song in songs {
                upsert_song(&tx, song, None)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn mark_downloaded(&self, song: &Song, file_path: &Path) -> Result<(), StoreError> {
        let file_path = file_path.to_string_lossy();
        self.with_conn(|conn| upsert_song(conn, song, Some(&file_path)))
    }

    /// Every song of `server_id` that is available offline.
    pub fn downloaded_songs(&self, server_id: &str) -> Result<Vec<CachedSong>, StoreError> {
        self.with_conn(|conn| {
            query_available(conn, "s.server_id = ?1", NATURAL_ORDER, params![server_id])
        })
    }

    /// Offline songs whose title (and artist, when given) equal the
    /// arguments case-insensitively.
    pub fn find_downloaded_by_title(
        &self,
        server_id: &str,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Vec<CachedSong>, StoreError> {
        let title = match_key(title);
        let artist = artist.map(match_key);
        self.with_conn(|conn| {
            query_available(
                conn,
                "s.server_id = ?1 AND s.title_key = ?2 AND (?3 IS NULL OR s.artist_key = ?3)",
                NATURAL_ORDER,
                params![server_id, title, artist],
            )
        })
    }

    pub fn find_downloaded_by_album(
        &self,
        server_id: &str,
        album: &str,
        artist: Option<&str>,
    ) -> Result<Vec<CachedSong>, StoreError> {
        let album = match_key(album);
        let artist = artist.map(match_key);
        self.with_conn(|conn| {
            query_available(
                conn,
                "s.server_id = ?1 AND s.album_key = ?2 AND (?3 IS NULL OR s.artist_key = ?3)",
                ALBUM_ORDER,
                params![server_id, album, artist],
            )
        })
    }

    pub fn find_downloaded_by_artist(
        &self,
        server_id: &str,
        artist: &str,
    ) -> Result<Vec<CachedSong>, StoreError> {
        let artist = match_key(artist);
        self.with_conn(|conn| {
            query_available(
                conn,
                "s.server_id = ?1 AND s.artist_key = ?2",
                NATURAL_ORDER,
                params![server_id, artist],
            )
        })
    }

    pub fn find_downloaded_by_genre(
        &self,
        server_id: &str,
        genre: &str,
    ) -> Result<Vec<CachedSong>, StoreError> {
        let genre = match_key(genre);
        self.with_conn(|conn| {
            query_available(
                conn,
                "s.server_id = ?1 AND s.genre_key = ?2",
                NATURAL_ORDER,
                params![server_id, genre],
            )
        })
    }

    /// Offline songs released between `from_year` and `to_year` inclusive.
    pub fn find_downloaded_by_year_range(
        &self,
        server_id: &str,
        from_year: u32,
        to_year: u32,
    ) -> Result<Vec<CachedSong>, StoreError> {
        self.with_conn(|conn| {
            query_available(
                conn,
                "s.server_id = ?1 AND s.year BETWEEN ?2 AND ?3",
                "s.year, s.album_id, s.disc_number, s.track, s.title_key, s.id",
                params![server_id, from_year, to_year],
            )
        })
    }

    /// Offline songs from the same album as `song`, in disc/track order.
    /// Falls back to just `song` when it carries no album.
    pub fn album_context(&self, song: &CachedSong) -> Result<Vec<CachedSong>, StoreError> {
        let context = if let Some(album_id) = song.album_id.as_deref() {
            self.with_conn(|conn| {
                query_available(
                    conn,
                    "s.server_id = ?1 AND s.album_id = ?2",
                    ALBUM_ORDER,
                    params![song.server_id, album_id],
                )
            })?
        } else if let Some(album) = song.album.as_deref() {
            self.find_downloaded_by_album(&song.server_id, album, None)?
        } else {
            Vec::new()
        };

        if context.iter().any(|candidate| candidate.id == song.id) {
            Ok(context)
        } else {
            Ok(vec![song.clone()])
        }
    }

    /// Rows flagged as downloaded, whether or not their file still exists.
    pub fn downloaded_rows(&self) -> Result<Vec<CachedSong>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SONG_COLUMNS} FROM songs s WHERE s.downloaded = 1 ORDER BY {NATURAL_ORDER}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], CachedSong::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Removes a song from the local mirror and returns the row as it was.
    ///
    /// A song still referenced by a cached playlist is demoted to metadata
    /// only; otherwise the row is deleted. The backing file is left alone.
    pub fn delete_song(
        &self,
        server_id: &str,
        song_id: &str,
    ) -> Result<Option<CachedSong>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(previous) = select_song(&tx, server_id, song_id)? else {
                return Ok(None);
            };

            let referenced: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM playlist_songs WHERE server_id = ?1 AND song_id = ?2)",
                params![server_id, song_id],
                |row| row.get(0),
            )?;
            if referenced {
                tx.execute(
                    "UPDATE songs SET downloaded = 0, file_path = '', updated_at = ?3
                     WHERE server_id = ?1 AND id = ?2",
                    params![server_id, song_id, now_timestamp()],
                )?;
            } else {
                tx.execute(
                    "DELETE FROM songs WHERE server_id = ?1 AND id = ?2",
                    params![server_id, song_id],
                )?;
            }
            tx.commit()?;
            Ok(Some(previous))
        })
    }

    /// Applies [`LocalStore::delete_song`] to every downloaded row at once
    /// and returns the rows that were downloaded.
    pub fn delete_all_downloaded(&self) -> Result<Vec<CachedSong>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let removed = {
                let sql = format!("SELECT {SONG_COLUMNS} FROM songs s WHERE s.downloaded = 1");
                let mut stmt = tx.prepare(&sql)?;
                let rows = stmt.query_map([], CachedSong::from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.execute(
                "UPDATE songs SET downloaded = 0, file_path = '', updated_at = ?1
                 WHERE downloaded = 1 AND EXISTS(
                    SELECT 1 FROM playlist_songs ps
                    WHERE ps.server_id = songs.server_id AND ps.song_id = songs.id)",
                params![now_timestamp()],
            )?;
            tx.execute("DELETE FROM songs WHERE downloaded = 1", [])?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Demotes downloaded rows whose file disappeared. Returns how many
    /// rows changed.
    pub fn reconcile_missing_files(&self) -> Result<usize, StoreError> {
        let stale: Vec<(String, String)> = self
            .downloaded_rows()?
            .into_iter()
            .filter(|song| !song.is_available_offline())
            .map(|song| (song.server_id, song.id))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let updated_at = now_timestamp();
            for (server_id, song_id) in &stale {
                tx.execute(
                    "UPDATE songs SET downloaded = 0, file_path = '', updated_at = ?3
                     WHERE server_id = ?1 AND id = ?2",
                    params![server_id, song_id, updated_at],
                )?;
            }
            tx.commit()?;
            log::info!("Demoted {} songs whose audio file is missing", stale.len());
            Ok(stale.len())
        })
    }
}
