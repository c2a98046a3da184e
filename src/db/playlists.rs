use rusqlite::{params, Connection, OptionalExtension};

use super::models::SONG_COLUMNS;
use super::songs::upsert_song;
use super::{
    match_key, now_timestamp, CachedPlaylist, CachedSong, LocalStore, PlaylistWithSongs, StoreError,
};
use crate::api::models::Song;

const PLAYLIST_COLUMNS: &str = "id, server_id, name, cover_art, song_count";

fn upsert_playlist_row(conn: &Connection, playlist: &CachedPlaylist) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO playlists (id, server_id, name, name_key, cover_art, song_count, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(server_id, id) DO UPDATE SET
            name = excluded.name,
            name_key = excluded.name_key,
            cover_art = excluded.cover_art,
            song_count = excluded.song_count,
            updated_at = excluded.updated_at",
        params![
            playlist.id,
            playlist.server_id,
            playlist.name,
            match_key(&playlist.name),
            playlist.cover_art,
            playlist.song_count,
            now_timestamp(),
        ],
    )?;
    Ok(())
}

fn replace_relation(
    conn: &Connection,
    server_id: &str,
    playlist_id: &str,
    song_ids: &[String],
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM playlist_songs WHERE server_id = ?1 AND playlist_id = ?2",
        params![server_id, playlist_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO playlist_songs (server_id, playlist_id, song_id, position)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, song_id) in song_ids.iter().enumerate() {
        stmt.execute(params![server_id, playlist_id, song_id, position as i64])?;
    }
    Ok(())
}

fn playlist_songs(
    conn: &Connection,
    playlist: &CachedPlaylist,
) -> Result<Vec<CachedSong>, StoreError> {
    let sql = format!(
        "SELECT {SONG_COLUMNS} FROM playlist_songs ps
         JOIN songs s ON s.server_id = ps.server_id AND s.id = ps.song_id
         WHERE ps.server_id = ?1 AND ps.playlist_id = ?2
         ORDER BY ps.position"
    );
    let mut stmt = conn.prepare(&sql)?;
    let songs = stmt
        .query_map(params![playlist.server_id, playlist.id], CachedSong::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(songs)
}

impl LocalStore {
    pub fn upsert_playlist(&self, playlist: &CachedPlaylist) -> Result<(), StoreError> {
        self.with_conn(|conn| upsert_playlist_row(conn, playlist))
    }

    /// Replaces the ordered song relation of a playlist in one transaction.
    /// Positions are the indices of `song_ids`.
    pub fn replace_playlist_songs(
        &self,
        server_id: &str,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            replace_relation(&tx, server_id, playlist_id, song_ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Upserts the playlist, the metadata of every song and the full
    /// relation in a single transaction. Download state is not touched.
    pub fn save_playlist_with_songs(
        &self,
        playlist: &CachedPlaylist,
        songs: &[Song],
    ) -> Result<(), StoreError> {
        let song_ids: Vec<String> = songs.iter().map(|song| song.id.clone()).collect();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            upsert_playlist_row(&tx, playlist)?;
            for song in songs {
                upsert_song(&tx, song, None)?;
            }
            replace_relation(&tx, &playlist.server_id, &playlist.id, &song_ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn playlist_with_songs(
        &self,
        server_id: &str,
        playlist_id: &str,
    ) -> Result<Option<PlaylistWithSongs>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE server_id = ?1 AND id = ?2"
            );
            let Some(playlist) = conn
                .query_row(&sql, params![server_id, playlist_id], CachedPlaylist::from_row)
                .optional()?
            else {
                return Ok(None);
            };
            let songs = playlist_songs(conn, &playlist)?;
            Ok(Some(PlaylistWithSongs { playlist, songs }))
        })
    }

    /// All cached playlists of a server, each with its songs in position
    /// order.
    pub fn playlists_with_songs(
        &self,
        server_id: &str,
    ) -> Result<Vec<PlaylistWithSongs>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE server_id = ?1
                 ORDER BY name_key, id"
            );
            let playlists = {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![server_id], CachedPlaylist::from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            playlists
                .into_iter()
                .map(|playlist| -> Result<PlaylistWithSongs, StoreError> {
                    let songs = playlist_songs(conn, &playlist)?;
                    Ok(PlaylistWithSongs { playlist, songs })
                })
                .collect()
        })
    }

    /// First cached playlist whose name equals `name` case-insensitively.
    pub fn find_playlist_by_name(
        &self,
        server_id: &str,
        name: &str,
    ) -> Result<Option<PlaylistWithSongs>, StoreError> {
        let key = match_key(name);
        let playlist_id: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM playlists WHERE server_id = ?1 AND name_key = ?2
                     ORDER BY id LIMIT 1",
                    params![server_id, key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match playlist_id {
            Some(id) => self.playlist_with_songs(server_id, &id),
            None => Ok(None),
        }
    }

    /// Removes the playlist and its relation rows. Song rows stay.
    pub fn delete_playlist(&self, server_id: &str, playlist_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM playlist_songs WHERE server_id = ?1 AND playlist_id = ?2",
                params![server_id, playlist_id],
            )?;
            let removed = tx.execute(
                "DELETE FROM playlists WHERE server_id = ?1 AND id = ?2",
                params![server_id, playlist_id],
            )?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }
}
