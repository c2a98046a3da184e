use std::path::{Path, PathBuf};

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::api::models::{Playlist, Song};

/// Column list matching [`CachedSong::from_row`].
pub(crate) const SONG_COLUMNS: &str = "s.id, s.server_id, s.title, s.artist, s.album, s.album_id, \
     s.genre, s.track, s.disc_number, s.year, s.duration, s.cover_art, s.file_path, s.downloaded";

/// A song row in the local mirror.
///
/// `downloaded` with a non-empty `file_path` is what the store recorded;
/// [`CachedSong::is_available_offline`] additionally checks the file is still
/// on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CachedSong {
    pub id: String,
    pub server_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_id: Option<String>,
    pub genre: Option<String>,
    pub track: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    pub duration: u32,
    pub cover_art: Option<String>,
    pub file_path: String,
    pub downloaded: bool,
}

impl CachedSong {
    /// Metadata-only row for a remote song.
    pub fn from_song(song: &Song) -> Self {
        Self {
            id: song.id.clone(),
            server_id: song.server_id.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            album_id: song.album_id.clone(),
            genre: song.genre.clone(),
            track: song.track,
            disc_number: song.disc_number,
            year: song.year,
            duration: song.duration,
            cover_art: song.cover_art.clone(),
            file_path: String::new(),
            downloaded: false,
        }
    }

    pub fn is_available_offline(&self) -> bool {
        self.downloaded && !self.file_path.is_empty() && Path::new(&self.file_path).is_file()
    }

    /// The backing file, only when the song is available offline.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.is_available_offline().then(|| PathBuf::from(&self.file_path))
    }

    pub fn to_song(&self) -> Song {
        Song {
            id: self.id.clone(),
            title: self.title.clone(),
            album: self.album.clone(),
            album_id: self.album_id.clone(),
            artist: self.artist.clone(),
            duration: self.duration,
            track: self.track,
            disc_number: self.disc_number,
            cover_art: self.cover_art.clone(),
            year: self.year,
            genre: self.genre.clone(),
            server_id: self.server_id.clone(),
            ..Song::default()
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            server_id: row.get(1)?,
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            album_id: row.get(5)?,
            genre: row.get(6)?,
            track: row.get(7)?,
            disc_number: row.get(8)?,
            year: row.get(9)?,
            duration: row.get(10)?,
            cover_art: row.get(11)?,
            file_path: row.get(12)?,
            downloaded: row.get(13)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CachedPlaylist {
    pub id: String,
    pub server_id: String,
    pub name: String,
    pub cover_art: Option<String>,
    pub song_count: u32,
}

impl CachedPlaylist {
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            server_id: playlist.server_id.clone(),
            name: playlist.name.clone(),
            cover_art: playlist.cover_art.clone(),
            song_count: playlist.song_count,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            server_id: row.get(1)?,
            name: row.get(2)?,
            cover_art: row.get(3)?,
            song_count: row.get(4)?,
        })
    }
}

/// A playlist with its songs in relation order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistWithSongs {
    pub playlist: CachedPlaylist,
    pub songs: Vec<CachedSong>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn downloaded_flag_without_file_is_not_offline() {
        let song = CachedSong {
            id: "1".to_string(),
            file_path: "/definitely/not/here.audio".to_string(),
            downloaded: true,
            ..CachedSong::default()
        };
        assert!(!song.is_available_offline());
        assert_eq!(song.local_path(), None);
    }

    #[test_log::test]
    fn existing_file_is_offline() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let song = CachedSong {
            id: "1".to_string(),
            file_path: file.path().to_string_lossy().to_string(),
            downloaded: true,
            ..CachedSong::default()
        };
        assert!(song.is_available_offline());
        assert_eq!(song.local_path().as_deref(), Some(file.path()));
    }
}
