//! In-memory [`CatalogClient`] used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::models::*;
use crate::api::{ApiError, CatalogClient};

#[derive(Default)]
pub(crate) struct MockCatalogClient {
    pub songs: Vec<Song>,
    pub albums: Vec<(Album, Vec<Song>)>,
    pub artists: Vec<(Artist, Vec<Album>)>,
    pub playlists: Vec<(Playlist, Vec<Song>)>,
    pub audio: Vec<u8>,
    pub offline: bool,
    pub download_failures: AtomicUsize,
    pub(crate) calls: AtomicUsize,
    pub(crate) downloads: AtomicUsize,
}

impl MockCatalogClient {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_songs(songs: Vec<Song>) -> Self {
        Self {
            songs,
            ..Self::default()
        }
    }

    /// Catalog calls, excluding `download_song`.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            Err(ApiError::Status(503))
        } else {
            Ok(())
        }
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn search(
        &self,
        _server: &ServerConfig,
        query: &str,
        limits: SearchLimits,
    ) -> Result<SearchResult, ApiError> {
        self.record()?;
        Ok(SearchResult {
            artists: self
                .artists
                .iter()
                .map(|(artist, _)| artist.clone())
                .filter(|artist| contains(&artist.name, query))
                .take(limits.artists as usize)
                .collect(),
            albums: self
                .albums
                .iter()
                .map(|(album, _)| album.clone())
                .filter(|album| contains(&album.name, query))
                .take(limits.albums as usize)
                .collect(),
            songs: self
                .songs
                .iter()
                .filter(|song| contains(&song.title, query))
                .take(limits.songs as usize)
                .cloned()
                .collect(),
        })
    }

    async fn get_album(
        &self,
        _server: &ServerConfig,
        album_id: &str,
    ) -> Result<(Album, Vec<Song>), ApiError> {
        self.record()?;
        self.albums
            .iter()
            .find(|(album, _)| album.id == album_id)
            .cloned()
            .ok_or(ApiError::NotFound("Album"))
    }

    async fn get_artist(
        &self,
        _server: &ServerConfig,
        artist_id: &str,
    ) -> Result<(Artist, Vec<Album>), ApiError> {
        self.record()?;
        self.artists
            .iter()
            .find(|(artist, _)| artist.id == artist_id)
            .cloned()
            .ok_or(ApiError::NotFound("Artist"))
    }

    async fn get_artist_info(
        &self,
        _server: &ServerConfig,
        _artist_id: &str,
    ) -> Result<ArtistInfo, ApiError> {
        self.record()?;
        Ok(ArtistInfo::default())
    }

    async fn get_playlist(
        &self,
        _server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(Playlist, Vec<Song>), ApiError> {
        self.record()?;
        self.playlists
            .iter()
            .find(|(playlist, _)| playlist.id == playlist_id)
            .cloned()
            .ok_or(ApiError::NotFound("Playlist"))
    }

    async fn get_genres(&self, _server: &ServerConfig) -> Result<Vec<Genre>, ApiError> {
        self.record()?;
        let mut genres: Vec<Genre> = Vec::new();
        for name in self.songs.iter().filter_map(|song| song.genre.as_deref()) {
            match genres.iter_mut().find(|genre| genre.value == name) {
                Some(genre) => genre.song_count += 1,
                None => genres.push(Genre {
                    value: name.to_string(),
                    song_count: 1,
                    album_count: 0,
                }),
            }
        }
        Ok(genres)
    }

    async fn get_playlists(&self, _server: &ServerConfig) -> Result<Vec<Playlist>, ApiError> {
        self.record()?;
        Ok(self
            .playlists
            .iter()
            .map(|(playlist, _)| playlist.clone())
            .collect())
    }

    async fn get_artists(&self, _server: &ServerConfig) -> Result<Vec<Artist>, ApiError> {
        self.record()?;
        Ok(self
            .artists
            .iter()
            .map(|(artist, _)| artist.clone())
            .collect())
    }

    async fn get_random_songs(
        &self,
        _server: &ServerConfig,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        self.record()?;
        Ok(self.songs.iter().take(count as usize).cloned().collect())
    }

    async fn get_songs_by_genre(
        &self,
        _server: &ServerConfig,
        genre: &str,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        self.record()?;
        Ok(self
            .songs
            .iter()
            .filter(|song| song.genre.as_deref() == Some(genre))
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn get_albums_by_year(
        &self,
        _server: &ServerConfig,
        from_year: u32,
        to_year: u32,
        size: u32,
    ) -> Result<Vec<Album>, ApiError> {
        self.record()?;
        Ok(self
            .albums
            .iter()
            .map(|(album, _)| album.clone())
            .filter(|album| album.year.is_some_and(|y| y >= from_year && y <= to_year))
            .take(size as usize)
            .collect())
    }

    async fn star(&self, _server: &ServerConfig, _song_ids: &[String]) -> Result<(), ApiError> {
        self.record()
    }

    async fn create_playlist(
        &self,
        _server: &ServerConfig,
        _name: &str,
        _song_ids: &[String],
    ) -> Result<Option<String>, ApiError> {
        self.record()?;
        Ok(None)
    }

    async fn update_playlist(
        &self,
        _server: &ServerConfig,
        _playlist_id: &str,
        _name: Option<&str>,
        _comment: Option<&str>,
    ) -> Result<(), ApiError> {
        self.record()
    }

    async fn delete_playlist(
        &self,
        _server: &ServerConfig,
        _playlist_id: &str,
    ) -> Result<(), ApiError> {
        self.record()
    }

    async fn add_to_playlist(
        &self,
        _server: &ServerConfig,
        _playlist_id: &str,
        _song_ids: &[String],
    ) -> Result<(), ApiError> {
        self.record()
    }

    async fn remove_from_playlist(
        &self,
        _server: &ServerConfig,
        _playlist_id: &str,
        _song_indices: &[usize],
    ) -> Result<(), ApiError> {
        self.record()
    }

    async fn download_song(
        &self,
        server: &ServerConfig,
        _song_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !server.has_credentials() {
            return Err(ApiError::MissingCredentials);
        }
        if self.offline {
            return Err(ApiError::Status(503));
        }
        let remaining = self.download_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.download_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Status(502));
        }
        Ok(self.audio.clone())
    }
}
