//! Remote catalog access.
//!
//! [`CatalogClient`] is the seam the resolver, the orchestrator and the
//! download worker talk to; [`SubsonicClient`] is the network implementation.
//! Every call receives the [`ServerConfig`] to use, so no credentials live
//! inside a client.

pub mod locators;
pub mod models;
mod subsonic;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use thiserror::Error;

pub use models::{
    Album, Artist, ArtistInfo, Genre, Playlist, SearchLimits, SearchResult, ServerConfig, Song,
};
pub use subsonic::SubsonicClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Server returned error {code}: {message}")]
    Server { code: i32, message: String },
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Server credentials are incomplete")]
    MissingCredentials,
    #[error("Empty response body")]
    EmptyBody,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search(
        &self,
        server: &ServerConfig,
        query: &str,
        limits: SearchLimits,
    ) -> Result<SearchResult, ApiError>;

    async fn get_album(
        &self,
        server: &ServerConfig,
        album_id: &str,
    ) -> Result<(Album, Vec<Song>), ApiError>;

    async fn get_artist(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<(Artist, Vec<Album>), ApiError>;

    async fn get_artist_info(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<ArtistInfo, ApiError>;

    async fn get_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(Playlist, Vec<Song>), ApiError>;

    async fn get_genres(&self, server: &ServerConfig) -> Result<Vec<Genre>, ApiError>;

    async fn get_playlists(&self, server: &ServerConfig) -> Result<Vec<Playlist>, ApiError>;

    async fn get_artists(&self, server: &ServerConfig) -> Result<Vec<Artist>, ApiError>;

    async fn get_random_songs(
        &self,
        server: &ServerConfig,
        count: u32,
    ) -> Result<Vec<Song>, ApiError>;

    async fn get_songs_by_genre(
        &self,
        server: &ServerConfig,
        genre: &str,
        count: u32,
    ) -> Result<Vec<Song>, ApiError>;

    async fn get_albums_by_year(
        &self,
        server: &ServerConfig,
        from_year: u32,
        to_year: u32,
        size: u32,
    ) -> Result<Vec<Album>, ApiError>;

    async fn star(&self, server: &ServerConfig, song_ids: &[String]) -> Result<(), ApiError>;

    /// Returns the id of the new playlist when the server reports it.
    async fn create_playlist(
        &self,
        server: &ServerConfig,
        name: &str,
        song_ids: &[String],
    ) -> Result<Option<String>, ApiError>;

    async fn update_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn delete_playlist(&self, server: &ServerConfig, playlist_id: &str)
        -> Result<(), ApiError>;

    async fn add_to_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), ApiError>;

    /// `song_indices` are positions in the remote playlist.
    async fn remove_from_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_indices: &[usize],
    ) -> Result<(), ApiError>;

    /// Raw audio bytes from the stream route, used by download jobs.
    async fn download_song(&self, server: &ServerConfig, song_id: &str)
        -> Result<Vec<u8>, ApiError>;
}
