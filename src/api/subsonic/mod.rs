use crate::api::locators::{api_url, stream_url};
use crate::api::models::*;
use crate::api::{ApiError, CatalogClient};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::time::Duration;

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("Falling back to default HTTP client: {err}");
            reqwest::Client::new()
        })
});

/// Stateless Subsonic/Navidrome client.
#[derive(Clone)]
pub struct SubsonicClient {
    http: reqwest::Client,
}

impl Default for SubsonicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SubsonicClient {
    pub fn new() -> Self {
        Self {
            http: HTTP_CLIENT.clone(),
        }
    }

    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn request(
        &self,
        server: &ServerConfig,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<SubsonicResponseInner, ApiError> {
        if !server.has_credentials() {
            return Err(ApiError::MissingCredentials);
        }

        let url = api_url(server, endpoint, params);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        let json: SubsonicResponse = response.json().await?;
        json.subsonic_response.into_result()
    }

    async fn request_owned(
        &self,
        server: &ServerConfig,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<SubsonicResponseInner, ApiError> {
        let borrowed: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        self.request(server, endpoint, &borrowed).await
    }
}

fn normalize_cover_art_id(cover_art_id: &str) -> String {
    let trimmed = cover_art_id.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Navidrome can expose cache-busted ids like `mf-abc123_69733a55`;
    // `getCoverArt` expects the stable part.
    if let Some((base, suffix)) = trimmed.rsplit_once('_') {
        if !base.is_empty()
            && suffix.len() == 8
            && suffix.chars().all(|ch| ch.is_ascii_hexdigit())
            && (base.starts_with("mf-")
                || base.starts_with("ar-")
                || base.starts_with("al-")
                || base.starts_with("pl-"))
        {
            return base.to_string();
        }
    }

    trimmed.to_string()
}

fn normalize_cover_art_with_fallback(cover_art: &mut Option<String>, fallback: Option<&str>) {
    let normalized = cover_art
        .as_deref()
        .map(normalize_cover_art_id)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            fallback
                .map(normalize_cover_art_id)
                .filter(|value| !value.is_empty())
        });
    *cover_art = normalized;
}

fn normalize_song(server: &ServerConfig, song: &mut Song) {
    song.server_id = server.id.clone();
    let album_id = song.album_id.clone();
    normalize_cover_art_with_fallback(&mut song.cover_art, album_id.as_deref());
}

fn normalize_album(server: &ServerConfig, album: &mut Album) {
    album.server_id = server.id.clone();
    let album_id = album.id.clone();
    normalize_cover_art_with_fallback(&mut album.cover_art, Some(&album_id));
}

fn normalize_artist(server: &ServerConfig, artist: &mut Artist) {
    artist.server_id = server.id.clone();
    normalize_cover_art_with_fallback(&mut artist.cover_art, None);
}

fn normalize_playlist(server: &ServerConfig, playlist: &mut Playlist) {
    playlist.server_id = server.id.clone();
    normalize_cover_art_with_fallback(&mut playlist.cover_art, None);
}

fn normalize_songs(server: &ServerConfig, songs: Option<Vec<Song>>) -> Vec<Song> {
    let mut songs = songs.unwrap_or_default();
    for song in &mut songs {
        normalize_song(server, song);
    }
    songs
}

include!("library_browsing.rs");
include!("favorites_and_playlists.rs");
include!("search_and_stream.rs");

#[async_trait]
impl CatalogClient for SubsonicClient {
    async fn search(
        &self,
        server: &ServerConfig,
        query: &str,
        limits: SearchLimits,
    ) -> Result<SearchResult, ApiError> {
        self.search3(server, query, limits).await
    }

    async fn get_album(
        &self,
        server: &ServerConfig,
        album_id: &str,
    ) -> Result<(Album, Vec<Song>), ApiError> {
        self.fetch_album(server, album_id).await
    }

    async fn get_artist(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<(Artist, Vec<Album>), ApiError> {
        self.fetch_artist(server, artist_id).await
    }

    async fn get_artist_info(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<ArtistInfo, ApiError> {
        self.fetch_artist_info(server, artist_id).await
    }

    async fn get_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(Playlist, Vec<Song>), ApiError> {
        self.fetch_playlist(server, playlist_id).await
    }

    async fn get_genres(&self, server: &ServerConfig) -> Result<Vec<Genre>, ApiError> {
        self.fetch_genres(server).await
    }

    async fn get_playlists(&self, server: &ServerConfig) -> Result<Vec<Playlist>, ApiError> {
        self.fetch_playlists(server).await
    }

    async fn get_artists(&self, server: &ServerConfig) -> Result<Vec<Artist>, ApiError> {
        self.fetch_artists(server).await
    }

    async fn get_random_songs(
        &self,
        server: &ServerConfig,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        self.fetch_random_songs(server, count).await
    }

    async fn get_songs_by_genre(
        &self,
        server: &ServerConfig,
        genre: &str,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        self.fetch_songs_by_genre(server, genre, count).await
    }

    async fn get_albums_by_year(
        &self,
        server: &ServerConfig,
        from_year: u32,
        to_year: u32,
        size: u32,
    ) -> Result<Vec<Album>, ApiError> {
        self.fetch_albums_by_year(server, from_year, to_year, size)
            .await
    }

    async fn star(&self, server: &ServerConfig, song_ids: &[String]) -> Result<(), ApiError> {
        self.star_songs(server, song_ids).await
    }

    async fn create_playlist(
        &self,
        server: &ServerConfig,
        name: &str,
        song_ids: &[String],
    ) -> Result<Option<String>, ApiError> {
        self.create_remote_playlist(server, name, song_ids).await
    }

    async fn update_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        self.update_remote_playlist(server, playlist_id, name, comment)
            .await
    }

    async fn delete_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(), ApiError> {
        self.delete_remote_playlist(server, playlist_id).await
    }

    async fn add_to_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), ApiError> {
        self.add_songs_to_playlist(server, playlist_id, song_ids)
            .await
    }

    async fn remove_from_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_indices: &[usize],
    ) -> Result<(), ApiError> {
        self.remove_songs_from_playlist(server, playlist_id, song_indices)
            .await
    }

    async fn download_song(
        &self,
        server: &ServerConfig,
        song_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.fetch_stream_bytes(server, song_id).await
    }
}

include!("response_models.rs");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn server() -> ServerConfig {
        ServerConfig {
            id: "srv-1".to_string(),
            name: "Home".to_string(),
            url: "http://host".to_string(),
            username: "alice".to_string(),
            token: "tok".to_string(),
            salt: "salt".to_string(),
            active: true,
        }
    }

    #[test_log::test]
    fn cache_busted_cover_art_ids_are_trimmed() {
        assert_eq!(normalize_cover_art_id("mf-abc123_69733a55"), "mf-abc123");
        assert_eq!(normalize_cover_art_id("al-1_zz"), "al-1_zz");
        assert_eq!(normalize_cover_art_id("  "), "");
    }

    #[test_log::test]
    fn song_cover_art_falls_back_to_album_id() {
        let mut song = Song {
            id: "s1".to_string(),
            title: "Halo".to_string(),
            album_id: Some("al-9".to_string()),
            ..Song::default()
        };
        normalize_song(&server(), &mut song);
        assert_eq!(song.cover_art.as_deref(), Some("al-9"));
        assert_eq!(song.server_id, "srv-1");

        let mut bare = Song {
            id: "s2".to_string(),
            title: "Loose".to_string(),
            ..Song::default()
        };
        normalize_song(&server(), &mut bare);
        assert_eq!(bare.cover_art, None);
    }

    #[test_log::test]
    fn error_payload_maps_to_server_error() {
        let json: SubsonicResponse = serde_json::from_str(
            r#"{"subsonic-response":{"status":"failed","version":"1.16.1","error":{"code":40,"message":"Wrong username or password"}}}"#,
        )
        .unwrap();
        match json.subsonic_response.into_result() {
            Err(ApiError::Server { code, message }) => {
                assert_eq!(code, 40);
                assert_eq!(message, "Wrong username or password");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test_log::test]
    fn search_payload_parses_songs() {
        let json: SubsonicResponse = serde_json::from_str(
            r#"{"subsonic-response":{"status":"ok","searchResult3":{"song":[{"id":"1","title":"Halo","artist":"Beyoncé","album":"I Am... Sasha Fierce","duration":261}]}}}"#,
        )
        .unwrap();
        let inner = json.subsonic_response.into_result().unwrap();
        let search = inner.search_result3.unwrap_or_default();
        let songs = normalize_songs(&server(), search.song);
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist.as_deref(), Some("Beyoncé"));
        assert_eq!(songs[0].server_id, "srv-1");
    }

    #[test_log::test]
    fn playlist_payload_keeps_entry_order() {
        let json: SubsonicResponse = serde_json::from_str(
            r#"{"subsonic-response":{"status":"ok","playlist":{"id":"p1","name":"Road","songCount":3,"entry":[{"id":"c","title":"C"},{"id":"a","title":"A"},{"id":"b","title":"B"}]}}}"#,
        )
        .unwrap();
        let inner = json.subsonic_response.into_result().unwrap();
        let playlist = inner.playlist.unwrap();
        let ids: Vec<&str> = playlist
            .entry
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|song| song.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(playlist.playlist.song_count, 3);
    }

    #[test_log::test(tokio::test)]
    async fn requests_without_credentials_fail_fast() {
        let mut server = server();
        server.token.clear();
        let client = SubsonicClient::new();
        let result = client.fetch_genres(&server).await;
        assert!(matches!(result, Err(ApiError::MissingCredentials)));
    }
}
