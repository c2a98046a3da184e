// Search and raw audio stream access.
impl SubsonicClient {
    async fn search3(
        &self,
        server: &ServerConfig,
        query: &str,
        limits: SearchLimits,
    ) -> Result<SearchResult, ApiError> {
        let json = self
            .request(
                server,
                "search3",
                &[
                    ("query", query),
                    ("artistCount", &limits.artists.to_string()),
                    ("albumCount", &limits.albums.to_string()),
                    ("songCount", &limits.songs.to_string()),
                ],
            )
            .await?;

        let search = json.search_result3.unwrap_or_default();

        let mut artists = search.artist.unwrap_or_default();
        let mut albums = search.album.unwrap_or_default();
        let songs = normalize_songs(server, search.song);

        for artist in &mut artists {
            normalize_artist(server, artist);
        }
        for album in &mut albums {
            normalize_album(server, album);
        }

        Ok(SearchResult {
            artists,
            albums,
            songs,
        })
    }

    async fn fetch_stream_bytes(
        &self,
        server: &ServerConfig,
        song_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        if !server.has_credentials() {
            return Err(ApiError::MissingCredentials);
        }

        let response = self.http.get(stream_url(server, song_id)).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        // Failures on binary routes come back as a JSON envelope with status 200.
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        if is_json {
            let json: SubsonicResponse = response.json().await?;
            json.subsonic_response.into_result()?;
            return Err(ApiError::EmptyBody);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::EmptyBody);
        }
        Ok(bytes.to_vec())
    }
}
