// Starring plus playlist reads and write/update operations.
impl SubsonicClient {
    async fn star_songs(&self, server: &ServerConfig, song_ids: &[String]) -> Result<(), ApiError> {
        if song_ids.is_empty() {
            return Ok(());
        }

        let params: Vec<(String, String)> = song_ids
            .iter()
            .map(|id| ("id".to_string(), id.clone()))
            .collect();
        self.request_owned(server, "star", &params).await?;
        Ok(())
    }

    async fn fetch_playlists(&self, server: &ServerConfig) -> Result<Vec<Playlist>, ApiError> {
        let json = self.request(server, "getPlaylists", &[]).await?;

        let mut playlists = json
            .playlists
            .and_then(|p| p.playlist)
            .unwrap_or_default();

        for playlist in &mut playlists {
            normalize_playlist(server, playlist);
        }

        Ok(playlists)
    }

    async fn fetch_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(Playlist, Vec<Song>), ApiError> {
        let json = self
            .request(server, "getPlaylist", &[("id", playlist_id)])
            .await?;

        let playlist_with_entries = json.playlist.ok_or(ApiError::NotFound("Playlist"))?;
        let mut playlist = playlist_with_entries.playlist;
        normalize_playlist(server, &mut playlist);
        let songs = normalize_songs(server, playlist_with_entries.entry);

        Ok((playlist, songs))
    }

    async fn create_remote_playlist(
        &self,
        server: &ServerConfig,
        name: &str,
        song_ids: &[String],
    ) -> Result<Option<String>, ApiError> {
        let mut params = vec![("name".to_string(), name.to_string())];
        for song_id in song_ids {
            params.push(("songId".to_string(), song_id.clone()));
        }

        let json = self.request_owned(server, "createPlaylist", &params).await?;
        Ok(json.playlist.map(|p| p.playlist.id))
    }

    async fn update_remote_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut params = vec![("playlistId".to_string(), playlist_id.to_string())];
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            params.push(("name".to_string(), name.to_string()));
        }
        if let Some(comment) = comment {
            params.push(("comment".to_string(), comment.trim().to_string()));
        }

        self.request_owned(server, "updatePlaylist", &params).await?;
        Ok(())
    }

    async fn delete_remote_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
    ) -> Result<(), ApiError> {
        self.request(server, "deletePlaylist", &[("id", playlist_id)])
            .await?;
        Ok(())
    }

    async fn add_songs_to_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), ApiError> {
        if song_ids.is_empty() {
            return Ok(());
        }

        let mut params = vec![("playlistId".to_string(), playlist_id.to_string())];
        for song_id in song_ids {
            params.push(("songIdToAdd".to_string(), song_id.clone()));
        }

        self.request_owned(server, "updatePlaylist", &params).await?;
        Ok(())
    }

    async fn remove_songs_from_playlist(
        &self,
        server: &ServerConfig,
        playlist_id: &str,
        song_indices: &[usize],
    ) -> Result<(), ApiError> {
        if song_indices.is_empty() {
            return Ok(());
        }

        let mut params = vec![("playlistId".to_string(), playlist_id.to_string())];
        // Highest index first so earlier removals don't shift later ones.
        let mut sorted_indices = song_indices.to_vec();
        sorted_indices.sort_by(|a, b| b.cmp(a));
        sorted_indices.dedup();

        for index in sorted_indices {
            params.push(("songIndexToRemove".to_string(), index.to_string()));
        }

        self.request_owned(server, "updatePlaylist", &params).await?;
        Ok(())
    }
}
