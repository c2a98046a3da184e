// Read-oriented browsing APIs for artists, albums, genres and song lists.
impl SubsonicClient {
    pub async fn ping(&self, server: &ServerConfig) -> Result<(), ApiError> {
        self.request(server, "ping", &[]).await.map(|_| ())
    }

    async fn fetch_artists(&self, server: &ServerConfig) -> Result<Vec<Artist>, ApiError> {
        let json = self.request(server, "getArtists", &[]).await?;

        let mut artists = Vec::new();
        if let Some(artists_data) = json.artists {
            for index in artists_data.index.unwrap_or_default() {
                for mut artist in index.artist.unwrap_or_default() {
                    normalize_artist(server, &mut artist);
                    artists.push(artist);
                }
            }
        }

        Ok(artists)
    }

    async fn fetch_album(
        &self,
        server: &ServerConfig,
        album_id: &str,
    ) -> Result<(Album, Vec<Song>), ApiError> {
        let json = self.request(server, "getAlbum", &[("id", album_id)]).await?;

        let album_with_songs = json.album.ok_or(ApiError::NotFound("Album"))?;
        let mut album = album_with_songs.album;
        normalize_album(server, &mut album);
        let songs = normalize_songs(server, album_with_songs.song);

        Ok((album, songs))
    }

    async fn fetch_artist(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<(Artist, Vec<Album>), ApiError> {
        let json = self
            .request(server, "getArtist", &[("id", artist_id)])
            .await?;

        let artist_with_albums = json.artist_detail.ok_or(ApiError::NotFound("Artist"))?;

        let mut albums = artist_with_albums.album.unwrap_or_default();
        for album in &mut albums {
            normalize_album(server, album);
        }

        let mut artist = Artist {
            id: artist_with_albums.id,
            name: artist_with_albums.name,
            album_count: artist_with_albums.album_count.unwrap_or(0),
            cover_art: artist_with_albums.cover_art,
            starred: artist_with_albums.starred,
            server_id: String::new(),
        };
        normalize_artist(server, &mut artist);
        Ok((artist, albums))
    }

    async fn fetch_artist_info(
        &self,
        server: &ServerConfig,
        artist_id: &str,
    ) -> Result<ArtistInfo, ApiError> {
        let json = self
            .request(server, "getArtistInfo2", &[("id", artist_id)])
            .await?;

        let mut info = json.artist_info2.ok_or(ApiError::NotFound("Artist info"))?;
        for artist in &mut info.similar_artists {
            normalize_artist(server, artist);
        }
        Ok(info)
    }

    async fn fetch_genres(&self, server: &ServerConfig) -> Result<Vec<Genre>, ApiError> {
        let json = self.request(server, "getGenres", &[]).await?;
        Ok(json.genres.and_then(|g| g.genre).unwrap_or_default())
    }

    async fn fetch_random_songs(
        &self,
        server: &ServerConfig,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        let json = self
            .request(server, "getRandomSongs", &[("size", &count.to_string())])
            .await?;
        Ok(normalize_songs(server, json.random_songs.and_then(|l| l.song)))
    }

    async fn fetch_songs_by_genre(
        &self,
        server: &ServerConfig,
        genre: &str,
        count: u32,
    ) -> Result<Vec<Song>, ApiError> {
        let json = self
            .request(
                server,
                "getSongsByGenre",
                &[("genre", genre), ("count", &count.to_string())],
            )
            .await?;
        Ok(normalize_songs(server, json.songs_by_genre.and_then(|l| l.song)))
    }

    async fn fetch_albums_by_year(
        &self,
        server: &ServerConfig,
        from_year: u32,
        to_year: u32,
        size: u32,
    ) -> Result<Vec<Album>, ApiError> {
        let json = self
            .request(
                server,
                "getAlbumList2",
                &[
                    ("type", "byYear"),
                    ("fromYear", &from_year.to_string()),
                    ("toYear", &to_year.to_string()),
                    ("size", &size.to_string()),
                ],
            )
            .await?;

        let mut albums = json.album_list2.and_then(|al| al.album).unwrap_or_default();
        for album in &mut albums {
            normalize_album(server, album);
        }
        Ok(albums)
    }
}
