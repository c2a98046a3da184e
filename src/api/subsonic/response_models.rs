// Subsonic response model types used by response parsing.
#[derive(Debug, Deserialize)]
pub struct SubsonicResponse {
    #[serde(alias = "subsonic-response")]
    pub subsonic_response: SubsonicResponseInner,
}

#[derive(Debug, Deserialize)]
pub struct SubsonicResponseInner {
    pub status: String,
    pub error: Option<SubsonicError>,
    pub artists: Option<ArtistsContainer>,
    #[serde(alias = "albumList2")]
    pub album_list2: Option<AlbumList2>,
    pub album: Option<AlbumWithSongs>,
    #[serde(alias = "artist")]
    pub artist_detail: Option<ArtistWithAlbums>,
    #[serde(alias = "artistInfo2")]
    pub artist_info2: Option<ArtistInfo>,
    #[serde(alias = "randomSongs")]
    pub random_songs: Option<SongList>,
    #[serde(alias = "songsByGenre")]
    pub songs_by_genre: Option<SongList>,
    pub genres: Option<GenresContainer>,
    pub playlists: Option<PlaylistsContainer>,
    pub playlist: Option<PlaylistWithEntries>,
    #[serde(alias = "searchResult3")]
    pub search_result3: Option<SearchResult3>,
}

impl SubsonicResponseInner {
    fn into_result(self) -> Result<Self, ApiError> {
        if self.status == "ok" {
            return Ok(self);
        }
        Err(match self.error {
            Some(error) => ApiError::Server {
                code: error.code,
                message: error.message,
            },
            None => ApiError::Server {
                code: 0,
                message: "Unknown error".to_string(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SubsonicError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ArtistsContainer {
    pub index: Option<Vec<ArtistIndex>>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistIndex {
    pub artist: Option<Vec<Artist>>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumList2 {
    pub album: Option<Vec<Album>>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumWithSongs {
    #[serde(flatten)]
    pub album: Album,
    pub song: Option<Vec<Song>>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistWithAlbums {
    pub id: String,
    pub name: String,
    #[serde(alias = "albumCount")]
    pub album_count: Option<u32>,
    #[serde(alias = "coverArt")]
    pub cover_art: Option<String>,
    pub starred: Option<String>,
    pub album: Option<Vec<Album>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SongList {
    pub song: Option<Vec<Song>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GenresContainer {
    pub genre: Option<Vec<Genre>>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistsContainer {
    pub playlist: Option<Vec<Playlist>>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistWithEntries {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub entry: Option<Vec<Song>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchResult3 {
    pub artist: Option<Vec<Artist>>,
    pub album: Option<Vec<Album>>,
    pub song: Option<Vec<Song>>,
}
