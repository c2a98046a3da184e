use serde::{Deserialize, Serialize};

/// A configured catalog server and the credentials issued for it.
///
/// `token` and `salt` are treated as opaque: they are forwarded verbatim on
/// every request and never regenerated by this crate unless the caller asks
/// for it through [`ServerConfig::with_password`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: String,
    pub token: String,
    pub salt: String,
    pub active: bool,
}

impl ServerConfig {
    pub fn new(name: String, url: String, username: String, token: String, salt: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            url: url.trim_end_matches('/').to_string(),
            username,
            token,
            salt,
            active: true,
        }
    }

    /// Builds a server entry from a plain password using the Subsonic
    /// token scheme: `t = md5(password + s)` with a random salt.
    pub fn with_password(name: String, url: String, username: String, password: &str) -> Self {
        let salt = generate_salt();
        let token = format!("{:x}", md5::compute(format!("{password}{salt}").as_bytes()));
        Self::new(name, url, username, token, salt)
    }

    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    pub fn has_credentials(&self) -> bool {
        !self.base_url().is_empty()
            && !self.username.trim().is_empty()
            && !self.token.trim().is_empty()
            && !self.salt.trim().is_empty()
    }
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).unwrap_or_default();

    bytes
        .iter()
        .map(|b| {
            let idx = (*b as usize) % 36;
            if idx < 10 {
                (b'0' + idx as u8) as char
            } else {
                (b'a' + (idx - 10) as u8) as char
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "albumCount")]
    pub album_count: u32,
    #[serde(default, alias = "coverArt")]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub starred: Option<String>,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArtistInfo {
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default, alias = "musicBrainzId")]
    pub music_brainz_id: Option<String>,
    #[serde(default, alias = "lastFmUrl")]
    pub last_fm_url: Option<String>,
    #[serde(default, alias = "smallImageUrl")]
    pub small_image_url: Option<String>,
    #[serde(default, alias = "mediumImageUrl")]
    pub medium_image_url: Option<String>,
    #[serde(default, alias = "largeImageUrl")]
    pub large_image_url: Option<String>,
    #[serde(default, alias = "similarArtist")]
    pub similar_artists: Vec<Artist>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, alias = "artistId")]
    pub artist_id: Option<String>,
    #[serde(default, alias = "coverArt")]
    pub cover_art: Option<String>,
    #[serde(default, alias = "songCount")]
    pub song_count: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub starred: Option<String>,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default, alias = "albumId")]
    pub album_id: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default, alias = "artistId")]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub track: Option<u32>,
    #[serde(default, alias = "discNumber")]
    pub disc_number: Option<u32>,
    #[serde(default, alias = "coverArt")]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub starred: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, alias = "songCount")]
    pub song_count: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, alias = "coverArt")]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Genre {
    pub value: String,
    #[serde(default, alias = "songCount")]
    pub song_count: u32,
    #[serde(default, alias = "albumCount")]
    pub album_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResult {
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// How many results of each kind a `search3` call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub artists: u32,
    pub albums: u32,
    pub songs: u32,
}

impl SearchLimits {
    pub const fn songs(count: u32) -> Self {
        Self {
            artists: 0,
            albums: 0,
            songs: count,
        }
    }

    pub const fn albums(count: u32) -> Self {
        Self {
            artists: 0,
            albums: count,
            songs: 0,
        }
    }

    pub const fn artists(count: u32) -> Self {
        Self {
            artists: count,
            albums: 0,
            songs: 0,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            artists: 20,
            albums: 20,
            songs: 20,
        }
    }
}
