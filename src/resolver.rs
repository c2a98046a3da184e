//! Playback request resolution.
//!
//! A [`PlaybackRequest`] names what the listener wants to hear. The
//! [`PlayableResolver`] turns it into an ordered list of [`ResolvedPlayable`]
//! items, looking in the local cache first and asking the remote catalog
//! only when nothing local matches and the request kind allows it. Every
//! item coming from remote data still plays from disk when that song has
//! been downloaded.
//!
//! Matching is exact and case-insensitive on names; a near miss resolves to
//! nothing rather than to the wrong track.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::api::locators::stream_url;
use crate::api::models::{Album, SearchLimits, ServerConfig, Song};
use crate::api::{ApiError, CatalogClient};
use crate::config::CoreSettings;
use crate::db::{match_key, CachedSong, LocalStore, StoreError};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackRequest {
    Song {
        name: String,
        artist: Option<String>,
    },
    Album {
        name: String,
        artist: Option<String>,
    },
    Artist {
        name: String,
    },
    Playlist {
        name: String,
    },
    Genre {
        name: String,
    },
    /// Songs released in the ten years starting at `start_year`.
    Decade {
        start_year: u32,
    },
    Shuffle,
    /// Shuffled local downloads. No starred flag is consulted.
    Favorites,
    AllDownloads,
    /// The last queue handed to the playback controller.
    Continue,
}

impl PlaybackRequest {
    /// Builds a request from a kind string and its free-form parameters, as
    /// received from a deep link or voice intent. Returns `None` for unknown
    /// kinds and for named kinds without a usable name.
    pub fn from_kind(kind: &str, name: Option<&str>, artist: Option<&str>) -> Option<Self> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let artist = artist
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let request = match kind.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "song" => Self::Song {
                name: name?.to_string(),
                artist,
            },
            "album" => Self::Album {
                name: name?.to_string(),
                artist,
            },
            "artist" => Self::Artist {
                name: name.map(str::to_string).or(artist)?,
            },
            "playlist" => Self::Playlist {
                name: name?.to_string(),
            },
            "genre" => Self::Genre {
                name: name?.to_string(),
            },
            "decade" => Self::Decade {
                start_year: parse_decade(name?)?,
            },
            "shuffle" => Self::Shuffle,
            "favorites" | "favourites" => Self::Favorites,
            "all-downloads" | "downloads" => Self::AllDownloads,
            "continue" | "resume" => Self::Continue,
            _ => return None,
        };
        Some(request)
    }

    /// Whether a miss in the local cache may be answered from the server.
    pub fn allows_remote_fallback(&self) -> bool {
        match self {
            Self::Song { .. }
            | Self::Album { .. }
            | Self::Artist { .. }
            | Self::Playlist { .. }
            | Self::Genre { .. }
            | Self::Decade { .. } => true,
            Self::Shuffle | Self::Favorites | Self::AllDownloads | Self::Continue => false,
        }
    }

    pub fn is_shuffled(&self) -> bool {
        matches!(self, Self::Artist { .. } | Self::Shuffle | Self::Favorites)
    }
}

/// Accepts `1990`, `1990s`, `90s` and `90`. Two-digit decades below 30
/// are read as 20xx.
fn parse_decade(raw: &str) -> Option<u32> {
    let digits = raw.trim().trim_end_matches(['s', 'S']).trim_end_matches('\'');
    let digits = digits.trim_start_matches('\'');
    let value: u32 = digits.parse().ok()?;
    let year = match value {
        0..=29 if digits.len() <= 2 => 2000 + value,
        30..=99 if digits.len() <= 2 => 1900 + value,
        1000..=9999 => value,
        _ => return None,
    };
    Some(year - year % 10)
}

/// Where a resolved item's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    LocalFile(PathBuf),
    RemoteStream(StreamDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub server: ServerConfig,
    pub song_id: String,
}

impl StreamDescriptor {
    pub fn url(&self) -> String {
        stream_url(&self.server, &self.song_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlayable {
    pub song_id: String,
    pub source: PlayableSource,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: u32,
    pub cover_art: Option<String>,
    pub server_id: String,
}

impl ResolvedPlayable {
    fn local(song: &CachedSong, path: PathBuf) -> Self {
        Self {
            song_id: song.id.clone(),
            source: PlayableSource::LocalFile(path),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            duration: song.duration,
            cover_art: song.cover_art.clone(),
            server_id: song.server_id.clone(),
        }
    }

    fn remote(song: &Song, server: &ServerConfig) -> Self {
        Self {
            song_id: song.id.clone(),
            source: PlayableSource::RemoteStream(StreamDescriptor {
                server: server.clone(),
                song_id: song.id.clone(),
            }),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            duration: song.duration,
            cover_art: song.cover_art.clone(),
            server_id: server.id.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, PlayableSource::LocalFile(_))
    }
}

/// Ordered items plus the song playback should start on, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    pub items: Vec<ResolvedPlayable>,
    pub focus_song_id: Option<String>,
}

impl Resolution {
    fn unfocused(items: Vec<ResolvedPlayable>) -> Self {
        Self {
            items,
            focus_song_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn song_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.song_id.clone()).collect()
    }
}

pub struct PlayableResolver {
    store: LocalStore,
    client: Arc<dyn CatalogClient>,
    settings: CoreSettings,
}

impl PlayableResolver {
    pub fn new(store: LocalStore, client: Arc<dyn CatalogClient>, settings: CoreSettings) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Resolves `request` against `server`. A request that matches nothing
    /// yields an empty [`Resolution`]; only local store failures are
    /// returned as errors.
    pub async fn resolve(
        &self,
        request: &PlaybackRequest,
        server: &ServerConfig,
    ) -> Result<Resolution, ResolveError> {
        let local = self.resolve_local(request, server)?;
        let mut resolution = if !local.is_empty() || !request.allows_remote_fallback() {
            local
        } else {
            match self.resolve_remote(request, server).await {
                Ok(remote) => remote,
                Err(ResolveRemoteError::Api(err)) => {
                    log::warn!("Remote lookup for {request:?} failed, treating as no match: {err}");
                    Resolution::default()
                }
                Err(ResolveRemoteError::Store(err)) => return Err(err.into()),
            }
        };

        if request.is_shuffled() {
            resolution.items.shuffle(&mut rand::thread_rng());
        }
        if resolution.is_empty() {
            log::info!("No playable items for {request:?}");
        }
        Ok(resolution)
    }

    fn resolve_local(
        &self,
        request: &PlaybackRequest,
        server: &ServerConfig,
    ) -> Result<Resolution, StoreError> {
        let store = &self.store;
        let server_id = server.id.as_str();
        let songs = match request {
            PlaybackRequest::Song { name, artist } => {
                let matches = store.find_downloaded_by_title(server_id, name, artist.as_deref())?;
                let Some(first) = matches.first() else {
                    return Ok(Resolution::default());
                };
                let context = store.album_context(first)?;
                return Ok(Resolution {
                    items: local_items(&context),
                    focus_song_id: Some(first.id.clone()),
                });
            }
            PlaybackRequest::Album { name, artist } => {
                store.find_downloaded_by_album(server_id, name, artist.as_deref())?
            }
            PlaybackRequest::Artist { name } => store.find_downloaded_by_artist(server_id, name)?,
            PlaybackRequest::Playlist { name } => {
                let Some(playlist) = store.find_playlist_by_name(server_id, name)? else {
                    return Ok(Resolution::default());
                };
                let items = playlist
                    .songs
                    .iter()
                    .map(|song| match song.local_path() {
                        Some(path) => ResolvedPlayable::local(song, path),
                        None => ResolvedPlayable::remote(&song.to_song(), server),
                    })
                    .collect();
                return Ok(Resolution::unfocused(items));
            }
            PlaybackRequest::Genre { name } => store.find_downloaded_by_genre(server_id, name)?,
            PlaybackRequest::Decade { start_year } => store.find_downloaded_by_year_range(
                server_id,
                *start_year,
                start_year.saturating_add(9),
            )?,
            PlaybackRequest::Shuffle
            | PlaybackRequest::Favorites
            | PlaybackRequest::AllDownloads => store.downloaded_songs(server_id)?,
            PlaybackRequest::Continue => return self.resolve_continue(server),
        };
        Ok(Resolution::unfocused(local_items(&songs)))
    }

    fn resolve_continue(&self, server: &ServerConfig) -> Result<Resolution, StoreError> {
        let state = self.store.load_playback_state()?;
        if state
            .server_id
            .as_deref()
            .is_some_and(|saved| saved != server.id)
        {
            return Ok(Resolution::default());
        }

        let mut items = Vec::with_capacity(state.song_ids.len());
        for song_id in &state.song_ids {
            let Some(song) = self.store.get_song(&server.id, song_id)? else {
                continue;
            };
            items.push(match song.local_path() {
                Some(path) => ResolvedPlayable::local(&song, path),
                None => ResolvedPlayable::remote(&song.to_song(), server),
            });
        }

        let focus_song_id = state
            .current_song_id
            .or_else(|| state.song_ids.get(state.start_index).cloned());
        Ok(Resolution {
            items,
            focus_song_id,
        })
    }

    async fn resolve_remote(
        &self,
        request: &PlaybackRequest,
        server: &ServerConfig,
    ) -> Result<Resolution, ResolveRemoteError> {
        let client = self.client.as_ref();
        let songs = match request {
            PlaybackRequest::Song { name, artist } => {
                let limits = SearchLimits::songs(self.settings.remote_search_song_count);
                let result = client.search(server, name, limits).await?;
                let Some(song) = result
                    .songs
                    .into_iter()
                    .find(|song| {
                        names_match(&song.title, song.artist.as_deref(), name, artist.as_deref())
                    })
                else {
                    return Ok(Resolution::default());
                };
                let item = self.prefer_local(&song, server)?;
                return Ok(Resolution {
                    focus_song_id: Some(item.song_id.clone()),
                    items: vec![item],
                });
            }
            PlaybackRequest::Album { name, artist } => {
                let limits = SearchLimits::albums(self.settings.remote_search_song_count);
                let result = client.search(server, name, limits).await?;
                let Some(album) = result
                    .albums
                    .into_iter()
                    .find(|album| {
                        let album_artist = Some(album.artist.as_str());
                        names_match(&album.name, album_artist, name, artist.as_deref())
                    })
                else {
                    return Ok(Resolution::default());
                };
                client.get_album(server, &album.id).await?.1
            }
            PlaybackRequest::Artist { name } => {
                let limits = SearchLimits::artists(self.settings.remote_search_song_count);
                let result = client.search(server, name, limits).await?;
                let Some(artist) = result
                    .artists
                    .into_iter()
                    .find(|artist| match_key(&artist.name) == match_key(name))
                else {
                    return Ok(Resolution::default());
                };
                let (_, albums) = client.get_artist(server, &artist.id).await?;
                self.album_songs(server, &albums).await
            }
            PlaybackRequest::Playlist { name } => {
                let playlists = client.get_playlists(server).await?;
                let Some(playlist) = playlists
                    .into_iter()
                    .find(|playlist| match_key(&playlist.name) == match_key(name))
                else {
                    return Ok(Resolution::default());
                };
                client.get_playlist(server, &playlist.id).await?.1
            }
            PlaybackRequest::Genre { name } => {
                let genres = client.get_genres(server).await?;
                let Some(genre) = genres
                    .into_iter()
                    .find(|genre| match_key(&genre.value) == match_key(name))
                else {
                    return Ok(Resolution::default());
                };
                client
                    .get_songs_by_genre(server, &genre.value, self.settings.remote_collection_limit)
                    .await?
            }
            PlaybackRequest::Decade { start_year } => {
                let albums = client
                    .get_albums_by_year(
                        server,
                        *start_year,
                        start_year.saturating_add(9),
                        self.settings.remote_collection_limit,
                    )
                    .await?;
                self.album_songs(server, &albums).await
            }
            PlaybackRequest::Shuffle
            | PlaybackRequest::Favorites
            | PlaybackRequest::AllDownloads
            | PlaybackRequest::Continue => return Ok(Resolution::default()),
        };

        let items = songs
            .iter()
            .map(|song| self.prefer_local(song, server))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Resolution::unfocused(items))
    }

    /// Songs of every album, albums fetched concurrently and kept in the
    /// given order. Albums that fail to load are skipped.
    async fn album_songs(&self, server: &ServerConfig, albums: &[Album]) -> Vec<Song> {
        let limit = self.settings.remote_collection_limit as usize;
        let fetches = albums
            .iter()
            .take(limit)
            .map(|album| self.client.get_album(server, &album.id));

        let mut seen = HashSet::<String>::new();
        let mut songs = Vec::new();
        for (album, result) in albums.iter().zip(join_all(fetches).await) {
            match result {
                Ok((_, album_songs)) => songs.extend(
                    album_songs
                        .into_iter()
                        .filter(|song| seen.insert(song.id.clone())),
                ),
                Err(err) => log::warn!("Skipping album '{}': {err}", album.name),
            }
        }
        songs
    }

    /// A local item when the song is available offline, a stream otherwise.
    fn prefer_local(
        &self,
        song: &Song,
        server: &ServerConfig,
    ) -> Result<ResolvedPlayable, StoreError> {
        let local = self
            .store
            .get_song(&server.id, &song.id)?
            .and_then(|cached| cached.local_path().map(|path| (cached, path)));
        Ok(match local {
            Some((cached, path)) => ResolvedPlayable::local(&cached, path),
            None => ResolvedPlayable::remote(song, server),
        })
    }
}

#[derive(Debug, Error)]
enum ResolveRemoteError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn local_items(songs: &[CachedSong]) -> Vec<ResolvedPlayable> {
    songs
        .iter()
        .filter_map(|song| {
            song.local_path()
                .map(|path| ResolvedPlayable::local(song, path))
        })
        .collect()
}

fn names_match(
    candidate: &str,
    candidate_artist: Option<&str>,
    name: &str,
    artist: Option<&str>,
) -> bool {
    if match_key(candidate) != match_key(name) {
        return false;
    }
    match artist {
        Some(artist) => candidate_artist.is_some_and(|c| match_key(c) == match_key(artist)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockCatalogClient;
    use crate::api::models::{Artist, Playlist};
    use crate::db::test_support::{server, song};
    use crate::db::PlaybackState;
    use pretty_assertions::assert_eq;

    struct Fixture {
        dir: tempfile::TempDir,
        store: LocalStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                store: LocalStore::open_in_memory().unwrap(),
            }
        }

        fn download(&self, song: &Song) -> PathBuf {
            let path = self.dir.path().join(format!("{}.audio", song.id));
            std::fs::write(&path, b"audio").unwrap();
            self.store.mark_downloaded(song, &path).unwrap();
            path
        }

        fn resolver(
            &self,
            client: MockCatalogClient,
        ) -> (PlayableResolver, Arc<MockCatalogClient>) {
            let client = Arc::new(client);
            let resolver =
                PlayableResolver::new(self.store.clone(), client.clone(), CoreSettings::default());
            (resolver, client)
        }
    }

    fn song_request(name: &str, artist: Option<&str>) -> PlaybackRequest {
        PlaybackRequest::Song {
            name: name.to_string(),
            artist: artist.map(str::to_string),
        }
    }

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    #[test_log::test(tokio::test)]
    async fn downloaded_song_resolves_locally_without_remote_calls() {
        let fixture = Fixture::new();
        let path = fixture.download(&song("1", "Halo", "Beyoncé", "I Am... Sasha Fierce"));
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let resolution = resolver
            .resolve(&song_request("Halo", Some("Beyoncé")), &server())
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["1"]);
        assert_eq!(resolution.items[0].source, PlayableSource::LocalFile(path));
        assert_eq!(resolution.focus_song_id.as_deref(), Some("1"));
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn unknown_song_resolves_to_nothing() {
        let fixture = Fixture::new();
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let resolution = resolver
            .resolve(&song_request("Unknown Song", None), &server())
            .await
            .unwrap();

        assert!(resolution.is_empty());
        assert_eq!(client.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn remote_failure_is_treated_as_no_match() {
        let fixture = Fixture::new();
        let (resolver, client) = fixture.resolver(MockCatalogClient::offline());

        let resolution = resolver
            .resolve(&song_request("Halo", None), &server())
            .await
            .unwrap();

        assert!(resolution.is_empty());
        assert_eq!(client.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn remote_match_must_be_exact() {
        let fixture = Fixture::new();
        let client = MockCatalogClient::with_songs(vec![
            song("9", "Halo (Live)", "Beyoncé", "Live"),
            song("7", "HALO", "Beyoncé", "I Am"),
        ]);
        let (resolver, _client) = fixture.resolver(client);

        let resolution = resolver
            .resolve(&song_request("halo", None), &server())
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["7"]);
        let PlayableSource::RemoteStream(stream) = &resolution.items[0].source else {
            panic!("expected a stream");
        };
        assert_eq!(
            stream.url(),
            "https://music.example.com/rest/stream?id=7&u=alice&t=tok&s=salt&v=1.16.1&c=OfflineCatalog"
        );
    }

    #[test_log::test(tokio::test)]
    async fn remote_artist_filter_rejects_other_artists() {
        let fixture = Fixture::new();
        let client = MockCatalogClient::with_songs(vec![song("7", "Halo", "Cover Band", "Covers")]);
        let (resolver, _client) = fixture.resolver(client);

        let resolution = resolver
            .resolve(&song_request("Halo", Some("Beyoncé")), &server())
            .await
            .unwrap();
        assert!(resolution.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn local_song_plays_within_its_album() {
        let fixture = Fixture::new();
        for (id, track) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            let mut entry = song(id, &format!("Track {track}"), "Band", "Record");
            entry.track = Some(track);
            fixture.download(&entry);
        }
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let resolution = resolver
            .resolve(&song_request("track 3", None), &server())
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["a", "b", "c", "d"]);
        assert_eq!(resolution.focus_song_id.as_deref(), Some("c"));
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn remote_album_prefers_downloaded_members() {
        let fixture = Fixture::new();
        let tracks = vec![song("a", "One", "Band", "Record"), song("b", "Two", "Band", "Record")];
        let local = fixture.download(&tracks[1]);
        // Downloaded under a different album name so the local album lookup misses.
        let mut renamed = tracks[1].clone();
        renamed.album = Some("Old Name".to_string());
        fixture.store.upsert_songs(&[renamed]).unwrap();
        let album = Album {
            id: "al-1".to_string(),
            name: "Record".to_string(),
            artist: "Band".to_string(),
            ..Album::default()
        };
        let (resolver, _client) = fixture.resolver(MockCatalogClient {
            albums: vec![(album, tracks)],
            ..MockCatalogClient::default()
        });

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Album {
                    name: "record".to_string(),
                    artist: None,
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["a", "b"]);
        assert!(!resolution.items[0].is_local());
        assert_eq!(resolution.items[1].source, PlayableSource::LocalFile(local));
        assert_eq!(resolution.focus_song_id, None);
    }

    #[test_log::test(tokio::test)]
    async fn remote_artist_collects_album_songs_shuffled() {
        let fixture = Fixture::new();
        let first = Album {
            id: "al-1".to_string(),
            name: "First".to_string(),
            ..Album::default()
        };
        let second = Album {
            id: "al-2".to_string(),
            name: "Second".to_string(),
            ..Album::default()
        };
        let artist = Artist {
            id: "ar-1".to_string(),
            name: "Band".to_string(),
            ..Artist::default()
        };
        let (resolver, _client) = fixture.resolver(MockCatalogClient {
            artists: vec![(artist, vec![first.clone(), second.clone()])],
            albums: vec![
                (first, vec![song("a", "One", "Band", "First"), song("b", "Two", "Band", "First")]),
                (second, vec![song("c", "Three", "Band", "Second")]),
            ],
            ..MockCatalogClient::default()
        });

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Artist {
                    name: "band".to_string(),
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(sorted(resolution.song_ids()), vec!["a", "b", "c"]);
    }

    #[test_log::test(tokio::test)]
    async fn cached_playlist_keeps_relation_order_and_streams_missing_songs() {
        let fixture = Fixture::new();
        let songs = vec![
            song("c", "Three", "A", "X"),
            song("a", "One", "A", "X"),
            song("b", "Two", "A", "X"),
        ];
        fixture
            .store
            .save_playlist_with_songs(
                &crate::db::CachedPlaylist {
                    id: "p1".to_string(),
                    server_id: "srv".to_string(),
                    name: "Road Trip".to_string(),
                    ..Default::default()
                },
                &songs,
            )
            .unwrap();
        fixture.download(&songs[1]);
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Playlist {
                    name: "ROAD TRIP".to_string(),
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["c", "a", "b"]);
        let local: Vec<bool> = resolution.items.iter().map(|i| i.is_local()).collect();
        assert_eq!(local, vec![false, true, false]);
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn remote_playlist_is_found_by_exact_name() {
        let fixture = Fixture::new();
        let playlist = Playlist {
            id: "p1".to_string(),
            name: "Road Trip".to_string(),
            ..Playlist::default()
        };
        let decoy = Playlist {
            id: "p2".to_string(),
            name: "Road Trip 2".to_string(),
            ..Playlist::default()
        };
        let (resolver, _client) = fixture.resolver(MockCatalogClient {
            playlists: vec![
                (decoy, vec![song("z", "Zed", "A", "X")]),
                (playlist, vec![song("b", "Two", "A", "X"), song("a", "One", "A", "X")]),
            ],
            ..MockCatalogClient::default()
        });

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Playlist {
                    name: "road trip".to_string(),
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["b", "a"]);
    }

    #[test_log::test(tokio::test)]
    async fn local_only_kinds_never_call_the_server() {
        let fixture = Fixture::new();
        for id in ["1", "2", "3"] {
            fixture.download(&song(id, &format!("Song {id}"), "A", "B"));
        }
        let (resolver, client) = fixture.resolver(MockCatalogClient::with_songs(vec![song(
            "remote", "Remote", "A", "B",
        )]));

        for request in [
            PlaybackRequest::Shuffle,
            PlaybackRequest::Favorites,
            PlaybackRequest::AllDownloads,
        ] {
            let resolution = resolver.resolve(&request, &server()).await.unwrap();
            assert_eq!(sorted(resolution.song_ids()), vec!["1", "2", "3"]);
            assert_eq!(resolution.focus_song_id, None);
        }
        assert_eq!(client.calls(), 0);

        let empty = Fixture::new();
        let (resolver, client) = empty.resolver(MockCatalogClient::default());
        assert!(resolver
            .resolve(&PlaybackRequest::Shuffle, &server())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn genre_and_decade_use_local_downloads_first() {
        let fixture = Fixture::new();
        let mut rock = song("1", "Loud", "A", "B");
        rock.genre = Some("Rock".to_string());
        rock.year = Some(1994);
        fixture.download(&rock);
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let genre = resolver
            .resolve(
                &PlaybackRequest::Genre {
                    name: "rock".to_string(),
                },
                &server(),
            )
            .await
            .unwrap();
        let decade = resolver
            .resolve(&PlaybackRequest::Decade { start_year: 1990 }, &server())
            .await
            .unwrap();

        assert_eq!(genre.song_ids(), vec!["1"]);
        assert_eq!(decade.song_ids(), vec!["1"]);
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn remote_genre_uses_the_servers_spelling() {
        let fixture = Fixture::new();
        let mut loud = song("1", "Loud", "A", "B");
        loud.genre = Some("Rock".to_string());
        let mut louder = song("2", "Louder", "A", "B");
        louder.genre = Some("Rock & Roll".to_string());
        let client = MockCatalogClient::with_songs(vec![loud, louder]);
        let (resolver, _client) = fixture.resolver(client);

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Genre {
                    name: "ROCK".to_string(),
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["1"]);
    }

    #[test_log::test(tokio::test)]
    async fn remote_decade_collects_albums_in_range() {
        let fixture = Fixture::new();
        let nineties = Album {
            id: "al-1".to_string(),
            name: "Nineties".to_string(),
            year: Some(1995),
            ..Album::default()
        };
        let eighties = Album {
            id: "al-2".to_string(),
            name: "Eighties".to_string(),
            year: Some(1989),
            ..Album::default()
        };
        let (resolver, _client) = fixture.resolver(MockCatalogClient {
            albums: vec![
                (nineties, vec![song("a", "One", "Band", "Nineties")]),
                (eighties, vec![song("b", "Two", "Band", "Eighties")]),
            ],
            ..MockCatalogClient::default()
        });

        let resolution = resolver
            .resolve(&PlaybackRequest::Decade { start_year: 1990 }, &server())
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["a"]);
    }

    #[test_log::test(tokio::test)]
    async fn decade_at_the_end_of_the_year_range_does_not_overflow() {
        let fixture = Fixture::new();
        let last = Album {
            id: "al-1".to_string(),
            name: "Far Future".to_string(),
            year: Some(u32::MAX - 1),
            ..Album::default()
        };
        let (resolver, _client) = fixture.resolver(MockCatalogClient {
            albums: vec![(last, vec![song("a", "One", "Band", "Far Future")])],
            ..MockCatalogClient::default()
        });

        let resolution = resolver
            .resolve(
                &PlaybackRequest::Decade {
                    start_year: u32::MAX - 3,
                },
                &server(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["a"]);
    }

    #[test_log::test(tokio::test)]
    async fn continue_restores_saved_queue() {
        let fixture = Fixture::new();
        fixture.download(&song("1", "One", "A", "B"));
        fixture.store.upsert_songs(&[song("2", "Two", "A", "B")]).unwrap();
        fixture
            .store
            .save_playback_state(&PlaybackState {
                server_id: Some("srv".to_string()),
                song_ids: vec!["1".to_string(), "gone".to_string(), "2".to_string()],
                start_index: 2,
                current_song_id: Some("2".to_string()),
            })
            .unwrap();
        let (resolver, client) = fixture.resolver(MockCatalogClient::default());

        let resolution = resolver
            .resolve(&PlaybackRequest::Continue, &server())
            .await
            .unwrap();

        assert_eq!(resolution.song_ids(), vec!["1", "2"]);
        assert!(resolution.items[0].is_local());
        assert!(!resolution.items[1].is_local());
        assert_eq!(resolution.focus_song_id.as_deref(), Some("2"));
        assert_eq!(client.calls(), 0);
    }

    #[test_log::test]
    fn from_kind_parses_front_door_parameters() {
        assert_eq!(
            PlaybackRequest::from_kind("song", Some(" Halo "), Some("Beyoncé")),
            Some(song_request("Halo", Some("Beyoncé")))
        );
        assert_eq!(
            PlaybackRequest::from_kind("artist", None, Some("Beyoncé")),
            Some(PlaybackRequest::Artist {
                name: "Beyoncé".to_string()
            })
        );
        assert_eq!(
            PlaybackRequest::from_kind("ALL_DOWNLOADS", None, None),
            Some(PlaybackRequest::AllDownloads)
        );
        assert_eq!(PlaybackRequest::from_kind("song", Some("  "), None), None);
        assert_eq!(PlaybackRequest::from_kind("podcast", Some("x"), None), None);
    }

    #[test_log::test]
    fn decades_accept_common_spellings() {
        assert_eq!(parse_decade("1990"), Some(1990));
        assert_eq!(parse_decade("1990s"), Some(1990));
        assert_eq!(parse_decade("90s"), Some(1990));
        assert_eq!(parse_decade("'80s"), Some(1980));
        assert_eq!(parse_decade("10s"), Some(2010));
        assert_eq!(parse_decade("1994"), Some(1990));
        assert_eq!(parse_decade("nineties"), None);
    }
}
