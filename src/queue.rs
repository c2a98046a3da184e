//! Turns a [`Resolution`] into the descriptors a playback engine consumes.

use crate::api::locators::cover_art_url;
use crate::api::models::ServerConfig;
use crate::resolver::{PlayableSource, Resolution, ResolvedPlayable};

/// One entry of a play queue. `locator` is a local file path or a stream
/// URL; the engine does not need to know which.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub id: String,
    pub locator: String,
    pub title: String,
    pub artist: Option<String>,
    pub album_title: Option<String>,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayQueue {
    pub items: Vec<MediaDescriptor>,
    pub start_index: usize,
}

impl PlayQueue {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

pub struct QueueBuilder<'a> {
    server: &'a ServerConfig,
}

impl<'a> QueueBuilder<'a> {
    pub fn new(server: &'a ServerConfig) -> Self {
        Self { server }
    }

    /// Keeps the resolution's order. The start index points at the focused
    /// song, or the first item when there is no focus or it is absent.
    pub fn build(&self, resolution: &Resolution) -> PlayQueue {
        let items: Vec<MediaDescriptor> = resolution
            .items
            .iter()
            .map(|item| self.descriptor(item))
            .collect();

        let start_index = resolution
            .focus_song_id
            .as_deref()
            .and_then(|focus| items.iter().position(|item| item.id == focus))
            .unwrap_or(0);

        PlayQueue { items, start_index }
    }

    fn descriptor(&self, item: &ResolvedPlayable) -> MediaDescriptor {
        let locator = match &item.source {
            PlayableSource::LocalFile(path) => path.to_string_lossy().into_owned(),
            PlayableSource::RemoteStream(stream) => stream.url(),
        };
        MediaDescriptor {
            id: item.song_id.clone(),
            locator,
            title: item.title.clone(),
            artist: item.artist.clone(),
            album_title: item.album.clone(),
            artwork_url: cover_art_url(self.server, item.cover_art.as_deref()),
        }
    }
}
