//! Hands resolved queues to the external playback engine.
//!
//! The functions here are the front door for deep links and voice intents.
//! They never fail: errors are logged and reported as `false`, and the
//! controller is only touched when there is something to play.

use async_trait::async_trait;

use crate::api::models::ServerConfig;
use crate::db::PlaybackState;
use crate::queue::{MediaDescriptor, PlayQueue, QueueBuilder};
use crate::resolver::{PlayableResolver, PlaybackRequest};

/// The playback engine, as seen from this crate.
#[async_trait]
pub trait PlaybackController: Send + Sync {
    async fn play_queue(&self, items: Vec<MediaDescriptor>, start_index: usize);
    async fn add_to_queue(&self, items: Vec<MediaDescriptor>);
    async fn play(&self);
}

async fn build_queue(
    resolver: &PlayableResolver,
    server: &ServerConfig,
    request: &PlaybackRequest,
) -> Option<PlayQueue> {
    let resolution = match resolver.resolve(request, server).await {
        Ok(resolution) => resolution,
        Err(err) => {
            log::error!("Failed to resolve {request:?}: {err}");
            return None;
        }
    };
    if resolution.is_empty() {
        return None;
    }
    Some(QueueBuilder::new(server).build(&resolution))
}

/// Resolves `request`, replaces the controller's queue and starts playback.
/// Returns whether anything was queued.
pub async fn handle_request(
    resolver: &PlayableResolver,
    controller: &dyn PlaybackController,
    server: &ServerConfig,
    request: &PlaybackRequest,
) -> bool {
    let Some(queue) = build_queue(resolver, server, request).await else {
        return false;
    };

    let state = PlaybackState {
        server_id: Some(server.id.clone()),
        song_ids: queue.ids(),
        start_index: queue.start_index,
        current_song_id: queue.items.get(queue.start_index).map(|item| item.id.clone()),
    };

    log::info!(
        "Playing {} items from index {} for {request:?}",
        queue.items.len(),
        queue.start_index
    );
    controller.play_queue(queue.items, queue.start_index).await;
    controller.play().await;

    if let Err(err) = resolver.store().save_playback_state(&state) {
        log::warn!("Failed to save playback state: {err}");
    }
    true
}

/// Resolves `request` and appends the result to the current queue without
/// interrupting playback.
pub async fn append_request(
    resolver: &PlayableResolver,
    controller: &dyn PlaybackController,
    server: &ServerConfig,
    request: &PlaybackRequest,
) -> bool {
    let Some(queue) = build_queue(resolver, server, request).await else {
        return false;
    };
    controller.add_to_queue(queue.items).await;
    true
}

/// [`handle_request`] for a raw kind and parameters. Unknown kinds are
/// ignored.
pub async fn handle_intent(
    resolver: &PlayableResolver,
    controller: &dyn PlaybackController,
    server: &ServerConfig,
    kind: &str,
    name: Option<&str>,
    artist: Option<&str>,
) -> bool {
    match PlaybackRequest::from_kind(kind, name, artist) {
        Some(request) => handle_request(resolver, controller, server, &request).await,
        None => {
            log::warn!("Ignoring unsupported playback intent '{kind}'");
            false
        }
    }
}
