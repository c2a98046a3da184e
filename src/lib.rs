//! Offline-first core for Subsonic/Navidrome catalog clients.
//!
//! The crate turns playback requests into ordered queues that prefer
//! downloaded audio over streaming, and feeds a durable download queue that
//! keeps a local SQLite mirror of the remote catalog in sync.

pub mod api;
pub mod config;
pub mod db;
pub mod download;
pub mod offline_audio;
pub mod playback;
pub mod queue;
pub mod resolver;

pub use api::{ApiError, CatalogClient, ServerConfig, SubsonicClient};
pub use config::CoreSettings;
pub use db::{LocalStore, StoreError};
pub use download::{DownloadOrchestrator, EnqueueReport, GroupTag};
pub use playback::{handle_request, PlaybackController};
pub use queue::{MediaDescriptor, PlayQueue, QueueBuilder};
pub use resolver::{PlaybackRequest, PlayableResolver, Resolution, ResolvedPlayable};
