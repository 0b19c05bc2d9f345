//! Playback presence synchronization.
//!
//! A [`SyncSession`] polls the player through a [`PlaybackSource`], lets the
//! [`differ`] decide whether anything worth showing changed, anchors the
//! progress bar with [`timestamps`], and hands the resulting
//! [`PresenceActivity`] to a [`PresenceSession`]. Presence is best effort:
//! nothing in here can fail or slow down playback.
//!
//! [`PlaybackSource`]: tsuzuki_mpv::PlaybackSource

pub mod activity;
pub mod differ;
pub mod discord;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod timestamps;

#[cfg(test)]
pub(crate) mod testing;

pub use activity::{ActivityAssets, PresenceActivity};
pub use differ::{PublishReason, PublishedState, SmartUpdatePolicy};
pub use discord::DiscordClient;
pub use error::PresenceError;
pub use scheduler::{CycleOutcome, SyncConfig, SyncSession};
pub use session::{PresenceClient, PresenceSession};
pub use timestamps::Anchors;
