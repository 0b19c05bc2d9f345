//! Smart update: decides whether a fresh sample is worth publishing.

use chrono::{DateTime, Duration, Utc};
use tsuzuki_core::config::PresenceConfig;
use tsuzuki_core::models::EpisodeMeta;
use tsuzuki_mpv::PlaybackSample;

/// Thresholds for republishing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartUpdatePolicy {
    /// Seconds of unexpected position change treated as a seek.
    pub drift_threshold: f64,
    /// Republish unconditionally after this long without a forced publish.
    pub force_refresh: Duration,
}

impl Default for SmartUpdatePolicy {
    fn default() -> Self {
        Self {
            drift_threshold: 2.0,
            force_refresh: Duration::seconds(120),
        }
    }
}

impl SmartUpdatePolicy {
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            drift_threshold: config.drift_threshold_secs.max(0.0),
            // Out-of-range values mean "effectively never".
            force_refresh: i64::try_from(config.force_refresh_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }
}

/// Why a sample was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    /// Nothing has been published in this session yet.
    Initial,
    PauseToggled,
    /// Episode label or title changed.
    MetadataChanged,
    /// Position moved away from where uninterrupted playback would be.
    Seeked,
    /// Liveness refresh after a quiet period.
    ForceRefresh,
}

/// The last state actually handed to the presence service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishedState {
    pub paused: bool,
    pub episode_label: String,
    pub title: String,
    pub position: f64,
    pub speed: f64,
    /// `None` until the first publish of the session.
    pub published_at: Option<DateTime<Utc>>,
    pub forced_at: Option<DateTime<Utc>>,
}

impl PublishedState {
    pub fn is_empty(&self) -> bool {
        self.published_at.is_none()
    }

    /// Where the player should be now if nothing happened since the last publish.
    pub fn expected_position(&self, now: DateTime<Utc>) -> f64 {
        match self.published_at {
            Some(at) if !self.paused => {
                let elapsed = (now - at).num_milliseconds().max(0) as f64 / 1000.0;
                self.position + elapsed * self.speed
            }
            _ => self.position,
        }
    }

    fn force_due(&self, now: DateTime<Utc>, policy: &SmartUpdatePolicy) -> bool {
        self.forced_at
            .map_or(true, |at| now - at >= policy.force_refresh)
    }

    /// Remember a sample that was just published.
    pub fn record(
        &mut self,
        sample: &PlaybackSample,
        meta: &EpisodeMeta,
        now: DateTime<Utc>,
        policy: &SmartUpdatePolicy,
    ) {
        if self.force_due(now, policy) {
            self.forced_at = Some(now);
        }
        self.paused = sample.paused;
        self.position = sample.position;
        self.speed = sample.speed;
        self.published_at = Some(now);
        if self.episode_label != meta.episode_label {
            self.episode_label.clone_from(&meta.episode_label);
        }
        if self.title != meta.title {
            self.title.clone_from(&meta.title);
        }
    }
}

/// Decide whether `sample` should be published; `None` means skip it.
///
/// A seek is drift from where uninterrupted playback would be by now
/// ([`PublishedState::expected_position`]), not from the last published
/// position, which normal playback leaves behind every tick.
pub fn should_publish(
    sample: &PlaybackSample,
    meta: &EpisodeMeta,
    published: &PublishedState,
    now: DateTime<Utc>,
    policy: &SmartUpdatePolicy,
) -> Option<PublishReason> {
    if published.is_empty() {
        return Some(PublishReason::Initial);
    }
    if sample.paused != published.paused {
        return Some(PublishReason::PauseToggled);
    }
    if meta.episode_label != published.episode_label || meta.title != published.title {
        return Some(PublishReason::MetadataChanged);
    }
    // Drift is meaningless while paused.
    if !sample.paused
        && (sample.position - published.expected_position(now)).abs() >= policy.drift_threshold
    {
        return Some(PublishReason::Seeked);
    }
    if published.force_due(now, policy) {
        return Some(PublishReason::ForceRefresh);
    }
    None
}
