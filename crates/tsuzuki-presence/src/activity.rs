use chrono::{DateTime, Utc};
use tsuzuki_core::config::PresenceConfig;
use tsuzuki_core::models::{EpisodeMeta, LinkButton};
use tsuzuki_mpv::PlaybackSample;

use crate::timestamps::Anchors;

/// The presence service rejects activities with more buttons than this.
pub const MAX_BUTTONS: usize = 2;

/// Longest text the presence service accepts in a single field.
pub const MAX_TEXT_LEN: usize = 128;

/// Image keys and labels that do not come from episode metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityAssets {
    /// Large image used when the episode has no artwork.
    pub fallback_image: String,
    pub paused_image: String,
    pub paused_text: String,
}

impl Default for ActivityAssets {
    fn default() -> Self {
        Self {
            fallback_image: "logo".into(),
            paused_image: "pause".into(),
            paused_text: "Paused".into(),
        }
    }
}

impl ActivityAssets {
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            fallback_image: config.fallback_image.clone(),
            paused_image: config.paused_image.clone(),
            paused_text: config.paused_text.clone(),
        }
    }
}

/// Outbound "now watching" payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceActivity {
    pub title: String,
    pub state: String,
    pub large_image: String,
    pub large_text: String,
    /// Only set while paused.
    pub small_image: Option<String>,
    pub small_text: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub buttons: Vec<LinkButton>,
}

impl PresenceActivity {
    pub fn build(
        meta: &EpisodeMeta,
        sample: &PlaybackSample,
        anchors: Anchors,
        assets: &ActivityAssets,
    ) -> Self {
        let (small_image, small_text) = if sample.paused {
            (
                Some(assets.paused_image.clone()),
                Some(clamp_text(&assets.paused_text)),
            )
        } else {
            (None, None)
        };

        Self {
            title: clamp_text(&meta.title),
            state: clamp_text(&meta.state_text()),
            large_image: meta
                .artwork_url
                .clone()
                .unwrap_or_else(|| assets.fallback_image.clone()),
            large_text: clamp_text(&meta.title),
            small_image,
            small_text,
            start: anchors.start,
            end: anchors.end,
            buttons: Vec::new(),
        }
        .with_buttons(meta.links.iter().cloned())
    }

    /// Set the buttons, keeping only the first [`MAX_BUTTONS`].
    pub fn with_buttons(mut self, buttons: impl IntoIterator<Item = LinkButton>) -> Self {
        self.buttons = buttons.into_iter().take(MAX_BUTTONS).collect();
        self
    }

    pub fn is_paused(&self) -> bool {
        self.small_image.is_some()
    }
}

fn clamp_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_LEN {
        return text.to_string();
    }
    let mut clamped: String = text.chars().take(MAX_TEXT_LEN - 3).collect();
    clamped.push_str("...");
    clamped
}
