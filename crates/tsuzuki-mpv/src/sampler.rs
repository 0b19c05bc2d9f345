use std::future::Future;

use serde_json::Value;
use tracing::trace;

use crate::error::IpcError;
use crate::ipc::{MpvIpc, Property};

/// Longest position or duration accepted from the player, in seconds.
///
/// Anything beyond this is a broken reply rather than real media.
pub const MAX_MEDIA_SECS: f64 = 1e9;

/// Anything that can answer typed property queries about a running player.
///
/// [`MpvIpc`] is the real implementation; tests substitute in-memory doubles.
pub trait PlaybackSource: Send {
    fn get_property(
        &mut self,
        property: Property,
    ) -> impl Future<Output = Result<Value, IpcError>> + Send;
}

impl PlaybackSource for MpvIpc {
    fn get_property(
        &mut self,
        property: Property,
    ) -> impl Future<Output = Result<Value, IpcError>> + Send {
        self.query(property)
    }
}

/// A point-in-time read of the player's playback state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSample {
    /// Seconds into the media, never negative.
    pub position: f64,
    /// Media length in whole seconds; 0 when unknown.
    pub duration: u64,
    pub paused: bool,
    /// Playback rate, always positive.
    pub speed: f64,
}

impl PlaybackSample {
    /// A 1x, unpaused sample.
    pub fn playing(position: f64, duration: u64) -> Self {
        Self {
            position,
            duration,
            paused: false,
            speed: 1.0,
        }
    }

    pub fn paused(self, paused: bool) -> Self {
        Self { paused, ..self }
    }

    pub fn with_speed(self, speed: f64) -> Self {
        Self { speed, ..self }
    }
}

/// Turns raw property replies into a [`PlaybackSample`].
///
/// Keeps the last good duration, seeded from the metadata hint, because mpv
/// reports `duration` as unavailable until the demuxer has opened the stream.
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    duration_cache: u64,
}

impl Sampler {
    pub fn new(duration_hint: u64) -> Self {
        Self {
            duration_cache: duration_hint,
        }
    }

    /// Replace the fallback duration; zero leaves the cache untouched.
    pub fn set_duration_hint(&mut self, seconds: u64) {
        if seconds > 0 {
            self.duration_cache = seconds;
        }
    }

    /// Sample the player once.
    ///
    /// Returns `None` when the position cannot be read; every other property
    /// degrades to its fallback instead of failing the sample.
    pub async fn sample<S: PlaybackSource>(&mut self, source: &mut S) -> Option<PlaybackSample> {
        let position = match source.get_property(Property::TimePos).await {
            Ok(value) => match value
                .as_f64()
                .filter(|p| p.is_finite() && *p <= MAX_MEDIA_SECS)
            {
                Some(p) => p.max(0.0),
                None => {
                    trace!(value = %value, "time-pos is not a usable number");
                    return None;
                }
            },
            Err(e) => {
                trace!(error = %e, "time-pos unavailable");
                return None;
            }
        };

        let reported = source
            .get_property(Property::Duration)
            .await
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|d| d.is_finite() && *d > 0.0 && *d <= MAX_MEDIA_SECS)
            .map(|d| d.round() as u64)
            .filter(|d| *d > 0);
        if let Some(duration) = reported {
            self.duration_cache = duration;
        }

        let paused = source
            .get_property(Property::Pause)
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let speed = source
            .get_property(Property::Speed)
            .await
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0);

        Some(PlaybackSample {
            position,
            duration: self.duration_cache,
            paused,
            speed,
        })
    }
}
