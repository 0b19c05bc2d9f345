//! Progress-bar anchors.
//!
//! The presence service renders elapsed/remaining time itself from two
//! absolute instants, so a single publish keeps the bar moving until the next
//! state change. Anchoring to `now` rather than to the previous anchor keeps
//! the display immune to sampling jitter.

use chrono::{DateTime, Duration, Utc};
use tsuzuki_mpv::PlaybackSample;

/// Absolute wall-clock anchors for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
    /// When playback would have started had it run uninterrupted at 1x.
    pub start: DateTime<Utc>,
    /// When playback will finish at the current speed. Absent while paused
    /// (freezes the remote bar) or when the duration is unknown or exhausted.
    pub end: Option<DateTime<Utc>>,
}

/// Anchors for `sample` as seen at `now`.
///
/// Values too large for a timestamp never panic: the end anchor is dropped
/// and the start falls back to `now`.
pub fn anchors(sample: &PlaybackSample, now: DateTime<Utc>) -> Anchors {
    let start = seconds(sample.position)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .unwrap_or(now);

    if sample.paused {
        return Anchors { start, end: None };
    }

    let duration = sample.duration as f64;
    let end = if duration > sample.position {
        let speed = if sample.speed > 0.0 { sample.speed } else { 1.0 };
        seconds((duration - sample.position) / speed)
            .and_then(|remaining| now.checked_add_signed(remaining))
    } else {
        None
    };

    Anchors { start, end }
}

fn seconds(secs: f64) -> Option<Duration> {
    let millis = (secs * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}
