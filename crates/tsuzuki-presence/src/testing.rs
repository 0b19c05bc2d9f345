//! Test doubles shared by the unit tests of this crate.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tsuzuki_mpv::{IpcError, PlaybackSample, PlaybackSource, Property};

use crate::activity::PresenceActivity;
use crate::error::PresenceError;
use crate::session::PresenceClient;

/// Everything a [`RecordingClient`] was asked to do.
#[derive(Debug, Default)]
pub struct Recorded {
    pub connects: usize,
    pub activities: Vec<PresenceActivity>,
    pub clears: usize,
    pub closes: usize,
}

pub type RecordLog = Arc<Mutex<Recorded>>;

#[derive(Default)]
pub struct RecordingClient {
    log: RecordLog,
    /// Connect attempts that fail before one succeeds.
    connect_failures: usize,
    fail_publish: bool,
}

impl RecordingClient {
    pub fn failing_connect() -> Self {
        Self::failing_first_connects(usize::MAX)
    }

    /// Fails the first `count` connects, as if Discord started later.
    pub fn failing_first_connects(count: usize) -> Self {
        Self {
            connect_failures: count,
            ..Default::default()
        }
    }

    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    pub fn log(&self) -> RecordLog {
        Arc::clone(&self.log)
    }
}

impl PresenceClient for RecordingClient {
    fn connect(&mut self) -> Result<(), PresenceError> {
        self.log.lock().unwrap().connects += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(PresenceError::Connect("no Discord client running".into()));
        }
        Ok(())
    }

    fn set_activity(&mut self, activity: &PresenceActivity) -> Result<(), PresenceError> {
        if self.fail_publish {
            return Err(PresenceError::Publish("pipe closed".into()));
        }
        self.log.lock().unwrap().activities.push(activity.clone());
        Ok(())
    }

    fn clear_activity(&mut self) -> Result<(), PresenceError> {
        self.log.lock().unwrap().clears += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PresenceError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Poll `log` until `done` holds, for up to two seconds.
pub async fn wait_for(log: &RecordLog, done: impl Fn(&Recorded) -> bool) -> bool {
    for _ in 0..200 {
        if done(&log.lock().unwrap()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn activity(title: &str) -> PresenceActivity {
    PresenceActivity {
        title: title.into(),
        state: "Episode 1".into(),
        large_image: "logo".into(),
        large_text: title.into(),
        small_image: None,
        small_text: None,
        start: Utc::now(),
        end: None,
        buttons: Vec::new(),
    }
}

/// A player whose state the test controls; `None` means the IPC is down.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    sample: Arc<Mutex<Option<PlaybackSample>>>,
}

impl ScriptedSource {
    pub fn new(sample: PlaybackSample) -> Self {
        let source = Self::default();
        source.set(Some(sample));
        source
    }

    pub fn set(&self, sample: Option<PlaybackSample>) {
        *self.sample.lock().unwrap() = sample;
    }
}

impl PlaybackSource for ScriptedSource {
    fn get_property(
        &mut self,
        property: Property,
    ) -> impl Future<Output = Result<Value, IpcError>> + Send {
        let reply = match *self.sample.lock().unwrap() {
            None => Err(IpcError::Closed),
            Some(s) => Ok(match property {
                Property::TimePos => json!(s.position),
                Property::Duration => json!(s.duration as f64),
                Property::Pause => json!(s.paused),
                Property::Speed => json!(s.speed),
            }),
        };
        async move { reply }
    }
}

/// A player that takes `delay` to answer each query.
#[derive(Clone)]
pub struct SlowSource {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queries started but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl PlaybackSource for SlowSource {
    fn get_property(
        &mut self,
        property: Property,
    ) -> impl Future<Output = Result<Value, IpcError>> + Send {
        let delay = self.delay;
        let in_flight = Arc::clone(&self.in_flight);
        async move {
            in_flight.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(match property {
                Property::TimePos => json!(60.0),
                Property::Duration => json!(1440.0),
                Property::Pause => json!(false),
                Property::Speed => json!(1.0),
            })
        }
    }
}
