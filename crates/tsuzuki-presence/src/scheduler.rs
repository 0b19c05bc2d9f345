//! Periodic presence sync for one episode playback.
//!
//! ```text
//! Idle --start()--> Running --stop()--> Stopped
//!   \________________stop()___________/
//! ```
//!
//! The sampling task owns nothing but clones of the shared state; the player
//! handle and the last published state live behind one async mutex. The task
//! only ever `try_lock`s it, so a foreground caller holding the player (for a
//! seek or a quit command) makes the task skip a beat instead of queueing.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use tsuzuki_core::config::PresenceConfig;
use tsuzuki_core::models::EpisodeMeta;
use tsuzuki_mpv::{PlaybackSource, Sampler};

use crate::activity::{ActivityAssets, PresenceActivity};
use crate::differ::{self, PublishReason, PublishedState, SmartUpdatePolicy};
use crate::session::PresenceSession;
use crate::timestamps;

/// Tunables of one sync session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval: Duration,
    pub policy: SmartUpdatePolicy,
    pub assets: ActivityAssets,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: SmartUpdatePolicy::default(),
            assets: ActivityAssets::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            interval: config.update_interval(),
            policy: SmartUpdatePolicy::from_config(config),
            assets: ActivityAssets::from_config(config),
        }
    }
}

/// What a single sampling cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Someone else held the session; the cycle was skipped.
    Busy,
    /// The player could not be sampled.
    Unavailable,
    /// Nothing worth publishing changed.
    Unchanged,
    /// The presence session is logged out; nothing was sent.
    Offline,
    Published(PublishReason),
}

struct SyncState<S> {
    source: S,
    sampler: Sampler,
    meta: EpisodeMeta,
    published: PublishedState,
}

enum Lifecycle {
    Idle,
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Mirrors one playback into a [`PresenceSession`].
pub struct SyncSession<S: PlaybackSource + 'static> {
    shared: Arc<Mutex<SyncState<S>>>,
    presence: PresenceSession,
    config: SyncConfig,
    lifecycle: std::sync::Mutex<Lifecycle>,
}

impl<S: PlaybackSource + 'static> SyncSession<S> {
    pub fn new(source: S, meta: EpisodeMeta, presence: PresenceSession, config: SyncConfig) -> Self {
        let state = SyncState {
            source,
            sampler: Sampler::new(meta.duration_hint),
            meta,
            published: PublishedState::default(),
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
            presence,
            config,
            lifecycle: std::sync::Mutex::new(Lifecycle::Idle),
        }
    }

    /// Spawn the sampling task; the first cycle runs immediately.
    ///
    /// Only the first call does anything. Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            debug!("Presence sync already started");
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.presence.clone(),
            self.config.clone(),
            cancel.clone(),
        ));
        *lifecycle = Lifecycle::Running { cancel, task };
    }

    /// Cancel the sampling task and wait for its in-flight cycle to finish.
    ///
    /// Idempotent: later (or concurrent) calls see the stopped state and
    /// return immediately.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        if let Lifecycle::Running { cancel, task } = previous {
            cancel.cancel();
            if let Err(e) = task.await {
                warn!(error = %e, "Presence sync task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running { .. })
    }

    /// Exclusive access to the player handle, waiting for any in-flight cycle.
    pub async fn lock_source(&self) -> MappedMutexGuard<'_, S> {
        MutexGuard::map(self.shared.lock().await, |state| &mut state.source)
    }

    /// Swap the episode metadata (e.g. once a better title resolves).
    pub async fn update_metadata(&self, meta: EpisodeMeta) {
        let mut state = self.shared.lock().await;
        state.sampler.set_duration_hint(meta.duration_hint);
        state.meta = meta;
    }

    /// Run one cycle right now, outside the periodic schedule.
    pub async fn run_once(&self) -> CycleOutcome {
        run_cycle(&self.shared, &self.presence, &self.config).await
    }

    /// Snapshot of the last published state, unless a cycle is in flight.
    pub fn published(&self) -> Option<PublishedState> {
        self.shared
            .try_lock()
            .ok()
            .map(|state| state.published.clone())
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: PlaybackSource + 'static> Drop for SyncSession<S> {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = &*self.lifecycle() {
            cancel.cancel();
        }
    }
}

async fn run_loop<S: PlaybackSource>(
    shared: Arc<Mutex<SyncState<S>>>,
    presence: PresenceSession,
    config: SyncConfig,
    cancel: CancellationToken,
) {
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(interval = ?config.interval, "Presence sync started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                run_cycle(&shared, &presence, &config).await;
            }
        }
    }

    debug!("Presence sync stopped");
}

/// sample -> diff -> anchors -> publish, skipped when the state is contended.
async fn run_cycle<S: PlaybackSource>(
    shared: &Mutex<SyncState<S>>,
    presence: &PresenceSession,
    config: &SyncConfig,
) -> CycleOutcome {
    let Ok(mut guard) = shared.try_lock() else {
        trace!("Session busy, skipping presence cycle");
        return CycleOutcome::Busy;
    };
    let state = &mut *guard;

    let Some(sample) = state.sampler.sample(&mut state.source).await else {
        return CycleOutcome::Unavailable;
    };

    let now = Utc::now();
    let Some(reason) =
        differ::should_publish(&sample, &state.meta, &state.published, now, &config.policy)
    else {
        return CycleOutcome::Unchanged;
    };

    let anchors = timestamps::anchors(&sample, now);
    let activity = PresenceActivity::build(&state.meta, &sample, anchors, &config.assets);
    if !presence.publish(activity) {
        return CycleOutcome::Offline;
    }

    debug!(
        ?reason,
        position = sample.position,
        duration = sample.duration,
        paused = sample.paused,
        "Published presence"
    );
    state
        .published
        .record(&sample, &state.meta, now, &config.policy);
    CycleOutcome::Published(reason)
}
