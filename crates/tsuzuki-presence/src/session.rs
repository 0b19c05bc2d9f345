//! Presence service session.
//!
//! Runs a [`PresenceClient`] on a dedicated OS thread (the Discord IPC is
//! blocking) and exposes a cloneable, async-friendly [`PresenceSession`]
//! handle over an MPSC channel. The actor exits once every handle is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::activity::PresenceActivity;
use crate::error::PresenceError;

/// Transport to a presence service.
pub trait PresenceClient: Send + 'static {
    fn connect(&mut self) -> Result<(), PresenceError>;
    fn set_activity(&mut self, activity: &PresenceActivity) -> Result<(), PresenceError>;
    fn clear_activity(&mut self) -> Result<(), PresenceError>;
    fn close(&mut self) -> Result<(), PresenceError>;
}

/// Commands sent to the presence actor thread.
enum PresenceCommand {
    Login {
        reply: oneshot::Sender<Result<(), PresenceError>>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    Publish(Box<PresenceActivity>),
    Clear,
}

/// Cloneable handle to the presence actor thread.
///
/// Publishing only works between a successful [`login`](Self::login) and the
/// matching [`logout`](Self::logout); outside that window it is a silent
/// no-op, so a missing or crashed presence service never affects playback.
#[derive(Clone)]
pub struct PresenceSession {
    tx: mpsc::Sender<PresenceCommand>,
    connected: Arc<AtomicBool>,
}

impl PresenceSession {
    /// Spawn the actor thread around `client`.
    pub fn spawn<C: PresenceClient>(client: C) -> Result<Self, PresenceError> {
        let (tx, rx) = mpsc::channel();
        let connected = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&connected);
        std::thread::Builder::new()
            .name("presence".into())
            .spawn(move || actor_loop(client, rx, flag))?;

        Ok(Self { tx, connected })
    }

    /// Connect to the presence service. No-op when already logged in.
    pub async fn login(&self) -> Result<(), PresenceError> {
        if self.is_logged_in() {
            return Ok(());
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PresenceCommand::Login { reply })
            .map_err(|_| PresenceError::Closed)?;
        rx.await.unwrap_or(Err(PresenceError::Closed))
    }

    /// Clear the activity and disconnect. No-op when not logged in.
    pub async fn logout(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(PresenceCommand::Logout { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Queue an activity update without waiting for it.
    ///
    /// Returns `false` when the session is not logged in and nothing was sent.
    pub fn publish(&self, activity: PresenceActivity) -> bool {
        if !self.is_logged_in() {
            debug!("Presence offline, skipping publish");
            return false;
        }
        self.tx
            .send(PresenceCommand::Publish(Box::new(activity)))
            .is_ok()
    }

    /// Remove the activity (nothing playing) while staying logged in.
    pub fn clear(&self) {
        if self.is_logged_in() {
            let _ = self.tx.send(PresenceCommand::Clear);
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PresenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSession")
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}

/// The actor loop: owns the client and processes commands.
fn actor_loop<C: PresenceClient>(
    mut client: C,
    rx: mpsc::Receiver<PresenceCommand>,
    connected: Arc<AtomicBool>,
) {
    let set_connected = |value: bool| connected.store(value, Ordering::Release);

    for cmd in rx {
        let is_connected = connected.load(Ordering::Acquire);
        match cmd {
            PresenceCommand::Login { reply } => {
                let result = if is_connected {
                    Ok(())
                } else {
                    client.connect().map(|()| {
                        set_connected(true);
                        info!("Presence connected");
                    })
                };
                if let Err(e) = &result {
                    debug!(error = %e, "Presence login failed");
                }
                let _ = reply.send(result);
            }
            PresenceCommand::Logout { reply } => {
                if is_connected {
                    let _ = client.clear_activity();
                    let _ = client.close();
                    set_connected(false);
                    info!("Presence disconnected");
                }
                let _ = reply.send(());
            }
            PresenceCommand::Publish(activity) => {
                if !is_connected {
                    continue;
                }
                if let Err(e) = client.set_activity(&activity) {
                    // Connection probably died; stay quiet until the next login.
                    debug!(error = %e, "Failed to publish activity, disabling presence");
                    let _ = client.close();
                    set_connected(false);
                }
            }
            PresenceCommand::Clear => {
                if is_connected {
                    if let Err(e) = client.clear_activity() {
                        debug!(error = %e, "Failed to clear activity");
                    }
                }
            }
        }
    }

    if connected.load(Ordering::Acquire) {
        let _ = client.clear_activity();
        let _ = client.close();
        set_connected(false);
    }
}
