//! Discord Rich Presence transport.

use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};
use tracing::info;

use crate::activity::PresenceActivity;
use crate::error::PresenceError;
use crate::session::{PresenceClient, PresenceSession};

/// [`PresenceClient`] backed by the local Discord IPC socket.
pub struct DiscordClient {
    application_id: String,
    ipc: Option<DiscordIpcClient>,
}

impl DiscordClient {
    /// `application_id` identifies the app in Discord's developer portal and
    /// controls the activity name ("Watching tsuzuki").
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            ipc: None,
        }
    }

    fn ipc(&mut self) -> Result<&mut DiscordIpcClient, PresenceError> {
        self.ipc.as_mut().ok_or(PresenceError::NotConnected)
    }
}

impl PresenceClient for DiscordClient {
    fn connect(&mut self) -> Result<(), PresenceError> {
        let mut ipc = DiscordIpcClient::new(&self.application_id);
        ipc.connect()
            .map_err(|e| PresenceError::Connect(e.to_string()))?;
        info!("Connected to Discord IPC");
        self.ipc = Some(ipc);
        Ok(())
    }

    fn set_activity(&mut self, presence: &PresenceActivity) -> Result<(), PresenceError> {
        let mut timestamps = activity::Timestamps::new().start(presence.start.timestamp());
        if let Some(end) = presence.end {
            timestamps = timestamps.end(end.timestamp());
        }

        let mut assets = activity::Assets::new()
            .large_image(&presence.large_image)
            .large_text(&presence.large_text);
        if let Some(image) = &presence.small_image {
            assets = assets.small_image(image);
        }
        if let Some(text) = &presence.small_text {
            assets = assets.small_text(text);
        }

        let mut payload = activity::Activity::new()
            .activity_type(activity::ActivityType::Watching)
            .details(&presence.title)
            .state(&presence.state)
            .timestamps(timestamps)
            .assets(assets);

        if !presence.buttons.is_empty() {
            let buttons: Vec<activity::Button> = presence
                .buttons
                .iter()
                .map(|b| activity::Button::new(&b.label, &b.url))
                .collect();
            payload = payload.buttons(buttons);
        }

        self.ipc()?
            .set_activity(payload)
            .map_err(|e| PresenceError::Publish(e.to_string()))
    }

    fn clear_activity(&mut self) -> Result<(), PresenceError> {
        self.ipc()?
            .clear_activity()
            .map_err(|e| PresenceError::Publish(e.to_string()))
    }

    fn close(&mut self) -> Result<(), PresenceError> {
        match self.ipc.take() {
            Some(mut ipc) => ipc
                .close()
                .map_err(|e| PresenceError::Publish(e.to_string())),
            None => Ok(()),
        }
    }
}

impl PresenceSession {
    /// Presence session publishing to Discord as `application_id`.
    pub fn discord(application_id: impl Into<String>) -> Result<Self, PresenceError> {
        Self::spawn(DiscordClient::new(application_id))
    }
}
