//! Playback controller: one mpv process and one presence sync per episode.

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use tsuzuki_core::config::AppConfig;
use tsuzuki_core::models::{EpisodeMeta, LinkButton};
use tsuzuki_mpv::{ipc_address, LaunchOptions, MpvError, MpvIpc, MpvProcess};
use tsuzuki_presence::{PresenceSession, SyncConfig, SyncSession};

/// How long a quit request gets before the player is killed.
const QUIT_GRACE: Duration = Duration::from_secs(3);

/// Everything `tsuzuki play` was asked to do.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub targets: Vec<String>,
    pub title: Option<String>,
    /// Label of the first target; numeric labels count up per target.
    pub first_episode: String,
    pub artwork_url: Option<String>,
    pub duration_hint: u64,
    pub links: Vec<LinkButton>,
}

impl Playlist {
    fn meta(&self, index: usize) -> EpisodeMeta {
        let target = &self.targets[index];
        let title = self
            .title
            .clone()
            .unwrap_or_else(|| title_from_target(target));

        let mut meta = EpisodeMeta::new(title, episode_label(&self.first_episode, index))
            .with_duration_hint(self.duration_hint)
            .with_links(self.links.iter().cloned());
        if let Some(url) = &self.artwork_url {
            meta = meta.with_artwork(url);
        }
        meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Exited,
    Interrupted,
}

/// Play every target in order, mirroring each into presence.
pub async fn run(config: &AppConfig, playlist: &Playlist, presence: bool) -> Result<(), MpvError> {
    let presence = if presence && config.presence.enabled {
        connect_presence(&config.presence.application_id)
    } else {
        info!("Presence disabled");
        None
    };

    let mut result = Ok(());
    for index in 0..playlist.targets.len() {
        match play_episode(config, playlist, index, presence.as_ref()).await {
            Ok(Finish::Exited) => {}
            Ok(Finish::Interrupted) => {
                info!("Interrupted, stopping playlist");
                break;
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    if let Some(presence) = presence {
        presence.logout().await;
    }
    result
}

fn connect_presence(application_id: &str) -> Option<PresenceSession> {
    match PresenceSession::discord(application_id) {
        Ok(presence) => Some(presence),
        Err(e) => {
            warn!(error = %e, "Failed to start presence session");
            None
        }
    }
}

/// Log in before each episode, so Discord starting late (or a dropped
/// connection) only costs the episodes already played.
async fn ensure_login(presence: &PresenceSession) -> bool {
    match presence.login().await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Discord unavailable, playing without presence");
            false
        }
    }
}

async fn play_episode(
    config: &AppConfig,
    playlist: &Playlist,
    index: usize,
    presence: Option<&PresenceSession>,
) -> Result<Finish, MpvError> {
    let target = &playlist.targets[index];
    let meta = playlist.meta(index);
    info!(title = %meta.title, episode = %meta.episode_label, "Playing");

    let options = LaunchOptions {
        executable: config.player.executable.clone(),
        extra_args: config.player.extra_args.clone(),
        media_title: Some(format!("{} - {}", meta.title, meta.state_text())),
    };
    let address = ipc_address(&index.to_string());
    let mut player = MpvProcess::spawn(&options, target, &address)?;
    let ipc = MpvIpc::new(address, config.player.ipc_timeout());

    let Some(presence) = presence else {
        return Ok(wait_or_quit(&mut player, ipc).await);
    };

    ensure_login(presence).await;
    let sync = SyncSession::new(
        ipc,
        meta,
        presence.clone(),
        SyncConfig::from_config(&config.presence),
    );
    sync.start();

    let finish = tokio::select! {
        status = player.wait() => {
            log_exit(status);
            Finish::Exited
        }
        _ = tokio::signal::ctrl_c() => {
            let mut ipc = sync.lock_source().await;
            quit(&mut player, &mut ipc).await;
            Finish::Interrupted
        }
    };

    sync.stop().await;
    presence.clear();
    Ok(finish)
}

async fn wait_or_quit(player: &mut MpvProcess, mut ipc: MpvIpc) -> Finish {
    tokio::select! {
        status = player.wait() => {
            log_exit(status);
            Finish::Exited
        }
        _ = tokio::signal::ctrl_c() => {
            quit(player, &mut ipc).await;
            Finish::Interrupted
        }
    }
}

/// Ask the player to quit, killing it if it does not exit in time.
async fn quit(player: &mut MpvProcess, ipc: &mut MpvIpc) {
    // mpv may close the socket before replying.
    if let Err(e) = ipc.command(vec![json!("quit")]).await {
        debug!(error = %e, "Quit command got no reply");
    }

    match tokio::time::timeout(QUIT_GRACE, player.wait()).await {
        Ok(status) => log_exit(status),
        Err(_) => {
            warn!("Player ignored quit, killing it");
            if let Err(e) = player.kill().await {
                warn!(error = %e, "Failed to kill player");
            }
        }
    }
}

fn log_exit(status: Result<std::process::ExitStatus, MpvError>) {
    match status {
        Ok(status) => info!(%status, "Player exited"),
        Err(e) => warn!(error = %e, "Failed to wait for player"),
    }
}

/// `"5"` at index 2 is `"7"`; non-numeric labels repeat as given.
fn episode_label(first: &str, index: usize) -> String {
    match first.trim().parse::<u64>() {
        Ok(n) => (n + index as u64).to_string(),
        Err(_) => first.to_string(),
    }
}

/// Best-effort title from a path or URL: the file stem, else the target itself.
fn title_from_target(target: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    Path::new(target)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tsuzuki_presence::{PresenceActivity, PresenceClient, PresenceError};

    use super::*;

    /// Discord that only comes up on the second attempt.
    struct LateDiscord {
        attempts: Arc<AtomicUsize>,
    }

    impl PresenceClient for LateDiscord {
        fn connect(&mut self) -> Result<(), PresenceError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(PresenceError::Connect("Discord not running".into()));
            }
            Ok(())
        }

        fn set_activity(&mut self, _: &PresenceActivity) -> Result<(), PresenceError> {
            Ok(())
        }

        fn clear_activity(&mut self) -> Result<(), PresenceError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), PresenceError> {
            Ok(())
        }
    }

    fn playlist(targets: &[&str]) -> Playlist {
        Playlist {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            title: None,
            first_episode: "1".into(),
            artwork_url: None,
            duration_hint: 0,
            links: Vec::new(),
        }
    }

    #[test]
    fn test_numeric_labels_count_up() {
        assert_eq!(episode_label("5", 0), "5");
        assert_eq!(episode_label("5", 2), "7");
        assert_eq!(episode_label(" 12 ", 1), "13");
    }

    #[test]
    fn test_other_labels_repeat() {
        assert_eq!(episode_label("OVA", 3), "OVA");
        assert_eq!(episode_label("12.5", 1), "12.5");
        assert_eq!(episode_label("", 1), "");
    }

    #[test]
    fn test_title_from_target() {
        assert_eq!(
            title_from_target("/media/anime/Frieren - 05.mkv"),
            "Frieren - 05"
        );
        assert_eq!(
            title_from_target("https://example.org/stream.m3u8"),
            "https://example.org/stream.m3u8"
        );
    }

    #[test]
    fn test_meta_per_target() {
        let mut playlist = playlist(&["ep5.mkv", "ep6.mkv"]);
        playlist.title = Some("Sousou no Frieren".into());
        playlist.first_episode = "5".into();
        playlist.duration_hint = 1440;
        playlist.artwork_url = Some("https://img.example/frieren.jpg".into());

        let second = playlist.meta(1);
        assert_eq!(second.title, "Sousou no Frieren");
        assert_eq!(second.episode_label, "6");
        assert_eq!(second.duration_hint, 1440);
        assert_eq!(
            second.artwork_url.as_deref(),
            Some("https://img.example/frieren.jpg")
        );
    }

    #[test]
    fn test_meta_title_falls_back_to_file_name() {
        let meta = playlist(&["/tmp/Frieren 01.mkv"]).meta(0);
        assert_eq!(meta.title, "Frieren 01");
        assert_eq!(meta.artwork_url, None);
    }

    #[tokio::test]
    async fn test_login_retried_for_next_episode() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let presence = PresenceSession::spawn(LateDiscord {
            attempts: Arc::clone(&attempts),
        })
        .unwrap();

        assert!(!ensure_login(&presence).await);
        assert!(ensure_login(&presence).await);
        assert!(ensure_login(&presence).await);
        assert!(presence.is_logged_in());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        presence.logout().await;
    }
}
