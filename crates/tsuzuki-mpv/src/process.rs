use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::MpvError;

/// Per-process IPC address for the player instance identified by `tag`.
///
/// Named pipe on Windows, a socket in the temp dir elsewhere.
pub fn ipc_address(tag: &str) -> String {
    let name = format!("tsuzuki-mpv-{}-{tag}", std::process::id());
    if cfg!(windows) {
        format!(r"\\.\pipe\{name}")
    } else {
        std::env::temp_dir()
            .join(format!("{name}.sock"))
            .to_string_lossy()
            .into_owned()
    }
}

/// How to launch the player.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: String,
    pub extra_args: Vec<String>,
    pub media_title: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: "mpv".into(),
            extra_args: Vec::new(),
            media_title: None,
        }
    }
}

impl LaunchOptions {
    fn args(&self, target: &str, ipc_address: &str) -> Vec<String> {
        let mut args = vec![format!("--input-ipc-server={ipc_address}")];
        if let Some(title) = &self.media_title {
            args.push(format!("--force-media-title={title}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("--".into());
        args.push(target.into());
        args
    }
}

/// A running mpv instance reachable at `ipc_address`.
#[derive(Debug)]
pub struct MpvProcess {
    child: Child,
    ipc_address: String,
}

impl MpvProcess {
    /// Launch the player on `target` (a URL or local path).
    pub fn spawn(options: &LaunchOptions, target: &str, ipc_address: &str) -> Result<Self, MpvError> {
        let args = options.args(target, ipc_address);
        debug!(executable = %options.executable, ?args, "Launching player");

        let child = Command::new(&options.executable)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MpvError::Spawn {
                executable: options.executable.clone(),
                source,
            })?;

        info!(media = %target, ipc = %ipc_address, "Player started");
        Ok(Self {
            child,
            ipc_address: ipc_address.to_string(),
        })
    }

    pub fn ipc_address(&self) -> &str {
        &self.ipc_address
    }

    /// Wait for the player to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus, MpvError> {
        Ok(self.child.wait().await?)
    }

    /// Terminate the player and reap it.
    pub async fn kill(&mut self) -> Result<(), MpvError> {
        self.child.kill().await?;
        Ok(())
    }
}

impl Drop for MpvProcess {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.ipc_address);
        }
    }
}
