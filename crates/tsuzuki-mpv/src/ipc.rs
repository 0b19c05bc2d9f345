//! mpv JSON IPC client.
//!
//! Requests are newline-delimited JSON objects carrying a `request_id`; mpv
//! answers on the same socket, interleaving asynchronous `event` lines with
//! replies. Every exchange is bounded by a timeout so a stalled player turns
//! into an error instead of a hang.

use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

use crate::error::IpcError;

type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Playback properties the sampler reads from mpv.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    TimePos,
    Duration,
    Pause,
    Speed,
}

impl Property {
    /// Property name as understood by mpv's `get_property`.
    pub fn name(self) -> &'static str {
        match self {
            Self::TimePos => "time-pos",
            Self::Duration => "duration",
            Self::Pause => "pause",
            Self::Speed => "speed",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reply or event line from mpv.
#[derive(Debug, serde::Deserialize)]
struct Reply {
    #[serde(default)]
    data: Value,
    error: Option<String>,
    request_id: Option<u64>,
    event: Option<String>,
}

struct Connection {
    reader: Reader,
    writer: Writer,
}

impl Connection {
    #[cfg(unix)]
    async fn open(address: &str) -> Result<Self, IpcError> {
        let stream = tokio::net::UnixStream::connect(address)
            .await
            .map_err(|source| IpcError::Connect {
                address: address.to_string(),
                source,
            })?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(Box::new(read)),
            writer: Box::new(write),
        })
    }

    #[cfg(windows)]
    async fn open(address: &str) -> Result<Self, IpcError> {
        let pipe = tokio::net::windows::named_pipe::ClientOptions::new()
            .open(address)
            .map_err(|source| IpcError::Connect {
                address: address.to_string(),
                source,
            })?;
        let (read, write) = tokio::io::split(pipe);
        Ok(Self {
            reader: BufReader::new(Box::new(read)),
            writer: Box::new(write),
        })
    }

    async fn round_trip(&mut self, request: &str, request_id: u64) -> Result<Value, IpcError> {
        self.writer.write_all(request.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(IpcError::Closed);
            }

            let reply: Reply = serde_json::from_str(line.trim())?;
            if let Some(event) = &reply.event {
                trace!(event = %event, "Skipping mpv event");
                continue;
            }
            if reply.request_id != Some(request_id) {
                // Late reply to an earlier request.
                continue;
            }

            return match reply.error.as_deref() {
                None | Some("success") => Ok(reply.data),
                Some(err) => Err(IpcError::Property(err.to_string())),
            };
        }
    }
}

/// Request/reply client for one mpv instance.
///
/// Connects lazily on the first query and drops the connection after any
/// fatal error, so the next query reconnects.
pub struct MpvIpc {
    address: String,
    timeout: Duration,
    connection: Option<Connection>,
    next_request_id: u64,
}

impl MpvIpc {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            connection: None,
            next_request_id: 1,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Read a single property.
    pub async fn query(&mut self, property: Property) -> Result<Value, IpcError> {
        self.command(vec![json!("get_property"), json!(property.name())])
            .await
    }

    /// Run an arbitrary mpv command (e.g. `["quit"]`) and return its `data`.
    pub async fn command(&mut self, args: Vec<Value>) -> Result<Value, IpcError> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut request = json!({ "command": args, "request_id": request_id }).to_string();
        request.push('\n');

        let timeout = self.timeout;
        let result = tokio::time::timeout(timeout, self.round_trip(&request, request_id))
            .await
            .unwrap_or(Err(IpcError::Timeout(timeout)));

        if let Err(e) = &result {
            if e.is_fatal() && self.connection.take().is_some() {
                debug!(address = %self.address, error = %e, "Dropped mpv IPC connection");
            }
        }
        result
    }

    async fn round_trip(&mut self, request: &str, request_id: u64) -> Result<Value, IpcError> {
        if self.connection.is_none() {
            self.connection = Some(Connection::open(&self.address).await?);
            debug!(address = %self.address, "Connected to mpv IPC");
        }
        let connection = self.connection.as_mut().ok_or(IpcError::Closed)?;
        connection.round_trip(request, request_id).await
    }
}

impl fmt::Debug for MpvIpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpvIpc")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    /// Minimal stand-in for mpv: answers `get_property`, emitting an event
    /// line before every reply. When `silent`, requests are read and ignored.
    async fn fake_mpv(listener: UnixListener, silent: bool) {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if silent {
                continue;
            }
            let request: Value = serde_json::from_str(&line).unwrap();
            let id = request["request_id"].clone();
            let reply = match request["command"][1].as_str() {
                Some("time-pos") => json!({ "data": 42.5, "error": "success", "request_id": id }),
                Some("pause") => json!({ "data": true, "error": "success", "request_id": id }),
                _ => json!({ "error": "property unavailable", "request_id": id }),
            };
            let event = json!({ "event": "property-change", "name": "time-pos", "data": 1.0 });
            let out = format!("{event}\n{reply}\n");
            if write.write_all(out.as_bytes()).await.is_err() {
                return;
            }
        }
    }

    fn socket_in(dir: &tempfile::TempDir) -> String {
        dir.path().join("mpv.sock").to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_query_skips_events() {
        let dir = tempfile::tempdir().unwrap();
        let address = socket_in(&dir);
        let listener = UnixListener::bind(&address).unwrap();
        tokio::spawn(fake_mpv(listener, false));

        let mut ipc = MpvIpc::new(address, Duration::from_secs(2));
        let pos = ipc.query(Property::TimePos).await.unwrap();
        assert_eq!(pos.as_f64(), Some(42.5));

        let paused = ipc.query(Property::Pause).await.unwrap();
        assert_eq!(paused.as_bool(), Some(true));
        assert!(ipc.is_connected());
    }

    #[tokio::test]
    async fn test_property_error_keeps_connection() {
        let dir = tempfile::tempdir().unwrap();
        let address = socket_in(&dir);
        let listener = UnixListener::bind(&address).unwrap();
        tokio::spawn(fake_mpv(listener, false));

        let mut ipc = MpvIpc::new(address, Duration::from_secs(2));
        let err = ipc.query(Property::Duration).await.unwrap_err();
        assert!(matches!(err, IpcError::Property(ref msg) if msg == "property unavailable"));
        assert!(ipc.is_connected());
    }

    #[tokio::test]
    async fn test_silent_player_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let address = socket_in(&dir);
        let listener = UnixListener::bind(&address).unwrap();
        tokio::spawn(fake_mpv(listener, true));

        let mut ipc = MpvIpc::new(address, Duration::from_millis(50));
        let err = ipc.query(Property::TimePos).await.unwrap_err();
        assert!(matches!(err, IpcError::Timeout(_)));
        assert!(!ipc.is_connected());
    }

    #[tokio::test]
    async fn test_missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ipc = MpvIpc::new(socket_in(&dir), Duration::from_millis(200));
        let err = ipc.query(Property::TimePos).await.unwrap_err();
        assert!(matches!(err, IpcError::Connect { .. }));
        assert!(err.is_fatal());
    }
}
