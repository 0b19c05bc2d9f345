//! Talking to an external mpv process: launching it, querying its playback
//! properties over the JSON IPC socket, and folding those replies into
//! [`PlaybackSample`]s.

pub mod error;
pub mod ipc;
pub mod process;
pub mod sampler;

pub use error::{IpcError, MpvError};
pub use ipc::{MpvIpc, Property};
pub use process::{ipc_address, LaunchOptions, MpvProcess};
pub use sampler::{PlaybackSample, PlaybackSource, Sampler, MAX_MEDIA_SECS};
