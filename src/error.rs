//! Error types shared by every part of the engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong inside the playback engine.
///
/// All variants are recoverable: the engine stays usable after any of them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The byte-retrieval collaborator could not produce the file.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bytes were read but are corrupt or in an unsupported format.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The render backend rejected a start request twice in a row.
    #[error("render node refused to start: {0}")]
    RenderStart(String),

    /// The operation needs a loaded track.
    #[error("no track loaded")]
    NoTrack,

    #[error("equalizer band {0} out of range")]
    InvalidBand(usize),

    #[error("expected {expected} equalizer gains, got {got}")]
    GainCount { expected: usize, got: usize },

    #[error("unknown equalizer preset `{0}`")]
    UnknownPreset(String),

    /// The default output device could not be opened.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// A worker or control thread could not be started.
    #[error("failed to start {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The control thread has shut down.
    #[error("audio engine thread has shut down")]
    Disconnected,

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
