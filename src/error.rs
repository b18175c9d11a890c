use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::hal::bus::RemoteError;

pub type Result<T> = std::result::Result<T, QcError>;

/// Errors surfaced by the quality-control scan procedures
#[derive(Error, Debug)]
pub enum QcError {
    /// A requested channel is outside `[0, channel_count)`
    #[error("channel {channel} out of range (board reports {channel_count} channels)")]
    InvalidChannel { channel: usize, channel_count: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("remote call {peer}::{command} timed out after {timeout:?}")]
    RemoteTimeout {
        peer: String,
        command: String,
        timeout: Duration,
    },

    #[error("remote call {peer}::{command} failed: {message}")]
    RemoteExecution {
        peer: String,
        command: String,
        message: String,
    },

    #[error("no peer registered under '{0}'")]
    UnknownPeer(String),

    #[error("could not decode reply of {command}: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("table schema error: {0}")]
    Schema(String),

    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("column '{column}' of '{path}' is not a data column")]
    NotQueryable { path: String, column: String },

    #[error("no entry '{0}' in container")]
    EntryNotFound(String),

    #[error("cannot open {path:?}: unsupported platform '{platform}'")]
    UnsupportedPlatform { path: PathBuf, platform: String },
}

impl QcError {
    pub(crate) fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }
}

impl From<RemoteError> for QcError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Timeout {
                peer,
                command,
                timeout,
            } => QcError::RemoteTimeout {
                peer,
                command,
                timeout,
            },
            RemoteError::Execution {
                peer,
                command,
                message,
            } => QcError::RemoteExecution {
                peer,
                command,
                message,
            },
            RemoteError::UnknownPeer(peer) => QcError::UnknownPeer(peer),
        }
    }
}
