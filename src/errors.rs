use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FreqError>;

#[derive(Error, Debug)]
pub enum FreqError {
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("Invalid descriptor: request and response list are both {0:?}")]
    InvalidDescriptor(PathBuf),
    #[error("[{session}] Request list {path:?} unreadable: {source}")]
    RequestListUnreadable {
        session: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("[{session}] Response list {path:?} not writable: {source}")]
    ResponseWriteFailed {
        session: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Catalog {path:?} unavailable: {reason}")]
    CatalogUnavailable { path: PathBuf, reason: String },
    #[error("[{session}] Request list {path:?} not removed: {source}")]
    FinalizeFailed {
        session: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("[{session}] Packet composition failed: {reason}")]
    PacketComposeFailed { session: String, reason: String },
    #[error("Session already ran up to {0:?}, create a new one")]
    SessionReused(crate::SessionState),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
