//! Crate-wide error type. See spec §7 for the error kind taxonomy this
//! mirrors: `MalformedAddress`, `MalformedRecord`, `MalformedInputStream`,
//! `BackingStoreError`. `NoHit` is deliberately absent here — a miss is
//! represented as `Ok(None)`, never as an `Err`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WhipError {
    #[error("malformed address {input:?}: parses as neither IPv4 nor IPv6")]
    MalformedAddress { input: String },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed input stream: {0}")]
    MalformedInputStream(String),

    #[error("backing store error")]
    BackingStore(#[from] sled::Error),

    #[error("i/o error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("attribute codec error")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WhipError>;

impl WhipError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WhipError::Io { path: path.into(), source }
    }
}
