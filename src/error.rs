//! Crate-wide error type.

use thiserror::Error;

use crate::protocol::ProtocolErrorCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while the coordinator is running.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid seed list {seeds:?}: {reason}")]
    InvalidSeeds { seeds: String, reason: String },

    #[error("node factory failed to create a connection to {host}:{port}: {source}")]
    NodeFactory {
        host: String,
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("request to broker failed: {0}")]
    Request(#[from] RequestError),

    #[error("server returned protocol error {code:?} for {request}")]
    ServerError {
        code: ProtocolErrorCode,
        request: String,
    },

    #[error("the coordinator has been stopped")]
    Stopped,

    #[error("request was cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }
}

/// Errors surfaced by a [`crate::node::Node`] while servicing a request.
///
/// This mirrors the kinds of failure a real wire connection can report: a
/// broken transport, a decode failure, or the broker rejecting the
/// request outright.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("transport read error: {0}")]
    Read(String),

    #[error("transport write error: {0}")]
    Write(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request was cancelled")]
    Cancelled,
}
