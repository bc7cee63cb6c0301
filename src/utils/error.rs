//! The `error` module defines the error type shared by the broker server and
//! the subscriber client.
//!
//! Every failure the crate surfaces maps onto one `BrokerError` variant.
//! Per-subscriber delivery failures are deliberately absent: they are
//! recovered inside the broker and only logged.

use std::io;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The Unix socket could not be bound.
    #[error("failed to bind broker socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A published value could not be serialized.
    #[error("failed to encode payload for topic '{topic}': {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    /// The topic cannot be written on a single `event:` line.
    #[error("invalid topic {0:?}: topics must not contain line breaks")]
    InvalidTopic(String),

    /// The broker has been stopped.
    #[error("broker is stopped")]
    Stopped,

    /// The server has no subscription route at the requested path.
    #[error("no subscription route at '{path}' (404 Not Found)")]
    RouteNotFound { path: String },

    /// The server answered the subscription request with something else than 200.
    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),

    /// A message payload does not fit the requested type.
    #[error("failed to decode message on topic '{topic}': {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    /// The broker socket could not be reached.
    #[error("failed to dial broker socket {}: {source}", path.display())]
    Dial {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The event stream carried a line longer than the decoder accepts.
    #[error("event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("invalid broker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build subscription request: {0}")]
    Request(#[from] http::Error),
}

impl BrokerError {
    /// Returns true for the terminal error a subscriber gets when the route
    /// prefix does not match.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BrokerError::RouteNotFound { .. } | BrokerError::UnexpectedStatus(StatusCode::NOT_FOUND)
        )
    }
}
