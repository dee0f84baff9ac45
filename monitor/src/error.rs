//! Error taxonomy for the monitor.
//!
//! Only [`MonitorError::Transport`] is treated as a liveness signal by the
//! poll engine. Every other class is logged and skipped for the metric it
//! affected.

use thiserror::Error;

/// Failure while talking to a remote HTTP endpoint (node, reference oracle,
/// service directory).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The TCP connection could not be established (refused, unreachable).
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// The remote answered with a status other than 200.
    #[error("status code {status} different from 200: {body}")]
    Status { status: u16, body: String },
    /// Any other request/response failure (body read, redirect, builder).
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

impl TransportError {
    /// Classifies a `reqwest` error raised while calling `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                reason: err.to_string(),
            }
        } else {
            Self::Request {
                url,
                reason: err.to_string(),
            }
        }
    }
}

/// A value returned by a remote endpoint could not be decoded.
#[derive(Debug, Error)]
#[error("failed to decode {field}: {reason} (literal: {literal:?})")]
pub struct DecodeError {
    /// Name of the field or envelope part being decoded.
    pub field: String,
    /// The offending input, kept for diagnostics.
    pub literal: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(
        field: impl Into<String>,
        literal: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            literal: literal.into(),
            reason: reason.into(),
        }
    }

    /// A required field was absent from the response.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "", "field not found")
    }
}

/// Top-level error type for the monitor crate.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The node answered with a JSON-RPC `error` object.
    #[error("node returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node reported a chain with no known reference oracle.
    #[error("chain {chain:?} not found, supported chains are: {supported}")]
    UnsupportedChain { chain: String, supported: String },

    #[error("service registration failed: {0}")]
    Registration(String),
}

impl MonitorError {
    /// Returns `true` if this error suggests the node itself went away.
    pub fn is_transport(&self) -> bool {
        matches!(self, MonitorError::Transport(_))
    }
}
