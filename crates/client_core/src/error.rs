//! Failure taxonomy for console operations.

use std::fmt;

use thiserror::Error;

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;

/// Coarse class of a failure as surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A local precondition was not met; nothing reached the network.
    Validation,
    /// The request could not complete.
    Network,
    /// The server answered with a non-success status.
    Server,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Server => "server",
        })
    }
}

/// Optional console features; the reduced front end ships without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Import,
    Resend,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "guest import",
            Self::Resend => "credential resend",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Network(#[source] reqwest::Error),
    /// Non-success response; `message` is the raw response body.
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("unexpected response body from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("another operation is still in flight")]
    Busy,
    #[error("{0} is not enabled for this console")]
    Disabled(Capability),
    #[error("invalid base address '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ConsoleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) | Self::Busy | Self::Disabled(_) | Self::InvalidBaseUrl { .. } => {
                FailureKind::Validation
            }
            Self::Network(_) | Self::Decode { .. } => FailureKind::Network,
            Self::Server { .. } => FailureKind::Server,
        }
    }
}
