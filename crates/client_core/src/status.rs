//! Single-slot operation status.

use std::fmt;

use tokio::sync::{broadcast, RwLock};

use crate::{
    error::{ConsoleError, FailureKind},
    events::ConsoleEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadEvents,
    CreateEvent,
    LoadRoster,
    CreateGuest,
    ImportGuests,
    ResendCredential,
    CheckIn,
    FetchQr,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadEvents => "load events",
            Self::CreateEvent => "create event",
            Self::LoadRoster => "load guests",
            Self::CreateGuest => "create guest",
            Self::ImportGuests => "import guests",
            Self::ResendCredential => "resend credential",
            Self::CheckIn => "check in",
            Self::FetchQr => "fetch QR",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub operation: Operation,
    pub outcome: Outcome,
    pub message: String,
}

impl OperationResult {
    pub fn success(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            outcome: Outcome::Success,
            message: message.into(),
        }
    }

    pub fn failure(operation: Operation, error: &ConsoleError) -> Self {
        Self {
            operation,
            outcome: Outcome::Failure(error.kind()),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Success => write!(f, "{}", self.message),
            Outcome::Failure(kind) => {
                write!(f, "{} failed ({kind}): {}", self.operation, self.message)
            }
        }
    }
}

/// Holds the most recent [`OperationResult`]; each report overwrites the last.
pub struct StatusReporter {
    slot: RwLock<Option<OperationResult>>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl StatusReporter {
    pub(crate) fn new(events: broadcast::Sender<ConsoleEvent>) -> Self {
        Self {
            slot: RwLock::new(None),
            events,
        }
    }

    pub async fn report(&self, result: OperationResult) {
        *self.slot.write().await = Some(result.clone());
        let _ = self.events.send(ConsoleEvent::StatusReported(result));
    }

    pub async fn current(&self) -> Option<OperationResult> {
        self.slot.read().await.clone()
    }
}
