//! Client-side orchestration for the QR access-control backend.
//!
//! Components, leaf first: [`gateway::RequestGateway`] (all network I/O),
//! [`health::HealthMonitor`], [`catalog::EventCatalog`], [`roster::GuestRoster`],
//! [`selection::SelectionController`], [`status::StatusReporter`] and [`busy::BusyGate`].
//! [`console::AccessConsole`] composes them and is what front ends talk to, either directly or
//! through [`command::ConsoleCommand`].

pub mod busy;
pub mod catalog;
pub mod checkin;
pub mod command;
pub mod console;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod roster;
pub mod selection;
pub mod status;

pub use catalog::EventDraft;
pub use command::{CommandOutcome, ConsoleCommand};
pub use console::{AccessConsole, Capabilities, ConsoleConfig, ConsoleSnapshot};
pub use error::{Capability, ConsoleError, FailureKind};
pub use events::ConsoleEvent;
pub use gateway::UploadFile;
pub use health::HealthStatus;
pub use roster::{GuestDraft, RosterSnapshot};
pub use status::{Operation, OperationResult, Outcome};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
