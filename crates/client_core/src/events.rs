//! State transitions published by the console, one variant per owned field.

use shared::{
    domain::EventId,
    protocol::{Event, Guest},
};

use crate::{health::HealthStatus, status::OperationResult};

#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    HealthChanged(HealthStatus),
    EventsReplaced(Vec<Event>),
    SelectionChanged(Option<Event>),
    RosterReplaced {
        event_id: EventId,
        guests: Vec<Guest>,
    },
    StatusReported(OperationResult),
}
