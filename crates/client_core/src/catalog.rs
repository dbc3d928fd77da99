use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::EventId,
    protocol::{CreateEventRequest, Event},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::{
    error::{ConsoleError, Result},
    events::ConsoleEvent,
    gateway::{CallOptions, RequestGateway, EVENTS_ENDPOINT},
};

/// Unsubmitted "new event" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub date: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
        }
    }
}

/// Owns the event list and the new-event draft.
pub struct EventCatalog {
    gateway: Arc<RequestGateway>,
    events: RwLock<Vec<Event>>,
    draft: RwLock<EventDraft>,
    publisher: broadcast::Sender<ConsoleEvent>,
}

impl EventCatalog {
    pub(crate) fn new(
        gateway: Arc<RequestGateway>,
        publisher: broadcast::Sender<ConsoleEvent>,
    ) -> Self {
        Self {
            gateway,
            events: RwLock::new(Vec::new()),
            draft: RwLock::new(EventDraft::default()),
            publisher,
        }
    }

    /// Trimmed event name, or a validation failure when nothing is left.
    pub fn validate_name(name: &str) -> Result<&str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConsoleError::validation("event name is required"));
        }
        Ok(name)
    }

    /// Replaces the list with the server's, in the server's order.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let events: Vec<Event> = self
            .gateway
            .call(EVENTS_ENDPOINT, CallOptions::get())
            .await?;
        debug!(count = events.len(), "event list reloaded");

        *self.events.write().await = events.clone();
        let _ = self
            .publisher
            .send(ConsoleEvent::EventsReplaced(events.clone()));
        Ok(events)
    }

    /// Creates the event, clears the draft, then reloads the list. A failure at any step leaves
    /// the current list in place.
    pub async fn create_event(&self, name: &str, date: Option<DateTime<Utc>>) -> Result<Event> {
        let name = Self::validate_name(name)?;
        let request = CreateEventRequest {
            name: name.to_string(),
            date,
        };
        let event: Event = self
            .gateway
            .call(EVENTS_ENDPOINT, CallOptions::post().json(&request)?)
            .await?;
        info!(event_id = %event.id, name = %event.name, "event created");

        *self.draft.write().await = EventDraft::default();
        self.list_events().await?;
        Ok(event)
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    pub async fn find(&self, event_id: EventId) -> Option<Event> {
        self.events
            .read()
            .await
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
    }

    pub async fn draft(&self) -> EventDraft {
        self.draft.read().await.clone()
    }

    pub async fn set_draft(&self, draft: EventDraft) {
        *self.draft.write().await = draft;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_fail_validation() {
        assert!(matches!(
            EventCatalog::validate_name(""),
            Err(ConsoleError::Validation(_))
        ));
        assert!(matches!(
            EventCatalog::validate_name("   "),
            Err(ConsoleError::Validation(_))
        ));
        assert_eq!(
            EventCatalog::validate_name("  Launch Party ").expect("valid"),
            "Launch Party"
        );
    }
}
