use std::sync::Arc;

use shared::{
    domain::EventId,
    protocol::{Event, Guest},
};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::{error::Result, events::ConsoleEvent, roster::GuestRoster};

/// Sole writer of the selected event. The roster observes the selection through the paired
/// `watch::Receiver` but can never change it.
pub struct SelectionController {
    selected: watch::Sender<Option<Event>>,
    roster: Arc<GuestRoster>,
    publisher: broadcast::Sender<ConsoleEvent>,
}

impl SelectionController {
    pub(crate) fn new(
        selected: watch::Sender<Option<Event>>,
        roster: Arc<GuestRoster>,
        publisher: broadcast::Sender<ConsoleEvent>,
    ) -> Self {
        Self {
            selected,
            roster,
            publisher,
        }
    }

    /// Selects `event` and replaces the roster with that event's guests. Re-selecting the
    /// current event simply reloads it.
    pub async fn select(&self, event: Event) -> Result<Vec<Guest>> {
        let event_id = event.id;
        self.selected.send_replace(Some(event.clone()));
        let _ = self
            .publisher
            .send(ConsoleEvent::SelectionChanged(Some(event)));
        debug!(%event_id, "event selected");

        self.roster.invalidate(event_id).await;
        self.roster.reload(event_id).await
    }

    pub fn selected(&self) -> Option<Event> {
        self.selected.borrow().clone()
    }

    pub fn selected_id(&self) -> Option<EventId> {
        self.selected.borrow().as_ref().map(|event| event.id)
    }
}
