//! Guests of the selected event, plus the new-guest draft and the staged import file.
//!
//! The roster never fabricates a guest record: every mutation is followed by a reload, and only
//! what the server returns is shown. Reloads are tagged with the event they were issued for and a
//! response is dropped when the selection has moved on in the meantime.

use std::sync::Arc;

use shared::{
    domain::{EventId, GuestId},
    protocol::{CreateGuestRequest, Event, Guest},
};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{ConsoleError, Result},
    events::ConsoleEvent,
    gateway::{CallOptions, RequestGateway, UploadFile, GUESTS_ENDPOINT, GUEST_IMPORT_ENDPOINT},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestDraft {
    pub name: String,
    pub email: String,
}

impl GuestDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The displayed guest list and the event it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub event_id: Option<EventId>,
    pub guests: Vec<Guest>,
}

pub struct GuestRoster {
    gateway: Arc<RequestGateway>,
    selection: watch::Receiver<Option<Event>>,
    snapshot: RwLock<RosterSnapshot>,
    draft: RwLock<GuestDraft>,
    staged: RwLock<Option<UploadFile>>,
    publisher: broadcast::Sender<ConsoleEvent>,
}

impl GuestRoster {
    pub(crate) fn new(
        gateway: Arc<RequestGateway>,
        selection: watch::Receiver<Option<Event>>,
        publisher: broadcast::Sender<ConsoleEvent>,
    ) -> Self {
        Self {
            gateway,
            selection,
            snapshot: RwLock::new(RosterSnapshot::default()),
            draft: RwLock::new(GuestDraft::default()),
            staged: RwLock::new(None),
            publisher,
        }
    }

    fn selected_id(&self) -> Option<EventId> {
        self.selection.borrow().as_ref().map(|event| event.id)
    }

    /// Empties the roster for a freshly selected event so the previous event's guests are never
    /// shown as current while the reload is in flight.
    pub(crate) async fn invalidate(&self, event_id: EventId) {
        let mut snapshot = self.snapshot.write().await;
        if self.selected_id() != Some(event_id) {
            return;
        }
        *snapshot = RosterSnapshot {
            event_id: Some(event_id),
            guests: Vec::new(),
        };
        let _ = self.publisher.send(ConsoleEvent::RosterReplaced {
            event_id,
            guests: Vec::new(),
        });
    }

    /// Fetches the guests of `event_id`. The server does the filtering.
    pub async fn reload(&self, event_id: EventId) -> Result<Vec<Guest>> {
        let guests: Vec<Guest> = self
            .gateway
            .call(
                GUESTS_ENDPOINT,
                CallOptions::get().query("event_id", event_id),
            )
            .await?;

        let mut snapshot = self.snapshot.write().await;
        match self.selected_id() {
            Some(selected) if selected == event_id => {
                debug!(%event_id, count = guests.len(), "roster reloaded");
                *snapshot = RosterSnapshot {
                    event_id: Some(event_id),
                    guests: guests.clone(),
                };
                let _ = self.publisher.send(ConsoleEvent::RosterReplaced {
                    event_id,
                    guests: guests.clone(),
                });
            }
            selected => {
                warn!(
                    %event_id,
                    selected = ?selected,
                    "discarding roster reload for an event that is no longer selected"
                );
            }
        }

        Ok(guests)
    }

    /// Registers a guest under `event_id`, reloads the roster, then clears the draft.
    pub async fn create_guest(&self, name: &str, email: &str, event_id: EventId) -> Result<Guest> {
        let request = CreateGuestRequest {
            name: name.to_string(),
            email: email.to_string(),
            event_id,
        };
        let guest: Guest = self
            .gateway
            .call(GUESTS_ENDPOINT, CallOptions::post().json(&request)?)
            .await?;
        info!(%event_id, guest_id = %guest.id, "guest created");

        self.reload(event_id).await?;
        *self.draft.write().await = GuestDraft::default();
        Ok(guest)
    }

    /// Uploads the staged file as a batch for `event_id`. The staged file is cleared only once the
    /// server accepts it, so a failed upload can be retried as is. A file staged while the upload
    /// was in flight is kept.
    pub async fn import_guests(&self, event_id: EventId) -> Result<Vec<Guest>> {
        let file = self
            .staged
            .read()
            .await
            .clone()
            .ok_or_else(|| ConsoleError::validation("no import file staged"))?;
        let filename = file.filename.clone();

        let created: Vec<Guest> = self
            .gateway
            .call(
                GUEST_IMPORT_ENDPOINT,
                CallOptions::post()
                    .query("event_id", event_id)
                    .file(file.clone()),
            )
            .await?;
        info!(%event_id, %filename, count = created.len(), "guest batch imported");

        {
            let mut staged = self.staged.write().await;
            if staged.as_ref() == Some(&file) {
                *staged = None;
            } else {
                debug!(%filename, "import file was restaged during upload; keeping it");
            }
        }
        self.reload(event_id).await?;
        Ok(created)
    }

    /// Asks the server to e-mail the guest's credential again. The guest record is unchanged, so
    /// no reload follows.
    pub async fn resend_credential(&self, guest_id: GuestId) -> Result<()> {
        self.gateway
            .call_unit(
                &format!("{GUESTS_ENDPOINT}{guest_id}/resend"),
                CallOptions::post(),
            )
            .await?;
        info!(%guest_id, "credential resent");
        Ok(())
    }

    pub fn qr_url(&self, guest_id: GuestId) -> Result<Url> {
        self.gateway.endpoint(&qr_endpoint(guest_id))
    }

    /// Rendered QR image bytes; the content is not inspected.
    pub async fn fetch_qr(&self, guest_id: GuestId) -> Result<Vec<u8>> {
        self.gateway
            .call_bytes(&qr_endpoint(guest_id), CallOptions::get())
            .await
    }

    pub async fn snapshot(&self) -> RosterSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn draft(&self) -> GuestDraft {
        self.draft.read().await.clone()
    }

    pub async fn set_draft(&self, draft: GuestDraft) {
        *self.draft.write().await = draft;
    }

    pub async fn stage_file(&self, file: UploadFile) {
        debug!(filename = %file.filename, bytes = file.contents.len(), "import file staged");
        *self.staged.write().await = Some(file);
    }

    pub async fn clear_staged(&self) {
        *self.staged.write().await = None;
    }

    pub async fn staged(&self) -> Option<UploadFile> {
        self.staged.read().await.clone()
    }
}

fn qr_endpoint(guest_id: GuestId) -> String {
    format!("{GUESTS_ENDPOINT}qr/{guest_id}.png")
}
