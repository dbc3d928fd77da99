//! The console state container.
//!
//! [`AccessConsole`] owns one instance of every component and is the only place where UI
//! actions are turned into gated, reported operations. Each field has exactly one writer:
//! the catalog writes the event list, the selection controller the selected event, the roster
//! the guest list, the reporter the status slot.

use std::sync::Arc;

use shared::{
    domain::{CheckinStatus, EventId, GuestId},
    protocol::{CheckinReceipt, Event, Guest},
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use url::Url;

use crate::{
    busy::{BusyGate, BusyGuard},
    catalog::{EventCatalog, EventDraft},
    checkin::CheckinDesk,
    error::{Capability, ConsoleError, Result},
    events::ConsoleEvent,
    gateway::{RequestGateway, UploadFile},
    health::{HealthMonitor, HealthStatus},
    roster::{GuestDraft, GuestRoster, RosterSnapshot},
    selection::SelectionController,
    status::{Operation, OperationResult, StatusReporter},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Optional features of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub import: bool,
    pub resend: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        import: true,
        resend: true,
    };
    pub const BASIC: Self = Self {
        import: false,
        resend: false,
    };

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Import => self.import,
            Capability::Resend => self.resend,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub capabilities: Capabilities,
}

/// Everything a front end needs to render the console.
#[derive(Debug, Clone)]
pub struct ConsoleSnapshot {
    pub health: HealthStatus,
    pub events: Vec<Event>,
    pub event_draft: EventDraft,
    pub selected_event: Option<Event>,
    pub roster: RosterSnapshot,
    pub guest_draft: GuestDraft,
    pub staged_import: Option<String>,
    pub busy: bool,
    pub status: Option<OperationResult>,
}

pub struct AccessConsole {
    capabilities: Capabilities,
    health: HealthMonitor,
    catalog: EventCatalog,
    roster: Arc<GuestRoster>,
    selection: SelectionController,
    checkin: CheckinDesk,
    status: StatusReporter,
    busy: BusyGate,
    events: broadcast::Sender<ConsoleEvent>,
}

impl AccessConsole {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let gateway = Arc::new(RequestGateway::new(&config.base_url)?);
        Ok(Self::with_gateway(gateway, config.capabilities))
    }

    pub fn with_gateway(gateway: Arc<RequestGateway>, capabilities: Capabilities) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (selected_tx, selected_rx) = watch::channel(None);
        let roster = Arc::new(GuestRoster::new(
            Arc::clone(&gateway),
            selected_rx,
            events.clone(),
        ));

        Self {
            capabilities,
            health: HealthMonitor::new(Arc::clone(&gateway), events.clone()),
            catalog: EventCatalog::new(Arc::clone(&gateway), events.clone()),
            selection: SelectionController::new(selected_tx, Arc::clone(&roster), events.clone()),
            roster,
            checkin: CheckinDesk::new(gateway),
            status: StatusReporter::new(events.clone()),
            busy: BusyGate::default(),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    /// Startup sequence: one health probe, then one event-list load.
    pub async fn start(&self) {
        self.check_health().await;
        let _ = self.refresh_events().await;
    }

    pub async fn check_health(&self) -> HealthStatus {
        self.health.check_health().await
    }

    pub async fn refresh_events(&self) -> Result<Vec<Event>> {
        let result = self.catalog.list_events().await;
        if let Err(err) = &result {
            self.report_failure(Operation::LoadEvents, err).await;
        }
        result
    }

    pub async fn set_event_draft(&self, draft: EventDraft) {
        self.catalog.set_draft(draft).await;
    }

    /// Submits the event draft. A blank name is a silent no-op. The new event is not selected.
    pub async fn create_event(&self) -> Result<Event> {
        let draft = self.catalog.draft().await;
        let name = EventCatalog::validate_name(&draft.name)?;
        let _guard = self.acquire(Operation::CreateEvent)?;

        let result = self.catalog.create_event(name, draft.date).await;
        self.settle(Operation::CreateEvent, result, |event| {
            format!("Event created: {} (#{})", event.name, event.id)
        })
        .await
    }

    pub async fn select_event(&self, event: Event) -> Result<Vec<Guest>> {
        let result = self.selection.select(event).await;
        if let Err(err) = &result {
            self.report_failure(Operation::LoadRoster, err).await;
        }
        result
    }

    /// Selects an event from the currently loaded list.
    pub async fn select_event_by_id(&self, event_id: EventId) -> Result<Vec<Guest>> {
        match self.catalog.find(event_id).await {
            Some(event) => self.select_event(event).await,
            None => {
                let err = ConsoleError::validation(format!(
                    "event #{event_id} is not in the event list"
                ));
                self.report_failure(Operation::LoadRoster, &err).await;
                Err(err)
            }
        }
    }

    /// Re-fetches the selected event's roster.
    pub async fn reload_roster(&self) -> Result<Vec<Guest>> {
        let event_id = self.require_selection(Operation::LoadRoster).await?;
        let result = self.roster.reload(event_id).await;
        if let Err(err) = &result {
            self.report_failure(Operation::LoadRoster, err).await;
        }
        result
    }

    pub async fn set_guest_draft(&self, draft: GuestDraft) {
        self.roster.set_draft(draft).await;
    }

    /// Registers the guest draft under the selected event.
    pub async fn create_guest(&self) -> Result<Guest> {
        let event_id = self.require_selection(Operation::CreateGuest).await?;
        let _guard = self.acquire(Operation::CreateGuest)?;

        let draft = self.roster.draft().await;
        let result = self
            .roster
            .create_guest(&draft.name, &draft.email, event_id)
            .await;
        self.settle(Operation::CreateGuest, result, |guest| {
            format!("Guest created (id {})", guest.id)
        })
        .await
    }

    pub async fn stage_import(&self, file: UploadFile) {
        self.roster.stage_file(file).await;
    }

    pub async fn clear_import(&self) {
        self.roster.clear_staged().await;
    }

    /// Uploads the staged file for the selected event. Without a staged file this is a no-op.
    pub async fn import_guests(&self) -> Result<Vec<Guest>> {
        self.require(Capability::Import)?;
        let event_id = self.require_selection(Operation::ImportGuests).await?;
        if self.roster.staged().await.is_none() {
            return Err(ConsoleError::validation("no import file staged"));
        }
        let _guard = self.acquire(Operation::ImportGuests)?;

        let result = self.roster.import_guests(event_id).await;
        self.settle(Operation::ImportGuests, result, |created| {
            format!("Imported {} guest(s)", created.len())
        })
        .await
    }

    pub async fn resend_credential(&self, guest_id: GuestId) -> Result<()> {
        self.require(Capability::Resend)?;
        self.require_selection(Operation::ResendCredential).await?;
        let _guard = self.acquire(Operation::ResendCredential)?;

        let result = self.roster.resend_credential(guest_id).await;
        self.settle(Operation::ResendCredential, result, |_| {
            format!("Credential resent to guest {guest_id}")
        })
        .await
    }

    /// Checks a credential token in. When the guest belongs to the selected event the roster is
    /// reloaded so the check-in time shown is the server's. The check-in stands even if that
    /// reload fails; the reload failure is reported on its own.
    pub async fn check_in(&self, token: &str) -> Result<CheckinReceipt> {
        let token = CheckinDesk::validate_token(token)?;
        let _guard = self.acquire(Operation::CheckIn)?;

        let result = self.checkin.check_in(token).await;
        let receipt = self
            .settle(Operation::CheckIn, result, |receipt| match receipt.status {
                CheckinStatus::CheckedIn => format!("{} checked in", receipt.name),
                CheckinStatus::AlreadyChecked => {
                    format!("{} was already checked in", receipt.name)
                }
            })
            .await?;

        if self.selection.selected_id() == Some(receipt.event_id) {
            if let Err(err) = self.roster.reload(receipt.event_id).await {
                self.report_failure(Operation::LoadRoster, &err).await;
            }
        }
        Ok(receipt)
    }

    pub fn qr_url(&self, guest_id: GuestId) -> Result<Url> {
        self.roster.qr_url(guest_id)
    }

    /// Downloads the guest's QR image. Only failures are reported.
    pub async fn fetch_qr(&self, guest_id: GuestId) -> Result<Vec<u8>> {
        let result = self.roster.fetch_qr(guest_id).await;
        if let Err(err) = &result {
            self.report_failure(Operation::FetchQr, err).await;
        }
        result
    }

    pub async fn status(&self) -> Option<OperationResult> {
        self.status.current().await
    }

    pub fn selected_event(&self) -> Option<Event> {
        self.selection.selected()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub async fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            health: self.health.status().await,
            events: self.catalog.events().await,
            event_draft: self.catalog.draft().await,
            selected_event: self.selection.selected(),
            roster: self.roster.snapshot().await,
            guest_draft: self.roster.draft().await,
            staged_import: self.roster.staged().await.map(|file| file.filename),
            busy: self.busy.is_busy(),
            status: self.status.current().await,
        }
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.allows(capability) {
            Ok(())
        } else {
            Err(ConsoleError::Disabled(capability))
        }
    }

    async fn require_selection(&self, operation: Operation) -> Result<EventId> {
        match self.selection.selected_id() {
            Some(event_id) => Ok(event_id),
            None => {
                let err = ConsoleError::validation("select an event first");
                self.report_failure(operation, &err).await;
                Err(err)
            }
        }
    }

    fn acquire(&self, operation: Operation) -> Result<BusyGuard<'_>> {
        self.busy.try_acquire().ok_or_else(|| {
            debug!(%operation, "rejected while another operation is in flight");
            ConsoleError::Busy
        })
    }

    async fn settle<T>(
        &self,
        operation: Operation,
        result: Result<T>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T> {
        match &result {
            Ok(value) => {
                self.status
                    .report(OperationResult::success(operation, describe(value)))
                    .await
            }
            Err(err) => self.report_failure(operation, err).await,
        }
        result
    }

    async fn report_failure(&self, operation: Operation, err: &ConsoleError) {
        warn!(%operation, kind = %err.kind(), error = %err, "operation failed");
        self.status
            .report(OperationResult::failure(operation, err))
            .await;
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
