//! Command interface over [`AccessConsole`]: front ends queue [`ConsoleCommand`]s instead of
//! calling component methods directly.

use shared::{
    domain::{EventId, GuestId},
    protocol::{CheckinReceipt, Event, Guest},
};
use tracing::debug;

use crate::{
    catalog::EventDraft,
    console::AccessConsole,
    error::Result,
    gateway::UploadFile,
    health::HealthStatus,
    roster::GuestDraft,
};

#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    CheckHealth,
    RefreshEvents,
    EditEventDraft(EventDraft),
    CreateEvent,
    SelectEvent(EventId),
    ReloadRoster,
    EditGuestDraft(GuestDraft),
    CreateGuest,
    StageImport(UploadFile),
    ClearImport,
    ImportGuests,
    ResendCredential(GuestId),
    CheckIn { token: String },
    FetchQr(GuestId),
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckHealth => "check_health",
            Self::RefreshEvents => "refresh_events",
            Self::EditEventDraft(_) => "edit_event_draft",
            Self::CreateEvent => "create_event",
            Self::SelectEvent(_) => "select_event",
            Self::ReloadRoster => "reload_roster",
            Self::EditGuestDraft(_) => "edit_guest_draft",
            Self::CreateGuest => "create_guest",
            Self::StageImport(_) => "stage_import",
            Self::ClearImport => "clear_import",
            Self::ImportGuests => "import_guests",
            Self::ResendCredential(_) => "resend_credential",
            Self::CheckIn { .. } => "check_in",
            Self::FetchQr(_) => "fetch_qr",
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Health(HealthStatus),
    Events(Vec<Event>),
    DraftUpdated,
    EventCreated(Event),
    Roster(Vec<Guest>),
    GuestCreated(Guest),
    Imported(Vec<Guest>),
    CredentialResent(GuestId),
    CheckedIn(CheckinReceipt),
    QrImage { guest_id: GuestId, bytes: Vec<u8> },
}

impl AccessConsole {
    pub async fn dispatch(&self, command: ConsoleCommand) -> Result<CommandOutcome> {
        debug!(command = command.name(), "dispatching console command");
        match command {
            ConsoleCommand::CheckHealth => Ok(CommandOutcome::Health(self.check_health().await)),
            ConsoleCommand::RefreshEvents => {
                self.refresh_events().await.map(CommandOutcome::Events)
            }
            ConsoleCommand::EditEventDraft(draft) => {
                self.set_event_draft(draft).await;
                Ok(CommandOutcome::DraftUpdated)
            }
            ConsoleCommand::CreateEvent => {
                self.create_event().await.map(CommandOutcome::EventCreated)
            }
            ConsoleCommand::SelectEvent(event_id) => self
                .select_event_by_id(event_id)
                .await
                .map(CommandOutcome::Roster),
            ConsoleCommand::ReloadRoster => self.reload_roster().await.map(CommandOutcome::Roster),
            ConsoleCommand::EditGuestDraft(draft) => {
                self.set_guest_draft(draft).await;
                Ok(CommandOutcome::DraftUpdated)
            }
            ConsoleCommand::CreateGuest => {
                self.create_guest().await.map(CommandOutcome::GuestCreated)
            }
            ConsoleCommand::StageImport(file) => {
                self.stage_import(file).await;
                Ok(CommandOutcome::DraftUpdated)
            }
            ConsoleCommand::ClearImport => {
                self.clear_import().await;
                Ok(CommandOutcome::DraftUpdated)
            }
            ConsoleCommand::ImportGuests => {
                self.import_guests().await.map(CommandOutcome::Imported)
            }
            ConsoleCommand::ResendCredential(guest_id) => self
                .resend_credential(guest_id)
                .await
                .map(|()| CommandOutcome::CredentialResent(guest_id)),
            ConsoleCommand::CheckIn { token } => {
                self.check_in(&token).await.map(CommandOutcome::CheckedIn)
            }
            ConsoleCommand::FetchQr(guest_id) => self
                .fetch_qr(guest_id)
                .await
                .map(|bytes| CommandOutcome::QrImage { guest_id, bytes }),
        }
    }
}

