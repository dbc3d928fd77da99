//! Runs CLI commands against one [`AccessConsole`] and renders what it reports.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use client_core::{
    AccessConsole, CommandOutcome, ConsoleCommand, ConsoleEvent, EventDraft, GuestDraft,
    HealthStatus, UploadFile,
};
use shared::{
    domain::EventId,
    protocol::{timestamp, Event, Guest},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::TryRecvError},
};
use tracing::{debug, warn};

use crate::{Command, EventsCommand, GuestsCommand};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Select an event and show its guests.
    Select { event: EventId },
    /// Show the last operation status.
    Status,
    #[command(alias = "exit")]
    Quit,
    #[command(flatten)]
    Run(Command),
}

pub struct Session {
    console: AccessConsole,
    events: broadcast::Receiver<ConsoleEvent>,
}

impl Session {
    pub fn new(console: AccessConsole) -> Self {
        let events = console.subscribe_events();
        Self { console, events }
    }

    /// Runs one command. `Ok(false)` means the console reported a failure.
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<bool> {
        match command {
            Command::Health => {
                let health = match self.step(ConsoleCommand::CheckHealth).await {
                    Some(CommandOutcome::Health(health)) => health,
                    _ => HealthStatus::Error,
                };
                println!("API: {health}");
                Ok(health == HealthStatus::Ok)
            }
            Command::Events(EventsCommand::List) => {
                match self.step(ConsoleCommand::RefreshEvents).await {
                    Some(CommandOutcome::Events(events)) => {
                        print_events(&events);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            Command::Events(EventsCommand::Create { name, date }) => {
                let date = match date {
                    Some(raw) => match timestamp::parse(&raw) {
                        Some(date) => Some(date),
                        None => bail!("'{raw}' is not an RFC 3339 date"),
                    },
                    None => None,
                };
                self.step(ConsoleCommand::EditEventDraft(EventDraft { name, date }))
                    .await;
                Ok(self.step(ConsoleCommand::CreateEvent).await.is_some())
            }
            Command::Guests(GuestsCommand::List { event }) => {
                let loaded = match event {
                    Some(event_id) => self.select(event_id).await,
                    None => self.step(ConsoleCommand::ReloadRoster).await.is_some(),
                };
                if loaded {
                    print_roster(&self.console.snapshot().await.roster.guests);
                }
                Ok(loaded)
            }
            Command::Guests(GuestsCommand::Add { event, name, email }) => {
                if !self.ensure_selected(event).await {
                    return Ok(false);
                }
                self.step(ConsoleCommand::EditGuestDraft(GuestDraft::new(name, email)))
                    .await;
                Ok(self.step(ConsoleCommand::CreateGuest).await.is_some())
            }
            Command::Guests(GuestsCommand::Import { event, file }) => {
                let upload = read_upload(&file).await?;
                if !self.ensure_selected(event).await {
                    return Ok(false);
                }
                self.step(ConsoleCommand::StageImport(upload)).await;
                Ok(self.step(ConsoleCommand::ImportGuests).await.is_some())
            }
            Command::Guests(GuestsCommand::Resend { event, guest_id }) => {
                if !self.ensure_selected(event).await {
                    return Ok(false);
                }
                Ok(self
                    .step(ConsoleCommand::ResendCredential(guest_id))
                    .await
                    .is_some())
            }
            Command::Guests(GuestsCommand::Qr { guest_id, out }) => {
                let Some(CommandOutcome::QrImage { bytes, .. }) =
                    self.step(ConsoleCommand::FetchQr(guest_id)).await
                else {
                    return Ok(false);
                };
                let path = out.unwrap_or_else(|| PathBuf::from(format!("guest-{guest_id}.png")));
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                println!("QR for guest {guest_id} saved to {}", path.display());
                if let Ok(url) = self.console.qr_url(guest_id) {
                    println!("{url}");
                }
                Ok(true)
            }
            Command::Checkin { token } => Ok(self
                .step(ConsoleCommand::CheckIn { token })
                .await
                .is_some()),
            Command::Shell => {
                println!("already in the shell");
                Ok(false)
            }
        }
    }

    pub async fn repl(&mut self) -> anyhow::Result<bool> {
        self.console.start().await;
        self.drain_status();
        let snapshot = self.console.snapshot().await;
        println!("API: {}", snapshot.health);
        print_events(&snapshot.events);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}", self.prompt());
            std::io::stdout().flush().context("failed to write prompt")?;

            let Some(line) = lines.next_line().await.context("failed to read input")? else {
                break;
            };
            let words = split_words(&line);
            if words.is_empty() {
                continue;
            }

            let command = match ShellLine::try_parse_from(words) {
                Ok(parsed) => parsed.command,
                Err(err) => {
                    let _ = err.print();
                    continue;
                }
            };
            match command {
                ShellCommand::Quit => break,
                ShellCommand::Status => match self.console.status().await {
                    Some(status) => println!("{status}"),
                    None => println!("no status yet"),
                },
                ShellCommand::Select { event } => {
                    if self.select(event).await {
                        print_roster(&self.console.snapshot().await.roster.guests);
                    }
                }
                ShellCommand::Run(command) => {
                    if let Err(err) = self.execute(command).await {
                        eprintln!("error: {err:#}");
                    }
                }
            }
        }
        Ok(true)
    }

    fn prompt(&self) -> String {
        match self.console.selected_event() {
            Some(event) => format!("qrac [#{} {}]> ", event.id, event.name),
            None => "qrac> ".to_string(),
        }
    }

    /// Dispatches `command` and prints every status it produced. Failures the console handled
    /// silently are printed here so the operator still sees them.
    async fn step(&mut self, command: ConsoleCommand) -> Option<CommandOutcome> {
        let result = self.console.dispatch(command).await;
        let reported = self.drain_status();
        match result {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                if !reported {
                    eprintln!("{err}");
                }
                None
            }
        }
    }

    async fn select(&mut self, event_id: EventId) -> bool {
        let known = self
            .console
            .snapshot()
            .await
            .events
            .iter()
            .any(|event| event.id == event_id);
        if !known && self.step(ConsoleCommand::RefreshEvents).await.is_none() {
            return false;
        }
        self.step(ConsoleCommand::SelectEvent(event_id))
            .await
            .is_some()
    }

    /// Without an explicit event the current selection is used; the console rejects the
    /// operation when there is none.
    async fn ensure_selected(&mut self, event: Option<EventId>) -> bool {
        match event {
            Some(event_id) if self.console.selected_event().map(|e| e.id) != Some(event_id) => {
                self.select(event_id).await
            }
            _ => true,
        }
    }

    fn drain_status(&mut self) -> bool {
        let mut reported = false;
        loop {
            match self.events.try_recv() {
                Ok(ConsoleEvent::StatusReported(status)) => {
                    println!("{status}");
                    reported = true;
                }
                Ok(other) => debug!(event = ?other, "console event"),
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "console events dropped"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        reported
    }
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("guests.csv")
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(UploadFile::new(filename, contents).with_mime_type(mime_type))
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("no events");
        return;
    }
    for event in events {
        let date = event
            .date
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("#{:<5} {:<16} {}", event.id, date, event.name);
    }
}

fn print_roster(guests: &[Guest]) {
    if guests.is_empty() {
        println!("no guests");
        return;
    }
    for guest in guests {
        let state = match (guest.checked_in_at, guest.sent_at) {
            (Some(at), _) => format!("checked in {}", at.format("%Y-%m-%d %H:%M")),
            (None, Some(_)) => "credential sent".to_string(),
            (None, None) => String::new(),
        };
        println!(
            "#{:<5} {} <{}>  {}  {}",
            guest.id, guest.name, guest.email, guest.token, state
        );
    }
}

/// Whitespace split that keeps quoted runs together.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut in_word = false;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
