//! In-process stand-in for the access-control backend.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use shared::{
    domain::{CheckinStatus, EventId, GuestId},
    protocol::{
        CheckinReceipt, CheckinRequest, CreateEventRequest, CreateGuestRequest, Event, Guest,
    },
};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use crate::console::{AccessConsole, Capabilities, ConsoleConfig};

pub(crate) const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Route {
    Health,
    ListEvents,
    CreateEvent,
    ListGuests,
    CreateGuest,
    ImportGuests,
    Resend,
    Qr,
    Checkin,
}

#[derive(Default)]
struct BackendState {
    events: Vec<Event>,
    guests: Vec<Guest>,
    next_id: i64,
    requests: Vec<String>,
    failures: HashMap<Route, (StatusCode, String)>,
    holds: HashMap<Route, oneshot::Receiver<()>>,
    roster_holds: HashMap<EventId, oneshot::Receiver<()>>,
    uploads: Vec<String>,
    resent: Vec<GuestId>,
}

impl BackendState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_guest(&mut self, event_id: EventId, name: &str, email: &str) -> Guest {
        let id = self.next_id();
        let guest = Guest {
            id: GuestId(id),
            name: name.to_string(),
            email: email.to_string(),
            token: format!("tok-{id:04}"),
            event_id,
            created_at: Some(Utc::now()),
            sent_at: None,
            checked_in_at: None,
        };
        self.guests.push(guest.clone());
        guest
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub(crate) async fn spawn(&self) -> String {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = Router::new()
            .route("/health/ping", get(health))
            .route("/events/", get(list_events).post(create_event))
            .route("/guests/", get(list_guests).post(create_guest))
            .route("/guests/import", post(import_guests))
            .route("/guests/:guest_id/resend", post(resend))
            .route("/guests/qr/:file", get(qr_png))
            .route("/checkin/", post(checkin))
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    pub(crate) async fn seed_event(&self, name: &str) -> Event {
        let mut state = self.state.lock().await;
        let event = Event {
            id: EventId(state.next_id()),
            name: name.to_string(),
            date: None,
            created_at: Some(Utc::now()),
        };
        state.events.push(event.clone());
        event
    }

    pub(crate) async fn seed_guest(&self, event_id: EventId, name: &str, email: &str) -> Guest {
        self.state.lock().await.add_guest(event_id, name, email)
    }

    pub(crate) async fn fail(&self, route: Route, status: StatusCode, body: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert(route, (status, body.to_string()));
    }

    pub(crate) async fn heal(&self, route: Route) {
        self.state.lock().await.failures.remove(&route);
    }

    /// Holds the next request on `route` open until the returned sender fires.
    pub(crate) async fn hold(&self, route: Route) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().await.holds.insert(route, rx);
        tx
    }

    /// Holds the next roster listing for `event_id` open until the returned sender fires.
    pub(crate) async fn hold_roster(&self, event_id: EventId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().await.roster_holds.insert(event_id, rx);
        tx
    }

    pub(crate) async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }

    pub(crate) async fn count(&self, request: &str) -> usize {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .filter(|line| line.as_str() == request)
            .count()
    }

    /// Polls until `request` has been received `times` times.
    pub(crate) async fn wait_for(&self, request: &str, times: usize) {
        for _ in 0..200 {
            if self.count(request).await >= times {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {request}");
    }

    pub(crate) async fn uploads(&self) -> Vec<String> {
        self.state.lock().await.uploads.clone()
    }

    pub(crate) async fn resent(&self) -> Vec<GuestId> {
        self.state.lock().await.resent.clone()
    }

    pub(crate) async fn guests_of(&self, event_id: EventId) -> Vec<Guest> {
        self.state
            .lock()
            .await
            .guests
            .iter()
            .filter(|guest| guest.event_id == event_id)
            .cloned()
            .collect()
    }

    async fn intercept(&self, route: Route) -> Option<Response> {
        let hold = self.state.lock().await.holds.remove(&route);
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let failure = self.state.lock().await.failures.get(&route).cloned();
        failure.map(|(status, body)| (status, body).into_response())
    }
}

pub(crate) fn console_for(base_url: &str) -> AccessConsole {
    console_with(base_url, Capabilities::ALL)
}

pub(crate) fn console_with(base_url: &str, capabilities: Capabilities) -> AccessConsole {
    AccessConsole::new(ConsoleConfig {
        base_url: base_url.to_string(),
        capabilities,
    })
    .expect("console")
}

/// A base address nothing is listening on.
pub(crate) async fn unreachable_base_url() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

async fn record(State(backend): State<FakeBackend>, request: Request, next: Next) -> Response {
    let line = match request.uri().query() {
        Some(query) => format!("{} {}?{}", request.method(), request.uri().path(), query),
        None => format!("{} {}", request.method(), request.uri().path()),
    };
    backend.state.lock().await.requests.push(line);
    next.run(request).await
}

async fn health(State(backend): State<FakeBackend>) -> Response {
    if let Some(response) = backend.intercept(Route::Health).await {
        return response;
    }
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

async fn list_events(State(backend): State<FakeBackend>) -> Response {
    if let Some(response) = backend.intercept(Route::ListEvents).await {
        return response;
    }
    // Newest first, like the real backend.
    let mut events = backend.state.lock().await.events.clone();
    events.reverse();
    Json(events).into_response()
}

async fn create_event(
    State(backend): State<FakeBackend>,
    Json(payload): Json<CreateEventRequest>,
) -> Response {
    if let Some(response) = backend.intercept(Route::CreateEvent).await {
        return response;
    }
    if payload.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "name is required").into_response();
    }
    let mut state = backend.state.lock().await;
    let event = Event {
        id: EventId(state.next_id()),
        name: payload.name,
        date: payload.date,
        created_at: Some(Utc::now()),
    };
    state.events.push(event.clone());
    (StatusCode::CREATED, Json(event)).into_response()
}

#[derive(Deserialize)]
struct GuestQuery {
    event_id: Option<i64>,
}

async fn list_guests(
    State(backend): State<FakeBackend>,
    Query(query): Query<GuestQuery>,
) -> Response {
    if let Some(event_id) = query.event_id {
        let hold = backend
            .state
            .lock()
            .await
            .roster_holds
            .remove(&EventId(event_id));
        if let Some(hold) = hold {
            let _ = hold.await;
        }
    }
    if let Some(response) = backend.intercept(Route::ListGuests).await {
        return response;
    }
    let state = backend.state.lock().await;
    let guests: Vec<Guest> = state
        .guests
        .iter()
        .filter(|guest| query.event_id.map_or(true, |id| guest.event_id.0 == id))
        .cloned()
        .collect();
    Json(guests).into_response()
}

async fn create_guest(
    State(backend): State<FakeBackend>,
    Json(payload): Json<CreateGuestRequest>,
) -> Response {
    if let Some(response) = backend.intercept(Route::CreateGuest).await {
        return response;
    }
    let mut state = backend.state.lock().await;
    if !state.events.iter().any(|event| event.id == payload.event_id) {
        return (StatusCode::NOT_FOUND, "Event not found").into_response();
    }
    let guest = state.add_guest(payload.event_id, &payload.name, &payload.email);
    Json(guest).into_response()
}

#[derive(Deserialize)]
struct ImportQuery {
    event_id: i64,
}

async fn import_guests(
    State(backend): State<FakeBackend>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> Response {
    if let Some(response) = backend.intercept(Route::ImportGuests).await {
        return response;
    }

    let mut contents = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let text = field.text().await.unwrap_or_default();
            contents = Some((filename, text));
        }
    }
    let Some((filename, text)) = contents else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "file field missing").into_response();
    };

    let mut state = backend.state.lock().await;
    let event_id = EventId(query.event_id);
    if !state.events.iter().any(|event| event.id == event_id) {
        return (StatusCode::NOT_FOUND, "Event not found").into_response();
    }
    state.uploads.push(filename);

    let created: Vec<Guest> = text
        .lines()
        .skip(1)
        .filter_map(|row| row.split_once(','))
        .map(|(name, email)| (name.trim(), email.trim()))
        .filter(|(name, email)| !name.is_empty() && !email.is_empty())
        .map(|(name, email)| state.add_guest(event_id, name, email))
        .collect();
    Json(created).into_response()
}

async fn resend(State(backend): State<FakeBackend>, Path(guest_id): Path<i64>) -> Response {
    if let Some(response) = backend.intercept(Route::Resend).await {
        return response;
    }
    let mut state = backend.state.lock().await;
    let Some(guest) = state
        .guests
        .iter_mut()
        .find(|guest| guest.id == GuestId(guest_id))
    else {
        return (StatusCode::NOT_FOUND, "Guest not found").into_response();
    };
    guest.sent_at = Some(Utc::now());
    let guest = guest.clone();
    state.resent.push(guest.id);
    Json(guest).into_response()
}

async fn qr_png(State(backend): State<FakeBackend>, Path(file): Path<String>) -> Response {
    if let Some(response) = backend.intercept(Route::Qr).await {
        return response;
    }
    let Some(guest_id) = file
        .strip_suffix(".png")
        .and_then(|id| id.parse::<i64>().ok())
    else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    let state = backend.state.lock().await;
    let Some(guest) = state.guests.iter().find(|guest| guest.id == GuestId(guest_id)) else {
        return (StatusCode::NOT_FOUND, "Guest not found").into_response();
    };
    let mut body = PNG_MAGIC.to_vec();
    body.extend_from_slice(guest.token.as_bytes());
    ([(header::CONTENT_TYPE, "image/png")], body).into_response()
}

async fn checkin(
    State(backend): State<FakeBackend>,
    Json(payload): Json<CheckinRequest>,
) -> Response {
    if let Some(response) = backend.intercept(Route::Checkin).await {
        return response;
    }
    let mut state = backend.state.lock().await;
    let Some(guest) = state
        .guests
        .iter_mut()
        .find(|guest| guest.token == payload.token)
    else {
        return (StatusCode::NOT_FOUND, "Invalid token").into_response();
    };
    let status = if guest.checked_in_at.is_none() {
        guest.checked_in_at = Some(Utc::now());
        CheckinStatus::CheckedIn
    } else {
        CheckinStatus::AlreadyChecked
    };
    Json(CheckinReceipt {
        status,
        guest_id: guest.id,
        name: guest.name.clone(),
        event_id: guest.event_id,
        checked_in_at: guest.checked_in_at,
    })
    .into_response()
}
