// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end tests of the admin notification client.
//!
//! [`MockBackend`] plays the admin API: token auth, the notification REST
//! endpoints and the notification socket. Tests drive it directly to push
//! notifications or drop sockets, and inspect what the client sent.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tola_admin::config::AdminConfig;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "tiles";
pub const REFRESH_TOKEN: &str = "refresh-1";
/// URL-safe base64 of "hello?", without padding.
pub const VAPID_KEY: &str = "aGVsbG8_";

/// A notification record as the backend serializes it.
pub fn notification(id: i64, title: &str, is_read: bool) -> Value {
    json!({
        "id": id,
        "type": "new_lead",
        "title": title,
        "message": format!("message {id}"),
        "priority": "normal",
        "is_read": is_read,
        "data": {"url": format!("/admin/leads/{id}")},
        "created_at": format!("2026-01-01T00:00:{:02}Z", id % 60),
    })
}

enum Frame {
    Text(String),
    Close(u16),
    Abort,
}

#[derive(Default)]
struct Records {
    access: HashSet<String>,
    issued: u64,
    notifications: Vec<Value>,
    preferences: Value,
    subscriptions: Vec<Value>,
    refreshes: usize,
}

#[derive(Default)]
struct BackendState {
    records: Mutex<Records>,
    sockets: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
    received: Mutex<Vec<Value>>,
    connections: AtomicUsize,
    rejected: AtomicUsize,
    open: AtomicUsize,
    reject_sockets: AtomicBool,
}

impl BackendState {
    fn issue(&self) -> String {
        let mut records = self.records.lock();
        records.issued += 1;
        let token = format!("access-{}", records.issued);
        records.access.insert(token.clone());
        token
    }

    fn valid(&self, token: &str) -> bool {
        self.records.lock().access.contains(token)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid(token))
    }

    fn unread(&self) -> usize {
        self.records.lock().notifications.iter().filter(|n| n["is_read"] == false).count()
    }

    fn mark_read(&self, id: i64) -> bool {
        let mut records = self.records.lock();
        match records.notifications.iter_mut().find(|n| n["id"] == id) {
            Some(n) => {
                n["is_read"] = Value::Bool(true);
                true
            }
            None => false,
        }
    }

    fn mark_all_read(&self) {
        for n in self.records.lock().notifications.iter_mut() {
            n["is_read"] = Value::Bool(true);
        }
    }

    fn broadcast(&self, make: impl Fn() -> Frame) {
        self.sockets.lock().retain(|tx| tx.send(make()).is_ok());
    }

    /// Record a client frame and build the reply, if any.
    fn on_client_message(&self, text: &str) -> Option<String> {
        let msg: Value = serde_json::from_str(text).ok()?;
        self.received.lock().push(msg.clone());
        match msg["type"].as_str()? {
            "ping" => Some(json!({"type": "pong"}).to_string()),
            "mark_read" => {
                self.mark_read(msg["notification_id"].as_i64()?);
                Some(json!({"type": "unread_count_update", "unread_count": self.unread()}).to_string())
            }
            "mark_all_read" => {
                self.mark_all_read();
                Some(json!({"type": "unread_count_update", "unread_count": 0}).to_string())
            }
            _ => None,
        }
    }
}

/// In-process admin backend on an ephemeral port, stopped on drop.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    shutdown: CancellationToken,
}

impl MockBackend {
    pub async fn start() -> anyhow::Result<Self> {
        ensure_crypto();
        let state = Arc::new(BackendState::default());
        state.records.lock().preferences = json!({
            "new_lead_enabled": true,
            "lead_status_enabled": true,
            "quote_status_enabled": true,
            "invoice_paid_enabled": true,
            "system_enabled": true,
            "push_enabled": true,
            "sound_enabled": true,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let router = build_router(Arc::clone(&state));
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(stop.cancelled_owned()).await;
        });
        Ok(Self { addr, state, shutdown })
    }

    /// REST base, including the `/api` prefix.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client config pointing at this backend, with short timers.
    pub fn config(&self, state_dir: &Path) -> AdminConfig {
        let mut config = AdminConfig::test(&self.api_url(), &self.ws_url());
        config.state_dir = Some(state_dir.to_owned());
        config
    }

    /// Issue a fresh access token, as a login would.
    pub fn issue_token(&self) -> String {
        self.state.issue()
    }

    /// Invalidate every access token; refresh still works.
    pub fn expire_access_tokens(&self) {
        self.state.records.lock().access.clear();
    }

    /// Refuse every socket with 4001, even for tokens REST accepts.
    pub fn reject_all_sockets(&self) {
        self.state.reject_sockets.store(true, Ordering::SeqCst);
    }

    pub fn refresh_count(&self) -> usize {
        self.state.records.lock().refreshes
    }

    /// Seed the stored notification list.
    pub fn seed(&self, notifications: Vec<Value>) {
        self.state.records.lock().notifications = notifications;
    }

    pub fn stored(&self) -> Vec<Value> {
        self.state.records.lock().notifications.clone()
    }

    pub fn subscriptions(&self) -> Vec<Value> {
        self.state.records.lock().subscriptions.clone()
    }

    /// Store a notification and send it to every open socket.
    pub fn push(&self, notification: Value) {
        self.state.records.lock().notifications.insert(0, notification.clone());
        let text = json!({"type": "new_notification", "notification": notification}).to_string();
        self.state.broadcast(|| Frame::Text(text.clone()));
    }

    /// Send a raw text frame to every open socket.
    pub fn send_raw(&self, text: &str) {
        self.state.broadcast(|| Frame::Text(text.to_owned()));
    }

    /// Close every open socket with `code`.
    pub fn close_all(&self, code: u16) {
        self.state.broadcast(|| Frame::Close(code));
    }

    /// Drop every open socket without a close frame.
    pub fn abort_all(&self) {
        self.state.broadcast(|| Frame::Abort);
    }

    /// Sockets accepted with a valid token, over the backend's lifetime.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Sockets refused with close code 4001.
    pub fn rejected(&self) -> usize {
        self.state.rejected.load(Ordering::SeqCst)
    }

    pub fn open_sockets(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// `type` of every frame the client sent, in order.
    pub fn received_types(&self) -> Vec<String> {
        self.state
            .received
            .lock()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_owned))
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.state.broadcast(|| Frame::Abort);
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Resolve the path to the compiled `tola-admin` binary.
pub fn admin_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tola-admin")
}

/// Run one `tola-admin` command against `backend`, returning stdout.
pub async fn run_admin(backend: &MockBackend, state_dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let binary = admin_binary();
    anyhow::ensure!(binary.exists(), "tola-admin binary not found at {}", binary.display());

    let output = tokio::process::Command::new(&binary)
        .args(args)
        .env("TOLA_API_URL", backend.api_url())
        .env("TOLA_WS_URL", backend.ws_url())
        .env("TOLA_STATE_DIR", state_dir)
        .env("TOLA_LOG_LEVEL", "warn")
        .env("TOLA_SOUND", "false")
        .output()
        .await?;
    anyhow::ensure!(
        output.status.success(),
        "tola-admin {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout)?)
}

// -- Routes -------------------------------------------------------------------

fn build_router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/ws/notifications/", get(ws_notifications))
        .route("/api/auth/login/", post(login))
        .route("/api/auth/refresh/", post(refresh))
        .route("/api/auth/logout/", post(logout))
        .route("/api/notifications/notifications/", get(list))
        .route("/api/notifications/notifications/{id}/mark_read/", post(mark_read))
        .route("/api/notifications/notifications/mark_all_read/", post(mark_all_read))
        .route("/api/notifications/notifications/unread_count/", get(unread_count))
        .route("/api/notifications/preferences/", get(preferences).put(update_preferences))
        .route("/api/notifications/vapid-key/", get(vapid_key))
        .route("/api/notifications/push-subscriptions/", post(register_push))
        .route("/api/notifications/push-subscriptions/unsubscribe/", delete(unregister_push))
        .with_state(state)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Given token not valid for any token type"})))
        .into_response()
}

async fn login(State(s): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["username"] != USERNAME || body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid credentials"})))
            .into_response();
    }
    Json(json!({"access": s.issue(), "refresh": REFRESH_TOKEN})).into_response()
}

async fn refresh(State(s): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["refresh"] != REFRESH_TOKEN {
        return unauthorized();
    }
    s.records.lock().refreshes += 1;
    Json(json!({"access": s.issue()})).into_response()
}

async fn logout(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let results = s.records.lock().notifications.clone();
    Json(json!({"count": results.len(), "results": results})).into_response()
}

async fn mark_read(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i64>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    if !s.mark_read(id) {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(json!({"status": "ok"})).into_response()
}

async fn mark_all_read(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.mark_all_read();
    Json(json!({"status": "ok"})).into_response()
}

async fn unread_count(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"count": s.unread()})).into_response()
}

async fn preferences(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(s.records.lock().preferences.clone()).into_response()
}

async fn update_preferences(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(update): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let mut records = s.records.lock();
    if let Some(fields) = update.as_object() {
        for (key, value) in fields {
            records.preferences[key.as_str()] = value.clone();
        }
    }
    Json(records.preferences.clone()).into_response()
}

async fn vapid_key(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"public_key": VAPID_KEY})).into_response()
}

async fn register_push(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let mut records = s.records.lock();
    records.subscriptions.retain(|sub| sub["endpoint"] != body["endpoint"]);
    records.subscriptions.push(body);
    (StatusCode::CREATED, Json(json!({"status": "subscribed"}))).into_response()
}

async fn unregister_push(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !s.authorized(&headers) {
        return unauthorized();
    }
    s.records.lock().subscriptions.retain(|sub| sub["endpoint"] != body["endpoint"]);
    Json(json!({"status": "unsubscribed"})).into_response()
}

async fn ws_notifications(
    State(s): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let authorized = !s.reject_sockets.load(Ordering::SeqCst)
        && query.get("token").is_some_and(|token| s.valid(token));
    ws.on_upgrade(move |socket| serve_socket(socket, s, authorized))
}

async fn serve_socket(mut socket: WebSocket, s: Arc<BackendState>, authorized: bool) {
    if !authorized {
        s.rejected.fetch_add(1, Ordering::SeqCst);
        let frame = CloseFrame { code: 4001, reason: Utf8Bytes::from_static("invalid token") };
        let _ = socket.send(Message::Close(Some(frame))).await;
        return;
    }

    s.connections.fetch_add(1, Ordering::SeqCst);
    s.open.fetch_add(1, Ordering::SeqCst);
    let (tx, mut rx) = mpsc::unbounded_channel();
    s.sockets.lock().push(tx);

    let hello = json!({"type": "connection_established", "unread_count": s.unread()});
    if socket.send(Message::Text(hello.to_string().into())).await.is_ok() {
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(Frame::Text(text)) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Frame::Close(code)) => {
                        let frame = CloseFrame { code, reason: Utf8Bytes::from_static("") };
                        let _ = socket.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    Some(Frame::Abort) | None => break,
                },
                msg = socket.recv() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = s.on_client_message(text.as_str()) {
                            if socket.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    s.open.fetch_sub(1, Ordering::SeqCst);
}
