// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live notification client: one reconnecting socket plus the local store.
//!
//! A spawned driver task owns the socket, the heartbeat and the reconnect
//! timer. Handles talk to it over a command channel and read shared state
//! directly. Dropping the last handle tears the connection down.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::alert::Chime;
use crate::api::NotificationApi;
use crate::config::AdminConfig;
use crate::connection::{Action, Backoff, Connection};
use crate::error::ApiError;
use crate::model::{Notification, NotificationId};
use crate::protocol::{parse_server_message, ClientMessage, CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::session::TokenProvider;
use crate::store::{Applied, NotificationStore};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<WsStream, tungstenite::Error>> + Send + 'static>>;

/// Close code reported when the server sends a close frame without one.
const CLOSE_NO_STATUS: u16 = 1005;

/// Something observable happened on the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected { code: u16 },
    NewNotification(Notification),
    UnreadCount(u64),
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Send(ClientMessage),
}

/// Timer settings for the driver.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub heartbeat: Duration,
    pub backoff: Backoff,
    pub refresh_delay: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            heartbeat: config.heartbeat_interval(),
            backoff: Backoff::new(config.reconnect_base(), config.reconnect_max()),
            refresh_delay: config.token_refresh_delay(),
        }
    }
}

struct Shared {
    store: Mutex<NotificationStore>,
    connected: AtomicBool,
    sound: AtomicBool,
    events: broadcast::Sender<ClientEvent>,
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_connected(&self, connected: bool, code: u16) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        match (was, connected) {
            (false, true) => self.emit(ClientEvent::Connected),
            (true, false) => self.emit(ClientEvent::Disconnected { code }),
            _ => {}
        }
    }
}

/// Handle to the live notification client.
pub struct NotificationClient {
    shared: Arc<Shared>,
    api: Arc<dyn NotificationApi>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NotificationClient {
    /// Start the driver task. The socket stays closed until [`connect`](Self::connect).
    pub fn spawn(
        options: ClientOptions,
        ws_base: &str,
        tokens: Arc<dyn TokenProvider>,
        api: Arc<dyn NotificationApi>,
        chime: Arc<dyn Chime>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let shared = Arc::new(Shared {
            store: Mutex::new(NotificationStore::new()),
            connected: AtomicBool::new(false),
            sound: AtomicBool::new(true),
            events,
        });
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            conn: Connection::new(ws_base, options.backoff, options.refresh_delay),
            refresh_rx: tokens.subscribe_refresh(),
            tokens,
            shared: Arc::clone(&shared),
            chime,
            heartbeat: options.heartbeat,
            socket: None,
            pending: None,
            reconnect_at: None,
        };
        let task = tokio::spawn(driver.run(cmd_rx, cancel.clone()));

        Self { shared, api, cmd_tx, cancel, task: Some(task) }
    }

    /// Open the socket if it is not open or opening and a token is available.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Close the socket and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Send a message if the socket is open; dropped otherwise.
    pub fn send_message(&self, msg: ClientMessage) {
        let _ = self.cmd_tx.send(Command::Send(msg));
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn unread_count(&self) -> u64 {
        self.shared.store.lock().unread_count()
    }

    /// Newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.store.lock().notifications()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    pub fn sound_enabled(&self) -> bool {
        self.shared.sound.load(Ordering::Relaxed)
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.shared.sound.store(enabled, Ordering::Relaxed);
    }

    /// Replace the local list with the server's.
    pub async fn refetch(&self) -> Result<(), ApiError> {
        let list = self.api.list_notifications().await.inspect_err(|e| {
            tracing::warn!(err = %e, "failed to fetch notifications");
        })?;
        let count = {
            let mut store = self.shared.store.lock();
            store.replace_all(list);
            store.unread_count()
        };
        self.shared.emit(ClientEvent::UnreadCount(count));
        Ok(())
    }

    /// Mark one notification read: REST first, then local state, then a
    /// best-effort socket message.
    pub async fn mark_as_read(&self, id: NotificationId) -> Result<(), ApiError> {
        self.api.mark_notification_read(id).await.inspect_err(|e| {
            tracing::warn!(id, err = %e, "failed to mark notification read");
        })?;
        let changed = {
            let mut store = self.shared.store.lock();
            store.mark_read(id).then(|| store.unread_count())
        };
        if let Some(count) = changed {
            self.shared.emit(ClientEvent::UnreadCount(count));
        }
        self.send_message(ClientMessage::MarkRead { notification_id: id });
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> Result<(), ApiError> {
        self.api.mark_all_notifications_read().await.inspect_err(|e| {
            tracing::warn!(err = %e, "failed to mark all notifications read");
        })?;
        self.shared.store.lock().mark_all_read();
        self.shared.emit(ClientEvent::UnreadCount(0));
        self.send_message(ClientMessage::MarkAllRead);
        Ok(())
    }

    /// Tear down the connection and wait for the driver to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for NotificationClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the socket and both timers.
struct Driver {
    conn: Connection,
    tokens: Arc<dyn TokenProvider>,
    refresh_rx: watch::Receiver<u64>,
    shared: Arc<Shared>,
    chime: Arc<dyn Chime>,
    heartbeat: Duration,
    socket: Option<WsStream>,
    pending: Option<ConnectFuture>,
    reconnect_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh_alive = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd).await;
                }
                result = finish_connect(&mut self.pending) => {
                    self.pending = None;
                    self.handle_connect_result(result);
                    heartbeat.reset();
                }
                frame = next_frame(&mut self.socket) => {
                    self.handle_frame(frame).await;
                }
                _ = heartbeat.tick(), if self.conn.is_open() => {
                    self.send(ClientMessage::Ping).await;
                }
                _ = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    let actions = self.conn.on_reconnect_due(self.tokens.access_token());
                    self.perform(actions).await;
                }
                changed = self.refresh_rx.changed(), if refresh_alive => {
                    if changed.is_err() {
                        refresh_alive = false;
                        continue;
                    }
                    tracing::info!("access token refreshed, reconnecting");
                    let actions = self.conn.on_token_refreshed();
                    self.perform(actions).await;
                    self.shared.set_connected(false, CLOSE_NORMAL);
                }
            }
        }

        let actions = self.conn.disconnect();
        self.perform(actions).await;
        self.shared.set_connected(false, CLOSE_NORMAL);
        tracing::debug!("notification client stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                let token = self.tokens.access_token();
                if token.is_none() {
                    tracing::debug!("no access token, not connecting");
                }
                let actions = self.conn.connect(token);
                self.perform(actions).await;
            }
            Command::Disconnect => {
                let actions = self.conn.disconnect();
                self.perform(actions).await;
                self.shared.set_connected(false, CLOSE_NORMAL);
            }
            Command::Send(msg) => self.send(msg).await,
        }
    }

    fn handle_connect_result(&mut self, result: Result<WsStream, tungstenite::Error>) {
        match result {
            Ok(stream) => {
                self.socket = Some(stream);
                self.conn.on_open();
                tracing::info!("notification socket connected");
                self.shared.set_connected(true, CLOSE_NORMAL);
            }
            Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_))) => {
                tracing::error!(err = %e, "failed to create notification socket");
                self.conn.on_open_failed();
            }
            Err(e) => {
                tracing::debug!(err = %e, "notification socket connect failed");
                let actions = self.conn.on_close(CLOSE_ABNORMAL);
                self.schedule(actions);
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        let code = match frame {
            Some(Ok(Message::Text(text))) => {
                self.handle_text(text.as_str());
                return;
            }
            Some(Ok(Message::Close(frame))) => {
                frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_NO_STATUS)
            }
            Some(Ok(_)) => return,
            Some(Err(e)) => {
                tracing::debug!(err = %e, "notification socket error");
                CLOSE_ABNORMAL
            }
            None => CLOSE_ABNORMAL,
        };

        self.socket = None;
        tracing::info!(code, "notification socket closed");
        self.shared.set_connected(false, code);
        let actions = self.conn.on_close(code);
        self.perform(actions).await;
    }

    fn handle_text(&self, text: &str) {
        let msg = match parse_server_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(err = %e, "malformed notification message");
                return;
            }
        };
        let applied = self.shared.store.lock().apply(&msg);
        match applied {
            Applied::Count(count) => self.shared.emit(ClientEvent::UnreadCount(count)),
            Applied::Arrived(notification) => {
                tracing::debug!(id = notification.id, title = %notification.title, "new notification");
                if self.shared.sound.load(Ordering::Relaxed) {
                    self.chime.ring();
                }
                let count = self.shared.store.lock().unread_count();
                self.shared.emit(ClientEvent::NewNotification(notification));
                self.shared.emit(ClientEvent::UnreadCount(count));
            }
            Applied::Nothing => {}
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        if !self.conn.is_open() {
            tracing::trace!(?msg, "socket not open, dropping message");
            return;
        }
        let Some(ref mut socket) = self.socket else {
            return;
        };
        if let Err(e) = socket.send(Message::Text(msg.to_json().into())).await {
            tracing::debug!(err = %e, "failed to send notification message");
        }
    }

    async fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Open { url } => {
                    tracing::debug!("opening notification socket");
                    self.pending = Some(open(url));
                }
                Action::Close { code } => {
                    self.pending = None;
                    if let Some(mut socket) = self.socket.take() {
                        let frame = CloseFrame { code: CloseCode::from(code), reason: "".into() };
                        if let Err(e) = socket.close(Some(frame)).await {
                            tracing::debug!(err = %e, "error closing notification socket");
                        }
                    }
                }
                other => self.schedule(vec![other]),
            }
        }
    }

    /// Apply timer actions; socket actions are handled by [`perform`](Self::perform).
    fn schedule(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ScheduleReconnect { delay } => {
                    tracing::info!(
                        attempt = self.conn.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                Action::CancelReconnect => self.reconnect_at = None,
                Action::Open { .. } | Action::Close { .. } => {}
            }
        }
    }
}

fn open(url: String) -> ConnectFuture {
    Box::pin(async move { tokio_tungstenite::connect_async(url).await.map(|(stream, _)| stream) })
}

async fn finish_connect(pending: &mut Option<ConnectFuture>) -> Result<WsStream, tungstenite::Error> {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
