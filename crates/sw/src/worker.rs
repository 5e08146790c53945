// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The service worker as an event-driven process.
//!
//! ```text
//! installing ──precache ok──▶ waiting ──activate──▶ active
//!     │
//!     └──precache failed──▶ redundant
//! ```
//!
//! With skip-waiting on (the default) a successful install activates
//! immediately.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::CacheStorage;
use crate::config::SwConfig;
use crate::error::SwError;
use crate::message::{Request, Response};
use crate::platform::{Clients, Network, Notifier};
use crate::push::{parse_payload, route_click, ClickOutcome, DisplayedNotification, NotificationDefaults};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Waiting,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound events.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(Option<Bytes>),
    NotificationClick { tag: String, action: Option<String> },
    NotificationClose { tag: String },
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Installed(WorkerState),
    Activated,
    /// `None` means the request was not intercepted.
    Fetched(Option<Response>),
    /// `None` means the push carried nothing displayable.
    Displayed(Option<DisplayedNotification>),
    Clicked(ClickOutcome),
    Closed,
}

/// Platform services handed to the worker.
pub struct Platform {
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
}

pub struct ServiceWorker {
    cache_name: String,
    cache_prefix: String,
    admin_path: String,
    login_path: String,
    fallback_url: String,
    precache: Vec<String>,
    skip_waiting: bool,
    defaults: NotificationDefaults,
    state: Mutex<WorkerState>,
    platform: Platform,
}

impl ServiceWorker {
    pub fn new(config: &SwConfig, platform: Platform) -> Self {
        Self {
            cache_name: config.cache_name(),
            cache_prefix: config.cache_prefix.clone(),
            admin_path: config.admin_path.clone(),
            login_path: config.login_path.clone(),
            fallback_url: config.notification_fallback.clone(),
            precache: config.precache.clone(),
            skip_waiting: true,
            defaults: NotificationDefaults::default(),
            state: Mutex::new(WorkerState::Parsed),
            platform,
        }
    }

    /// Wait in `waiting` after install instead of activating at once.
    pub fn without_skip_waiting(mut self) -> Self {
        self.skip_waiting = false;
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), SwError> {
        let mut state = self.state.lock();
        if !from.contains(&*state) {
            return Err(SwError::InvalidState(format!("cannot enter {to} from {}", *state)));
        }
        tracing::debug!(from = %*state, to = %to, "worker state change");
        *state = to;
        Ok(())
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<Outcome, SwError> {
        match event {
            WorkerEvent::Install => self.install().await.map(Outcome::Installed),
            WorkerEvent::Activate => self.activate().map(|()| Outcome::Activated),
            WorkerEvent::Fetch(request) => Ok(Outcome::Fetched(self.fetch(request).await)),
            WorkerEvent::Push(data) => Ok(Outcome::Displayed(self.push(data.as_deref()))),
            WorkerEvent::NotificationClick { tag, action } => {
                self.notification_click(&tag, action.as_deref()).map(Outcome::Clicked)
            }
            WorkerEvent::NotificationClose { tag } => {
                self.notification_close(&tag);
                Ok(Outcome::Closed)
            }
        }
    }

    /// Precache the manifest, then activate unless skip-waiting is off.
    ///
    /// Precaching is all-or-nothing: if any entry fails, nothing is stored
    /// and the worker becomes redundant.
    pub async fn install(&self) -> Result<WorkerState, SwError> {
        self.transition(&[WorkerState::Parsed], WorkerState::Installing)?;

        let mut entries = Vec::with_capacity(self.precache.len());
        for url in &self.precache {
            match self.platform.network.fetch(Request::get(url.as_str())).await {
                Ok(resp) if resp.status.is_success() => entries.push((url.clone(), resp)),
                Ok(resp) => {
                    *self.state.lock() = WorkerState::Redundant;
                    return Err(SwError::Cache(format!("precache {url} returned {}", resp.status)));
                }
                Err(e) => {
                    *self.state.lock() = WorkerState::Redundant;
                    return Err(SwError::Cache(format!("precache {url} failed: {e}")));
                }
            }
        }
        let count = entries.len();
        self.platform.caches.put_all(&self.cache_name, entries);
        tracing::info!(cache = %self.cache_name, count, "precached admin shell");

        self.transition(&[WorkerState::Installing], WorkerState::Waiting)?;
        if self.skip_waiting {
            self.activate()?;
        }
        Ok(self.state())
    }

    /// Drop stale cache generations and take control of open windows.
    pub fn activate(&self) -> Result<(), SwError> {
        self.transition(&[WorkerState::Waiting], WorkerState::Active)?;
        for name in self.platform.caches.keys() {
            if name.starts_with(&self.cache_prefix) && name != self.cache_name {
                self.platform.caches.delete(&name);
                tracing::info!(cache = %name, "deleted stale cache");
            }
        }
        self.platform.clients.claim();
        Ok(())
    }

    /// Network first, then cache, then the login page for HTML, then 503.
    ///
    /// Returns `None` for requests outside the admin path or while the
    /// worker is not active; the caller sends those to the network itself.
    pub async fn fetch(&self, request: Request) -> Option<Response> {
        if self.state() != WorkerState::Active || !request.url.contains(&self.admin_path) {
            return None;
        }

        let cacheable = request.method == Method::GET;
        match self.platform.network.fetch(request.clone()).await {
            Ok(resp) => {
                if cacheable && resp.status == StatusCode::OK {
                    self.platform.caches.put(&self.cache_name, &request.url, resp.clone());
                }
                Some(resp)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, err = %e, "network failed, trying cache");
                Some(self.offline_response(&request, cacheable))
            }
        }
    }

    fn offline_response(&self, request: &Request, cacheable: bool) -> Response {
        if cacheable {
            if let Some(hit) = self.platform.caches.lookup_any(&request.url) {
                return hit;
            }
        }
        if request.accepts_html() {
            if let Some(login) = self.platform.caches.lookup_any(&self.login_path) {
                return login;
            }
        }
        Response::offline()
    }

    /// Show a system notification for a push message.
    pub fn push(&self, data: Option<&[u8]>) -> Option<DisplayedNotification> {
        let payload = parse_payload(data)?;
        let notification = payload.into_notification(&self.defaults, epoch_ms());
        tracing::info!(tag = %notification.tag, title = %notification.title, "showing notification");
        self.platform.notifier.show(notification.clone());
        Some(notification)
    }

    /// Close the notification and route the click.
    pub fn notification_click(&self, tag: &str, action: Option<&str>) -> Result<ClickOutcome, SwError> {
        let notification = self
            .platform
            .notifier
            .close(tag)
            .ok_or_else(|| SwError::NotFound(format!("no notification tagged {tag}")))?;
        let outcome = route_click(
            &notification,
            action,
            self.platform.clients.as_ref(),
            &self.admin_path,
            &self.fallback_url,
        );
        tracing::debug!(tag, ?outcome, "notification clicked");
        Ok(outcome)
    }

    pub fn notification_close(&self, tag: &str) {
        self.platform.notifier.close(tag);
        tracing::info!(tag, "notification closed");
    }
}

pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
