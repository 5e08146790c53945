// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform services the worker depends on, with in-memory hosts.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::SwError;
use crate::message::{Request, Response};
use crate::push::DisplayedNotification;

pub type NetworkFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, SwError>> + Send + 'a>>;

/// Outbound HTTP. An `Err` means no response at all; HTTP error statuses
/// are `Ok` responses.
pub trait Network: Send + Sync + 'static {
    fn fetch(&self, request: Request) -> NetworkFuture<'_>;
}

/// System notification surface.
pub trait Notifier: Send + Sync + 'static {
    /// Display a notification, replacing any with the same tag.
    fn show(&self, notification: DisplayedNotification);

    /// Remove a displayed notification, returning it.
    fn close(&self, tag: &str) -> Option<DisplayedNotification>;

    fn displayed(&self) -> Vec<DisplayedNotification>;
}

/// A window of the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowClient {
    pub id: u64,
    pub url: String,
    pub focused: bool,
    pub controlled: bool,
}

/// Open windows of the origin.
pub trait Clients: Send + Sync + 'static {
    /// Every window, controlled or not, in creation order.
    fn match_all(&self) -> Vec<WindowClient>;

    fn focus(&self, id: u64);

    fn navigate(&self, id: u64, url: &str);

    /// Open a new window and return its id.
    fn open_window(&self, url: &str) -> u64;

    /// Take control of every open window.
    fn claim(&self);
}

/// [`Notifier`] that keeps displayed notifications in memory.
#[derive(Default)]
pub struct MemoryNotifier {
    shown: Mutex<IndexMap<String, DisplayedNotification>>,
}

impl Notifier for MemoryNotifier {
    fn show(&self, notification: DisplayedNotification) {
        let mut shown = self.shown.lock();
        shown.shift_remove(&notification.tag);
        shown.insert(notification.tag.clone(), notification);
    }

    fn close(&self, tag: &str) -> Option<DisplayedNotification> {
        self.shown.lock().shift_remove(tag)
    }

    fn displayed(&self) -> Vec<DisplayedNotification> {
        self.shown.lock().values().cloned().collect()
    }
}

/// [`Clients`] that tracks simulated windows.
#[derive(Default)]
pub struct MemoryClients {
    windows: Mutex<Vec<WindowClient>>,
    next_id: AtomicU64,
}

impl MemoryClients {
    /// Register a window the worker does not control yet.
    pub fn attach(&self, url: &str) -> u64 {
        self.push(url, false, false)
    }

    fn push(&self, url: &str, focused: bool, controlled: bool) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut windows = self.windows.lock();
        if focused {
            windows.iter_mut().for_each(|w| w.focused = false);
        }
        windows.push(WindowClient { id, url: url.to_owned(), focused, controlled });
        id
    }
}

impl Clients for MemoryClients {
    fn match_all(&self) -> Vec<WindowClient> {
        self.windows.lock().clone()
    }

    fn focus(&self, id: u64) {
        for w in self.windows.lock().iter_mut() {
            w.focused = w.id == id;
        }
    }

    fn navigate(&self, id: u64, url: &str) {
        if let Some(w) = self.windows.lock().iter_mut().find(|w| w.id == id) {
            w.url = url.to_owned();
        }
    }

    fn open_window(&self, url: &str) -> u64 {
        self.push(url, true, true)
    }

    fn claim(&self) {
        self.windows.lock().iter_mut().for_each(|w| w.controlled = true);
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
