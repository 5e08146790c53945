// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory notification list and unread counter.

use std::collections::VecDeque;

use crate::model::{Notification, NotificationId};
use crate::protocol::ServerMessage;

/// Local view of the user's notifications.
///
/// The unread counter is derived from the list only until the server has
/// reported a count; from then on server values overwrite it and local
/// changes adjust it incrementally.
#[derive(Debug, Default, Clone)]
pub struct NotificationStore {
    notifications: VecDeque<Notification>,
    unread: u64,
    server_count_seen: bool,
}

/// Result of applying an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Counter changed (or was confirmed) without a new notification.
    Count(u64),
    /// A notification was prepended; callers alert the user.
    Arrived(Notification),
    /// Nothing changed.
    Nothing,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unread_count(&self) -> u64 {
        self.unread
    }

    /// Newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.iter().cloned().collect()
    }

    /// Apply one inbound socket message, in delivery order.
    pub fn apply(&mut self, msg: &ServerMessage) -> Applied {
        match msg {
            ServerMessage::ConnectionEstablished { unread_count: Some(count) }
            | ServerMessage::UnreadCountUpdate { unread_count: count } => {
                self.unread = *count;
                self.server_count_seen = true;
                Applied::Count(self.unread)
            }
            ServerMessage::ConnectionEstablished { unread_count: None } | ServerMessage::Pong => {
                Applied::Nothing
            }
            ServerMessage::NewNotification { notification } => {
                self.notifications.push_front(notification.clone());
                self.unread = self.unread.saturating_add(1);
                Applied::Arrived(notification.clone())
            }
        }
    }

    /// Replace the list with a fresh REST listing.
    pub fn replace_all(&mut self, list: Vec<Notification>) {
        self.notifications = list.into();
        if !self.server_count_seen {
            self.unread = self.notifications.iter().filter(|n| !n.is_read).count() as u64;
        }
    }

    /// Mark one notification read locally.
    ///
    /// Only a known unread notification lowers the counter, so repeating the
    /// call is a no-op and the counter never underflows.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        let Some(n) = self.notifications.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if n.is_read {
            return false;
        }
        n.is_read = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    /// Mark every notification read locally and zero the counter.
    pub fn mark_all_read(&mut self) {
        for n in self.notifications.iter_mut() {
            n.is_read = true;
        }
        self.unread = 0;
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
