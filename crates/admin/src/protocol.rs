// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification WebSocket wire format.
//!
//! Every frame is a JSON object discriminated by `type`. Inbound and outbound
//! messages are closed sets; an unknown inbound `type` is a decode error.

use serde::{Deserialize, Serialize};

use crate::model::{Notification, NotificationId};

/// Normal closure, sent by a client that is going away on purpose.
pub const CLOSE_NORMAL: u16 = 1000;
/// The server refused the token carried in the query string.
pub const CLOSE_AUTH_REJECTED: u16 = 4001;
/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the socket is accepted.
    ConnectionEstablished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unread_count: Option<u64>,
    },
    /// A notification was created for this user.
    NewNotification { notification: Notification },
    /// Authoritative unread count.
    UnreadCountUpdate { unread_count: u64 },
    /// Heartbeat acknowledgement.
    Pong,
}

/// Client → server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    MarkRead { notification_id: NotificationId },
    MarkAllRead,
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        // Unit and integer-only variants always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Parse one inbound text frame.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Whether a close with this code should be followed by a reconnect.
pub fn is_reconnectable(code: u16) -> bool {
    code != CLOSE_NORMAL && code != CLOSE_AUTH_REJECTED
}

/// Build the notification socket URL for a WebSocket base URL.
///
/// `http(s)://` bases are rewritten to `ws(s)://`.
pub fn build_ws_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if base.starts_with("https://") {
        base.replacen("https://", "wss://", 1)
    } else if base.starts_with("http://") {
        base.replacen("http://", "ws://", 1)
    } else {
        base.to_owned()
    };
    format!("{ws_base}/ws/notifications/?token={token}")
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
