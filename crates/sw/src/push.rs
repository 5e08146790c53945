// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push payloads, displayed notifications and click routing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::platform::Clients;

/// Action id that closes the notification without opening anything.
pub const ACTION_DISMISS: &str = "dismiss";
pub const ACTION_VIEW: &str = "view";

/// Server-defined push message. Every field is optional, and a field of the
/// wrong type is treated as absent.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub badge: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tag: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub require_interaction: Option<bool>,
    #[serde(default, deserialize_with = "lenient_vibrate")]
    pub vibrate: Option<Vec<u32>>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A single duration is accepted as a one-step pattern.
fn lenient_vibrate<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(ms) = value.as_u64().and_then(|ms| u32::try_from(ms).ok()) {
        return Ok(Some(vec![ms]));
    }
    Ok(serde_json::from_value(value).ok())
}

/// Values used for fields the payload leaves out.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Tola Tiles Admin".to_owned(),
            body: "New notification".to_owned(),
            icon: "/images/logo.png".to_owned(),
            badge: "/images/badge-72.png".to_owned(),
            vibrate: vec![200, 100, 200],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// A notification as handed to the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: Value,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

impl DisplayedNotification {
    /// URL carried in `data.url`, if any.
    pub fn target_url(&self) -> Option<&str> {
        self.data.get("url").and_then(Value::as_str).filter(|u| !u.is_empty())
    }
}

/// Decode a push message body. Missing or malformed data yields `None`.
pub fn parse_payload(data: Option<&[u8]>) -> Option<NotificationPayload> {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        tracing::info!("push event received without data");
        return None;
    };
    match serde_json::from_slice(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(err = %e, "failed to parse push payload");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl NotificationPayload {
    /// Fill in defaults. `now_ms` seeds the tag when none is given.
    pub fn into_notification(self, defaults: &NotificationDefaults, now_ms: u64) -> DisplayedNotification {
        DisplayedNotification {
            title: non_empty(self.title).unwrap_or_else(|| defaults.title.clone()),
            body: non_empty(self.body)
                .or_else(|| non_empty(self.message))
                .unwrap_or_else(|| defaults.body.clone()),
            icon: non_empty(self.icon).unwrap_or_else(|| defaults.icon.clone()),
            badge: non_empty(self.badge).unwrap_or_else(|| defaults.badge.clone()),
            tag: non_empty(self.tag).unwrap_or_else(|| format!("notification-{now_ms}")),
            data: self.data.filter(|d| !d.is_null()).unwrap_or_else(|| Value::Object(Default::default())),
            require_interaction: self.require_interaction.unwrap_or(false),
            vibrate: self.vibrate.unwrap_or_else(|| defaults.vibrate.clone()),
            actions: vec![
                NotificationAction { action: ACTION_VIEW.to_owned(), title: "View".to_owned() },
                NotificationAction { action: ACTION_DISMISS.to_owned(), title: "Dismiss".to_owned() },
            ],
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// The dismiss action: nothing beyond closing.
    Dismissed,
    /// An existing admin window was focused, and navigated when the
    /// notification carried a URL.
    Focused { client: u64, navigated: Option<String> },
    /// No admin window was open; a new one was opened.
    Opened { client: u64, url: String },
}

/// Route a click on `notification` to a window.
pub fn route_click(
    notification: &DisplayedNotification,
    action: Option<&str>,
    clients: &dyn Clients,
    admin_path: &str,
    fallback_url: &str,
) -> ClickOutcome {
    if action == Some(ACTION_DISMISS) {
        return ClickOutcome::Dismissed;
    }

    let target = notification.target_url();
    if let Some(window) = clients.match_all().into_iter().find(|w| w.url.contains(admin_path)) {
        clients.focus(window.id);
        if let Some(url) = target {
            clients.navigate(window.id, url);
        }
        return ClickOutcome::Focused { client: window.id, navigated: target.map(str::to_owned) };
    }

    let url = target.unwrap_or(fallback_url).to_owned();
    let client = clients.open_window(&url);
    ClickOutcome::Opened { client, url }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
