// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Records exchanged with the admin backend.

use serde::{Deserialize, Serialize};

pub type NotificationId = i64;

/// What produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewLead,
    LeadStatus,
    QuoteStatus,
    InvoicePaid,
    System,
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A notification addressed to the signed-in admin user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
    /// Free-form payload; `url` names the admin page the notification points at.
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: String,
}

impl Notification {
    /// The admin URL this notification should open, if any.
    pub fn target_url(&self) -> Option<&str> {
        self.data.get("url").and_then(|v| v.as_str())
    }
}

/// Per-user delivery preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub new_lead_enabled: bool,
    pub lead_status_enabled: bool,
    pub quote_status_enabled: bool,
    pub invoice_paid_enabled: bool,
    pub system_enabled: bool,
    pub push_enabled: bool,
    pub sound_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            new_lead_enabled: true,
            lead_status_enabled: true,
            quote_status_enabled: true,
            invoice_paid_enabled: true,
            system_enabled: true,
            push_enabled: true,
            sound_enabled: true,
        }
    }
}

/// Partial preference update; unset fields are left unchanged server-side.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_lead_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_status_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_status_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_paid_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
}

/// Body of `POST /notifications/push-subscriptions/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionCreate {
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub user_agent: String,
}

/// Notification listing, either bare or wrapped in a pagination envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NotificationPage {
    Paginated { results: Vec<Notification> },
    Plain(Vec<Notification>),
}

impl NotificationPage {
    pub fn into_vec(self) -> Vec<Notification> {
        match self {
            Self::Paginated { results } => results,
            Self::Plain(list) => list,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}
