// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories for calls against the admin REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorKind {
    Unauthorized,
    SessionExpired,
    BadRequest,
    NotFound,
    Server,
    Transport,
    Decode,
}

impl ApiErrorKind {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            400..=499 => Self::BadRequest,
            _ => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Server => "SERVER_ERROR",
            Self::Transport => "TRANSPORT",
            Self::Decode => "DECODE",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed REST call with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn session_expired() -> Self {
        Self::new(ApiErrorKind::SessionExpired, "Session expired. Please login again.")
    }

    pub fn transport(err: impl fmt::Display) -> Self {
        Self::new(ApiErrorKind::Transport, err.to_string())
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::new(ApiErrorKind::Decode, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Extract the display message from an error response body.
///
/// The backend reports errors as `{"error": ".."}`, `{"detail": ".."}`, or
/// field-level validation maps (`{"field": ["msg", ..]}`).
pub fn extract_error_message(body: &serde_json::Value) -> String {
    const FALLBACK: &str = "API request failed";

    if let Some(msg) = body.get("error").and_then(|v| v.as_str()) {
        return msg.to_owned();
    }
    if let Some(msg) = body.get("detail").and_then(|v| v.as_str()) {
        return msg.to_owned();
    }

    let Some(fields) = body.as_object() else {
        return FALLBACK.to_owned();
    };
    let mut messages = Vec::new();
    for value in fields.values() {
        match value {
            serde_json::Value::Array(items) => {
                messages.extend(items.iter().map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }));
            }
            serde_json::Value::String(s) => messages.push(s.clone()),
            _ => {}
        }
    }
    if messages.is_empty() {
        FALLBACK.to_owned()
    } else {
        messages.join(" ")
    }
}

/// Errors from enabling or disabling push delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The environment has no push capability.
    Unsupported,
    /// The user declined the notification permission prompt.
    PermissionDenied,
    /// The platform push service refused the operation.
    Platform(String),
    /// The backend rejected the subscription change.
    Api(ApiError),
}

impl PushError {
    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unsupported => "Push notifications are not supported on this device.".to_owned(),
            Self::PermissionDenied => {
                "Please allow notifications in your browser settings.".to_owned()
            }
            Self::Platform(msg) => msg.clone(),
            Self::Api(e) => e.message.clone(),
        }
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => f.write_str("push notifications not supported"),
            Self::PermissionDenied => f.write_str("notification permission denied"),
            Self::Platform(msg) => write!(f, "push platform error: {msg}"),
            Self::Api(e) => write!(f, "push api error: {e}"),
        }
    }
}

impl std::error::Error for PushError {}

impl From<ApiError> for PushError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
