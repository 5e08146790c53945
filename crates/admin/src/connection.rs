// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle for the notification socket, free of I/O and timers.
//!
//! ```text
//! idle ──connect──▶ connecting ──open──▶ open
//!   ▲                   │                  │
//!   │                   └──close──┬────────┘
//!   │                             ▼
//!   └────disconnect───────────  closed ──(backoff timer)──▶ connecting
//! ```
//!
//! Each transition returns the [`Action`]s the driver must perform. Timer
//! delays are returned as values, so the policy is testable without a clock.

use std::time::Duration;

use crate::protocol::{build_ws_url, is_reconnectable, CLOSE_NORMAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new socket to `url`.
    Open { url: String },
    /// Close the current socket handle.
    Close { code: u16 },
    /// Arm the reconnect timer.
    ScheduleReconnect { delay: Duration },
    /// Disarm the reconnect timer.
    CancelReconnect,
}

/// Exponential backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base: Duration::from_secs(1), max: Duration::from_secs(30) }
    }
}

/// Socket session bookkeeping: state and retry counter.
#[derive(Debug, Clone)]
pub struct Connection {
    ws_base: String,
    backoff: Backoff,
    refresh_delay: Duration,
    state: ConnState,
    attempt: u32,
    has_socket: bool,
    reconnect_pending: bool,
}

impl Connection {
    pub fn new(ws_base: impl Into<String>, backoff: Backoff, refresh_delay: Duration) -> Self {
        Self {
            ws_base: ws_base.into(),
            backoff,
            refresh_delay,
            state: ConnState::Idle,
            attempt: 0,
            has_socket: false,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnState::Open
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Start a connection attempt.
    ///
    /// No-op while connecting or open, and when no token is available.
    pub fn connect(&mut self, token: Option<String>) -> Vec<Action> {
        if matches!(self.state, ConnState::Connecting | ConnState::Open) {
            return Vec::new();
        }
        let Some(token) = token else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(Action::CancelReconnect);
        }
        if self.has_socket {
            actions.push(Action::Close { code: CLOSE_NORMAL });
        }
        actions.push(Action::Open { url: build_ws_url(&self.ws_base, &token) });

        self.state = ConnState::Connecting;
        self.has_socket = true;
        actions
    }

    /// The socket finished its handshake.
    pub fn on_open(&mut self) {
        if self.state == ConnState::Connecting {
            self.state = ConnState::Open;
            self.attempt = 0;
        }
    }

    /// The socket could not even be constructed (bad URL, bad request).
    ///
    /// Clears the in-progress state so a later `connect` can retry; no timer
    /// is armed.
    pub fn on_open_failed(&mut self) {
        if self.state == ConnState::Connecting {
            self.state = ConnState::Closed;
            self.has_socket = false;
        }
    }

    /// The socket closed with `code`.
    ///
    /// Ignored after a client-initiated `disconnect`.
    pub fn on_close(&mut self, code: u16) -> Vec<Action> {
        if !matches!(self.state, ConnState::Connecting | ConnState::Open) {
            return Vec::new();
        }
        self.state = ConnState::Closed;
        self.has_socket = false;

        if !is_reconnectable(code) {
            return Vec::new();
        }
        let delay = self.backoff.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.reconnect_pending = true;
        vec![Action::ScheduleReconnect { delay }]
    }

    /// The reconnect timer fired.
    pub fn on_reconnect_due(&mut self, token: Option<String>) -> Vec<Action> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.connect(token)
    }

    /// Client-initiated teardown. Idempotent.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(Action::CancelReconnect);
        }
        if self.has_socket {
            self.has_socket = false;
            actions.push(Action::Close { code: CLOSE_NORMAL });
        }
        self.state = ConnState::Idle;
        actions
    }

    /// A new access token was issued: drop the socket and come back shortly
    /// with a clean retry counter.
    pub fn on_token_refreshed(&mut self) -> Vec<Action> {
        let mut actions = self.disconnect();
        self.attempt = 0;
        self.reconnect_pending = true;
        actions.push(Action::ScheduleReconnect { delay: self.refresh_delay });
        actions
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
