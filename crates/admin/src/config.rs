// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every `tola-admin` command.
#[derive(Debug, Clone, clap::Args)]
pub struct AdminConfig {
    /// Base URL of the REST API (including the `/api` prefix).
    #[arg(long, default_value = "http://localhost:8000/api", env = "TOLA_API_URL")]
    pub api_url: String,

    /// Base URL of the WebSocket server.
    #[arg(long, default_value = "ws://localhost:8000", env = "TOLA_WS_URL")]
    pub ws_url: String,

    /// Directory holding the persisted session tokens.
    #[arg(long, env = "TOLA_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Heartbeat interval in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "TOLA_HEARTBEAT_MS")]
    pub heartbeat_ms: u64,

    /// First reconnect delay in milliseconds; doubles per failed attempt.
    #[arg(long, default_value_t = 1_000, env = "TOLA_RECONNECT_BASE_MS")]
    pub reconnect_base_ms: u64,

    /// Upper bound on the reconnect delay in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "TOLA_RECONNECT_MAX_MS")]
    pub reconnect_max_ms: u64,

    /// Pause between a token refresh and the reconnect that follows it.
    #[arg(long, default_value_t = 100, env = "TOLA_TOKEN_REFRESH_DELAY_MS")]
    pub token_refresh_delay_ms: u64,

    /// Timeout for REST requests in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "TOLA_HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: u64,

    /// Ring the terminal bell when a notification arrives.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "TOLA_SOUND")]
    pub sound: bool,
}

impl AdminConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn token_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.token_refresh_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Resolve the state directory.
    ///
    /// Uses `--state-dir`, then `$XDG_STATE_HOME/tola`, then
    /// `$HOME/.local/state/tola`, then `.tola`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("tola");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/tola");
        }
        PathBuf::from(".tola")
    }

    /// Path of the persisted session file.
    pub fn session_path(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }

    /// Build a config for tests with short timers.
    #[doc(hidden)]
    pub fn test(api_url: &str, ws_url: &str) -> Self {
        Self {
            api_url: api_url.to_owned(),
            ws_url: ws_url.to_owned(),
            state_dir: Some(std::env::temp_dir().join(format!("tola-test-{}", std::process::id()))),
            heartbeat_ms: 200,
            reconnect_base_ms: 20,
            reconnect_max_ms: 200,
            token_refresh_delay_ms: 10,
            http_timeout_ms: 2_000,
            sound: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
