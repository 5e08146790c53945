// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access/refresh token storage and refresh notifications.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Source of the bearer token used by REST calls and the notification socket.
pub trait TokenProvider: Send + Sync + 'static {
    /// Current access token, if signed in.
    fn access_token(&self) -> Option<String>;

    /// Receiver that changes every time a refreshed token has been stored.
    /// Dropping the receiver unsubscribes.
    fn subscribe_refresh(&self) -> watch::Receiver<u64>;
}

/// Tokens as persisted on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Signed-in session: holds tokens, persists them, and announces refreshes.
pub struct Session {
    tokens: RwLock<StoredTokens>,
    path: Option<PathBuf>,
    refreshed: watch::Sender<u64>,
}

impl Session {
    /// Session that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_tokens(StoredTokens::default(), None)
    }

    /// Load the session persisted at `path`; a missing file yields an empty session.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let tokens = if path.exists() { load(path)? } else { StoredTokens::default() };
        Ok(Self::with_tokens(tokens, Some(path.to_owned())))
    }

    fn with_tokens(tokens: StoredTokens, path: Option<PathBuf>) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self { tokens: RwLock::new(tokens), path, refreshed }
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().refresh.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.read().access.is_some()
    }

    /// Store a new token pair (login). Does not count as a refresh.
    pub fn set_tokens(&self, access: String, refresh: Option<String>) {
        {
            let mut tokens = self.tokens.write();
            tokens.access = Some(access);
            if refresh.is_some() {
                tokens.refresh = refresh;
            }
        }
        self.persist();
    }

    /// Store a refreshed access token and wake refresh subscribers.
    ///
    /// The token is persisted before subscribers are notified.
    pub fn store_refreshed(&self, access: String, refresh: Option<String>) {
        self.set_tokens(access, refresh);
        self.refreshed.send_modify(|generation| *generation += 1);
        tracing::debug!(generation = *self.refreshed.borrow(), "access token refreshed");
    }

    /// Forget both tokens (logout or failed refresh).
    pub fn clear(&self) {
        *self.tokens.write() = StoredTokens::default();
        self.persist();
    }

    fn persist(&self) {
        let Some(ref path) = self.path else {
            return;
        };
        let snapshot = self.tokens.read().clone();
        if let Err(e) = save(path, &snapshot) {
            tracing::warn!(path = %path.display(), err = %e, "failed to persist session");
        }
    }
}

impl TokenProvider for Session {
    fn access_token(&self) -> Option<String> {
        self.tokens.read().access.clone()
    }

    fn subscribe_refresh(&self) -> watch::Receiver<u64> {
        self.refreshed.subscribe()
    }
}

/// Load persisted tokens from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<StoredTokens> {
    let contents = std::fs::read_to_string(path)?;
    let tokens: StoredTokens = serde_json::from_str(&contents)?;
    Ok(tokens)
}

/// Save tokens atomically (write tmp + rename).
///
/// The temp name carries PID and a counter so concurrent saves never share
/// a partially written file.
pub fn save(path: &Path, tokens: &StoredTokens) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(tokens)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
