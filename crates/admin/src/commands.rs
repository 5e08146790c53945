// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface of `tola-admin`.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::config::AdminConfig;
use crate::model::{Notification, NotificationId, PreferencesUpdate};
use crate::session::Session;

#[derive(Debug, Parser)]
#[command(name = "tola-admin", version, about = "Live notifications for the Tola Tiles admin.")]
pub struct Cli {
    #[command(flatten)]
    pub config: AdminConfig,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TOLA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "TOLA_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and store the session tokens.
    Login {
        #[arg(long, env = "TOLA_USERNAME")]
        username: String,
        #[arg(long, env = "TOLA_PASSWORD")]
        password: String,
    },
    /// Sign out and forget the stored tokens.
    Logout,
    /// Follow live notifications (default).
    Watch,
    /// Print notifications, newest first.
    List {
        /// Only unread notifications.
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification read.
    Read { id: NotificationId },
    /// Mark every notification read.
    ReadAll,
    /// Show or change notification preferences.
    Prefs {
        #[arg(long)]
        sound: Option<Toggle>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Self::On
    }
}

/// Execute a parsed command line.
pub async fn run(cli: Cli, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config = cli.config;
    let session = Arc::new(Session::load(&config.session_path())?);
    let api = Arc::new(ApiClient::new(&config.api_url, Arc::clone(&session), config.http_timeout())?);

    match cli.command.unwrap_or(Command::Watch) {
        Command::Login { username, password } => {
            api.login(&username, &password).await?;
            println!("Logged in as {username}.");
        }
        Command::Logout => {
            if let Err(e) = api.logout().await {
                tracing::warn!(err = %e, "logout request failed; local session cleared");
            }
            println!("Logged out.");
        }
        Command::Watch => crate::watch(&config, session, api, shutdown).await?,
        Command::List { unread } => {
            require_login(&session)?;
            let list = api.notifications().await?;
            for n in list.iter().filter(|n| !unread || !n.is_read) {
                println!("{}", format_line(n));
            }
        }
        Command::Read { id } => {
            require_login(&session)?;
            api.mark_read(id).await?;
            println!("Marked {id} read.");
        }
        Command::ReadAll => {
            require_login(&session)?;
            api.mark_all_read().await?;
            println!("Marked all notifications read.");
        }
        Command::Prefs { sound } => {
            require_login(&session)?;
            let prefs = match sound {
                Some(toggle) => {
                    let update = PreferencesUpdate {
                        sound_enabled: Some(toggle.enabled()),
                        ..Default::default()
                    };
                    api.update_preferences(&update).await?
                }
                None => api.preferences().await?,
            };
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
    }
    Ok(())
}

fn require_login(session: &Session) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("not logged in; run `tola-admin login` first");
    }
    Ok(())
}

/// One-line rendering used by `list`.
pub fn format_line(n: &Notification) -> String {
    let marker = if n.is_read { ' ' } else { '*' };
    let mut line = format!("{marker} {:>6}  {}  {}", n.id, n.created_at, n.title);
    if !n.message.is_empty() {
        line.push_str(" - ");
        line.push_str(&n.message);
    }
    if let Some(url) = n.target_url() {
        line.push_str(&format!(" <{url}>"));
    }
    line
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
