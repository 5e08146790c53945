// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tola admin notifications: REST client, live socket client and push
//! subscription management.

pub mod alert;
pub mod api;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod protocol;
pub mod push;
pub mod session;
pub mod store;


use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::alert::{Chime, Silent, TerminalBell};
use crate::api::{ApiClient, NotificationApi};
use crate::client::{ClientEvent, ClientOptions, NotificationClient};
use crate::config::AdminConfig;
use crate::protocol::CLOSE_AUTH_REJECTED;
use crate::session::Session;

/// Follow live notifications until `shutdown` fires.
///
/// Loads the current list over REST, then keeps the socket open. If the
/// socket is rejected for auth, the access token is refreshed and the refresh
/// itself triggers the reconnect. The refreshed token gets one attempt: a
/// second rejection before the server has sent anything ends the watch.
pub async fn watch(
    config: &AdminConfig,
    session: Arc<Session>,
    api: Arc<ApiClient>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("not logged in; run `tola-admin login` first");
    }

    let chime: Arc<dyn Chime> = if config.sound { Arc::new(TerminalBell) } else { Arc::new(Silent) };
    let client = NotificationClient::spawn(
        ClientOptions::from_config(config),
        &config.ws_url,
        session,
        Arc::clone(&api) as Arc<dyn NotificationApi>,
        chime,
    );
    let mut events = client.subscribe();

    match api.preferences().await {
        Ok(prefs) => client.set_sound_enabled(config.sound && prefs.sound_enabled),
        Err(e) => tracing::warn!(err = %e, "failed to fetch notification preferences"),
    }

    match client.refetch().await {
        Ok(()) => tracing::info!(
            total = client.notifications().len(),
            unread = client.unread_count(),
            "loaded notifications"
        ),
        Err(e) => tracing::warn!(err = %e, "continuing without initial notification list"),
    }

    client.connect();

    // Set after a refresh until the server shows it accepted the new token.
    let mut awaiting_accept = false;
    let result = loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            event = events.recv() => event,
        };
        match event {
            Ok(ClientEvent::Connected) => tracing::info!("live notifications connected"),
            Ok(ClientEvent::Disconnected { code }) if code == CLOSE_AUTH_REJECTED => {
                if awaiting_accept {
                    tracing::error!("notification socket rejected a freshly refreshed token");
                    break Err(anyhow::anyhow!(
                        "session expired: live notifications rejected a refreshed token; run `tola-admin login` again"
                    ));
                }
                tracing::warn!("notification socket rejected the access token");
                if !api.refresh_access_token().await {
                    break Err(anyhow::anyhow!("session expired; run `tola-admin login` again"));
                }
                awaiting_accept = true;
            }
            Ok(ClientEvent::Disconnected { code }) => {
                awaiting_accept = false;
                tracing::info!(code, "live notifications disconnected");
            }
            Ok(ClientEvent::NewNotification(n)) => {
                awaiting_accept = false;
                println!("[{}] {}: {}", n.created_at, n.title, n.message);
            }
            Ok(ClientEvent::UnreadCount(count)) => {
                awaiting_accept = false;
                tracing::debug!(count, "unread count");
            }
            Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "event subscriber lagged"),
            Err(RecvError::Closed) => break Ok(()),
        }
    };

    client.shutdown().await;
    result
}
