// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline proxy for the Tola Tiles admin, hosting its service worker.

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod network;
pub mod platform;
pub mod push;
pub mod transport;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::SwConfig;
use crate::transport::{build_router, SwState};

/// Install the worker, then serve until `shutdown` fires.
///
/// A failed install is not fatal: the proxy keeps forwarding requests, just
/// without offline support.
pub async fn run(config: SwConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(SwState::new(&config)?);

    match state.worker.install().await {
        Ok(worker_state) => {
            tracing::info!(state = %worker_state, cache = %state.worker.cache_name(), "worker installed")
        }
        Err(e) => tracing::warn!(err = %e, "worker install failed, serving without offline support"),
    }

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tola-sw listening on {addr}, upstream {}", config.upstream);
    axum::serve(listener, build_router(state)).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
