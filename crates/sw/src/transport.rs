// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface of the offline proxy.
//!
//! Everything outside `/__sw` goes through the worker's fetch handler and,
//! when it declines, straight to the upstream. The `/__sw` routes drive the
//! worker's other events and expose its state.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{CacheStorage, MemoryCacheStorage};
use crate::config::SwConfig;
use crate::error::SwError;
use crate::message::Request;
use crate::network::HttpNetwork;
use crate::platform::{Clients, MemoryClients, MemoryNotifier, Network, Notifier, WindowClient};
use crate::push::{ClickOutcome, DisplayedNotification};
use crate::worker::{Outcome, Platform, ServiceWorker, WorkerEvent, WorkerState};

/// Largest request body the proxy buffers.
const MAX_BODY: usize = 16 * 1024 * 1024;

/// Shared state for the proxy.
pub struct SwState {
    pub worker: ServiceWorker,
    pub caches: Arc<MemoryCacheStorage>,
    pub notifier: Arc<MemoryNotifier>,
    pub clients: Arc<MemoryClients>,
}

impl SwState {
    /// State that proxies to `config.upstream`.
    pub fn new(config: &SwConfig) -> Result<Self, SwError> {
        let network = HttpNetwork::new(&config.upstream, config.upstream_timeout())?;
        Ok(Self::with_network(config, Arc::new(network)))
    }

    /// State with a caller-supplied network, for tests and embedding.
    pub fn with_network(config: &SwConfig, network: Arc<dyn Network>) -> Self {
        let caches = Arc::new(MemoryCacheStorage::new());
        let notifier = Arc::new(MemoryNotifier::default());
        let clients = Arc::new(MemoryClients::default());
        let platform = Platform {
            caches: Arc::clone(&caches) as _,
            network,
            notifier: Arc::clone(&notifier) as _,
            clients: Arc::clone(&clients) as _,
        };
        Self { worker: ServiceWorker::new(config, platform), caches, notifier, clients }
    }
}

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: WorkerState,
    pub cache_name: String,
    pub caches: Vec<String>,
    pub cached_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub displayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<DisplayedNotification>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClickQuery {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClosedResponse {
    pub tag: String,
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttachRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AttachResponse {
    pub id: u64,
}

// -- Router -------------------------------------------------------------------

/// Build the axum `Router` with the control routes and the proxy fallback.
pub fn build_router(state: Arc<SwState>) -> Router {
    Router::new()
        .route("/__sw/status", get(status))
        .route("/__sw/push", post(push))
        .route("/__sw/notifications", get(notifications))
        .route("/__sw/notifications/{tag}/click", post(click))
        .route("/__sw/notifications/{tag}/close", post(close))
        .route("/__sw/clients", get(list_clients).post(attach_client))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// -- Handlers -----------------------------------------------------------------

/// `GET /__sw/status`
async fn status(State(s): State<Arc<SwState>>) -> impl IntoResponse {
    let cache_name = s.worker.cache_name().to_owned();
    Json(StatusResponse {
        state: s.worker.state(),
        caches: s.caches.keys(),
        cached_urls: s.caches.urls(&cache_name),
        cache_name,
    })
}

/// `POST /__sw/push`: the body is the raw push message data.
async fn push(State(s): State<Arc<SwState>>, body: Bytes) -> impl IntoResponse {
    let data = (!body.is_empty()).then_some(body);
    match s.worker.dispatch(WorkerEvent::Push(data)).await {
        Ok(Outcome::Displayed(notification)) => {
            Json(PushResponse { displayed: notification.is_some(), notification }).into_response()
        }
        Ok(other) => unexpected(other).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `GET /__sw/notifications`
async fn notifications(State(s): State<Arc<SwState>>) -> Json<Vec<DisplayedNotification>> {
    Json(s.notifier.displayed())
}

/// `POST /__sw/notifications/{tag}/click?action=`
async fn click(
    State(s): State<Arc<SwState>>,
    Path(tag): Path<String>,
    Query(query): Query<ClickQuery>,
) -> impl IntoResponse {
    let event = WorkerEvent::NotificationClick { tag, action: query.action };
    match s.worker.dispatch(event).await {
        Ok(Outcome::Clicked(outcome)) => Json::<ClickOutcome>(outcome).into_response(),
        Ok(other) => unexpected(other).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /__sw/notifications/{tag}/close`
async fn close(State(s): State<Arc<SwState>>, Path(tag): Path<String>) -> impl IntoResponse {
    let closed = s.notifier.displayed().iter().any(|n| n.tag == tag);
    match s.worker.dispatch(WorkerEvent::NotificationClose { tag: tag.clone() }).await {
        Ok(_) => Json(ClosedResponse { tag, closed }).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `GET /__sw/clients`
async fn list_clients(State(s): State<Arc<SwState>>) -> Json<Vec<WindowClient>> {
    Json(s.clients.match_all())
}

/// `POST /__sw/clients`: simulate a window of the origin being opened.
async fn attach_client(
    State(s): State<Arc<SwState>>,
    Json(req): Json<AttachRequest>,
) -> Json<AttachResponse> {
    Json(AttachResponse { id: s.clients.attach(&req.url) })
}

/// Fallback: the worker's fetch handler, else the upstream as-is.
async fn proxy(State(s): State<Arc<SwState>>, req: axum::extract::Request) -> impl IntoResponse {
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(b) => b,
        Err(e) => {
            return SwError::BadRequest(format!("read body: {e}")).to_http_response().into_response()
        }
    };
    let url = parts.uri.path_and_query().map_or("/", |pq| pq.as_str()).to_owned();
    let request = Request { method: parts.method, url, headers: parts.headers, body };

    if let Some(resp) = s.worker.fetch(request.clone()).await {
        return resp.into_response();
    }
    match s.worker.platform().network.fetch(request).await {
        Ok(resp) => resp.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "upstream request failed");
            e.to_http_response().into_response()
        }
    }
}

fn unexpected(outcome: Outcome) -> impl IntoResponse {
    SwError::InvalidState(format!("unexpected outcome {outcome:?}")).to_http_response()
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
