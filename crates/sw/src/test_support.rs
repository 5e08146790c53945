// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fakes shared by unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use axum::http::StatusCode;
use parking_lot::Mutex;

use crate::cache::MemoryCacheStorage;
use crate::config::SwConfig;
use crate::error::SwError;
use crate::message::{Request, Response};
use crate::platform::{MemoryClients, MemoryNotifier, Network, NetworkFuture};
use crate::worker::{Platform, ServiceWorker};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Scripted upstream. Unknown URLs answer 404; `set_offline` fails everything.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    seen: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn route(&self, url: &str, response: Response) {
        self.routes.lock().insert(url.to_owned(), response);
    }

    pub fn html(&self, url: &str, body: &'static str) {
        self.route(url, Response::html(body));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Network for FakeNetwork {
    fn fetch(&self, request: Request) -> NetworkFuture<'_> {
        Box::pin(async move {
            self.seen.lock().push(request.url.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(SwError::Network("connection refused".to_owned()));
            }
            Ok(self
                .routes
                .lock()
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND, "not found")))
        })
    }
}

/// A worker wired to in-memory platform services.
pub struct Harness {
    pub network: Arc<FakeNetwork>,
    pub caches: Arc<MemoryCacheStorage>,
    pub notifier: Arc<MemoryNotifier>,
    pub clients: Arc<MemoryClients>,
    pub config: SwConfig,
}

impl Harness {
    /// Upstream that serves every precache URL of the test config.
    pub fn new() -> Self {
        let config = SwConfig::test("http://upstream.invalid");
        let network = Arc::new(FakeNetwork::default());
        for url in &config.precache {
            network.route(url, Response::html(format!("cached {url}")));
        }
        Self {
            network,
            caches: Arc::new(MemoryCacheStorage::new()),
            notifier: Arc::new(MemoryNotifier::default()),
            clients: Arc::new(MemoryClients::default()),
            config,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            caches: Arc::clone(&self.caches) as _,
            network: Arc::clone(&self.network) as _,
            notifier: Arc::clone(&self.notifier) as _,
            clients: Arc::clone(&self.clients) as _,
        }
    }

    pub fn worker(&self) -> ServiceWorker {
        ServiceWorker::new(&self.config, self.platform())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
