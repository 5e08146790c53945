// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream HTTP for the worker's fetch handler.

use std::time::Duration;

use axum::http::header::{self, HeaderName};
use axum::http::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::error::SwError;
use crate::message::{Request, Response};
use crate::platform::{Network, NetworkFuture};

/// Headers scoped to a single hop that must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// [`Network`] backed by a single upstream origin.
///
/// Redirects are handed back to the browser rather than followed.
pub struct HttpNetwork {
    origin: String,
    client: Client,
}

impl HttpNetwork {
    /// Fails when the HTTP client cannot be built, e.g. no TLS crypto
    /// provider is installed.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, SwError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| SwError::Network(format!("build http client: {e}")))?;
        Ok(Self { origin: origin.trim_end_matches('/').to_owned(), client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    async fn send(&self, request: Request) -> Result<Response, SwError> {
        let url = self.url(&request.url);
        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let resp = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| SwError::Network(format!("{url}: {e}")))?;

        let status = resp.status();
        let mut headers = resp.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        let body =
            resp.bytes().await.map_err(|e| SwError::Network(format!("{url}: read body: {e}")))?;
        Ok(Response { status, headers, body })
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: Request) -> NetworkFuture<'_> {
        Box::pin(self.send(request))
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
