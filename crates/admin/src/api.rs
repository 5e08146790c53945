// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST client for the admin backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{extract_error_message, ApiError, ApiErrorKind};
use crate::model::{
    LoginRequest, Notification, NotificationId, NotificationPage, NotificationPreferences,
    PreferencesUpdate, PushSubscriptionCreate, TokenPair,
};
use crate::session::{Session, TokenProvider};

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Notification endpoints used by the live client.
pub trait NotificationApi: Send + Sync + 'static {
    fn list_notifications(&self) -> ApiFuture<'_, Vec<Notification>>;
    fn mark_notification_read(&self, id: NotificationId) -> ApiFuture<'_, ()>;
    fn mark_all_notifications_read(&self) -> ApiFuture<'_, ()>;
}

/// Push subscription endpoints used by the push manager.
pub trait PushApi: Send + Sync + 'static {
    fn vapid_public_key(&self) -> ApiFuture<'_, String>;
    fn register_push(&self, subscription: PushSubscriptionCreate) -> ApiFuture<'_, ()>;
    fn unregister_push(&self, endpoint: String) -> ApiFuture<'_, ()>;
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct VapidKeyResponse {
    public_key: String,
}

/// HTTP client bound to one backend and one session.
pub struct ApiClient {
    base_url: String,
    session: Arc<Session>,
    client: Client,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Fails when the HTTP client cannot be built, e.g. no TLS crypto
    /// provider is installed.
    pub fn new(base_url: &str, session: Arc<Session>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            session,
            client,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with bearer auth, refreshing once on `401`.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let mut retried = false;
        loop {
            let token = self.session.access_token();
            let mut req = self.client.request(method.clone(), self.url(path));
            if let Some(ref token) = token {
                req = req.bearer_auth(token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            let resp = req.send().await.map_err(ApiError::transport)?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED && !retried && self.session.refresh_token().is_some()
            {
                retried = true;
                if self.refresh_after(token.as_deref()).await {
                    continue;
                }
                self.session.clear();
                return Err(ApiError::session_expired());
            }

            let bytes = resp.bytes().await.map_err(ApiError::transport)?;
            if !status.is_success() {
                let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                let kind = ApiErrorKind::from_status(status.as_u16());
                let message = extract_error_message(&body);
                tracing::debug!(path, status = status.as_u16(), %message, "api request failed");
                return Err(ApiError::new(kind, message));
            }
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(ApiError::decode);
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(self.send(Method::GET, path, None).await?)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Concurrent callers share one refresh: whoever acquires the lock second
    /// sees the token already replaced and returns without a network call.
    pub async fn refresh_access_token(&self) -> bool {
        let current = self.session.access_token();
        self.refresh_after(current.as_deref()).await
    }

    async fn refresh_after(&self, stale: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let current = self.session.access_token();
        if current.is_some() && current.as_deref() != stale {
            return true;
        }
        let Some(refresh) = self.session.refresh_token() else {
            return false;
        };
        match do_refresh(&self.client, &self.url("/auth/refresh/"), &refresh).await {
            Ok(pair) => {
                self.session.store_refreshed(pair.access, pair.refresh);
                true
            }
            Err(e) => {
                tracing::warn!(err = %e, "token refresh failed");
                false
            }
        }
    }

    /// `POST /auth/login/` and store the issued tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let body = serde_json::to_value(LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
        })
        .map_err(ApiError::decode)?;
        let pair: TokenPair = decode(self.send(Method::POST, "/auth/login/", Some(&body)).await?)?;
        self.session.set_tokens(pair.access, pair.refresh);
        Ok(())
    }

    /// `POST /auth/logout/`; local tokens are cleared even if the call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = match self.session.refresh_token() {
            Some(refresh) => {
                let body = json!({ "refresh": refresh });
                self.send(Method::POST, "/auth/logout/", Some(&body)).await.map(|_| ())
            }
            None => Ok(()),
        };
        self.session.clear();
        result
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let page: NotificationPage = self.get("/notifications/notifications/").await?;
        Ok(page.into_vec())
    }

    pub async fn mark_read(&self, id: NotificationId) -> Result<(), ApiError> {
        let path = format!("/notifications/notifications/{id}/mark_read/");
        self.send(Method::POST, &path, None).await.map(|_| ())
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.send(Method::POST, "/notifications/notifications/mark_all_read/", None).await.map(|_| ())
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        let resp: CountResponse = self.get("/notifications/notifications/unread_count/").await?;
        Ok(resp.count)
    }

    pub async fn preferences(&self) -> Result<NotificationPreferences, ApiError> {
        self.get("/notifications/preferences/").await
    }

    pub async fn update_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> Result<NotificationPreferences, ApiError> {
        let body = serde_json::to_value(update).map_err(ApiError::decode)?;
        decode(self.send(Method::PUT, "/notifications/preferences/", Some(&body)).await?)
    }

    pub async fn vapid_key(&self) -> Result<String, ApiError> {
        let resp: VapidKeyResponse = self.get("/notifications/vapid-key/").await?;
        Ok(resp.public_key)
    }

    pub async fn subscribe_push(&self, sub: &PushSubscriptionCreate) -> Result<(), ApiError> {
        let body = serde_json::to_value(sub).map_err(ApiError::decode)?;
        self.send(Method::POST, "/notifications/push-subscriptions/", Some(&body)).await.map(|_| ())
    }

    pub async fn unsubscribe_push(&self, endpoint: &str) -> Result<(), ApiError> {
        let body = json!({ "endpoint": endpoint });
        self.send(Method::DELETE, "/notifications/push-subscriptions/unsubscribe/", Some(&body))
            .await
            .map(|_| ())
    }
}

impl NotificationApi for ApiClient {
    fn list_notifications(&self) -> ApiFuture<'_, Vec<Notification>> {
        Box::pin(self.notifications())
    }

    fn mark_notification_read(&self, id: NotificationId) -> ApiFuture<'_, ()> {
        Box::pin(self.mark_read(id))
    }

    fn mark_all_notifications_read(&self) -> ApiFuture<'_, ()> {
        Box::pin(self.mark_all_read())
    }
}

impl PushApi for ApiClient {
    fn vapid_public_key(&self) -> ApiFuture<'_, String> {
        Box::pin(self.vapid_key())
    }

    fn register_push(&self, subscription: PushSubscriptionCreate) -> ApiFuture<'_, ()> {
        Box::pin(async move { self.subscribe_push(&subscription).await })
    }

    fn unregister_push(&self, endpoint: String) -> ApiFuture<'_, ()> {
        Box::pin(async move { self.unsubscribe_push(&endpoint).await })
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::decode)
}

/// Perform a single token refresh request.
pub async fn do_refresh(
    client: &Client,
    refresh_url: &str,
    refresh_token: &str,
) -> anyhow::Result<TokenPair> {
    let resp = client.post(refresh_url).json(&json!({ "refresh": refresh_token })).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("refresh failed ({status}): {text}");
    }

    let pair: TokenPair = resp.json().await?;
    Ok(pair)
}
