// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registers this device's push subscription with the backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::api::PushApi;
use crate::error::PushError;
use crate::model::PushSubscriptionCreate;

pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// A subscription held by the platform push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// The device's push capability.
pub trait PushPlatform: Send + Sync + 'static {
    /// Whether push delivery exists at all here.
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Prompt the user; resolves to the resulting permission.
    fn request_permission(&self) -> PlatformFuture<'_, Permission>;

    /// Create a subscription bound to the application server key.
    fn subscribe(
        &self,
        application_server_key: Vec<u8>,
    ) -> PlatformFuture<'_, Result<PlatformSubscription, String>>;

    fn current_subscription(&self) -> PlatformFuture<'_, Result<Option<PlatformSubscription>, String>>;

    /// Drop the current subscription.
    fn unsubscribe(&self) -> PlatformFuture<'_, Result<(), String>>;

    fn user_agent(&self) -> String;
}

/// Tracks whether this device receives push notifications.
pub struct PushSubscriptionManager {
    platform: Arc<dyn PushPlatform>,
    api: Arc<dyn PushApi>,
    supported: bool,
    subscribed: AtomicBool,
    op_lock: tokio::sync::Mutex<()>,
}

impl PushSubscriptionManager {
    /// Probes platform support once; the answer holds for the manager's lifetime.
    pub fn new(platform: Arc<dyn PushPlatform>, api: Arc<dyn PushApi>) -> Self {
        let supported = platform.is_supported();
        Self { platform, api, supported, subscribed: AtomicBool::new(false), op_lock: Default::default() }
    }

    pub fn is_push_supported(&self) -> bool {
        self.supported
    }

    pub fn is_push_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Mirror the platform's current subscription into local state.
    pub async fn refresh_status(&self) -> bool {
        if !self.supported {
            return false;
        }
        match self.platform.current_subscription().await {
            Ok(sub) => self.subscribed.store(sub.is_some(), Ordering::Release),
            Err(e) => tracing::error!(err = %e, "failed to check push subscription"),
        }
        self.is_push_subscribed()
    }

    /// Ask for permission, subscribe with the backend's VAPID key, and
    /// register the subscription.
    pub async fn subscribe_to_push(&self) -> Result<(), PushError> {
        let _guard = self.op_lock.lock().await;
        self.subscribe_locked().await.inspect_err(|e| {
            tracing::error!(err = %e, "failed to subscribe to push");
        })
    }

    async fn subscribe_locked(&self) -> Result<(), PushError> {
        if !self.supported {
            return Err(PushError::Unsupported);
        }
        if self.platform.request_permission().await != Permission::Granted {
            return Err(PushError::PermissionDenied);
        }

        let key = self.api.vapid_public_key().await?;
        let key = decode_vapid_key(&key)?;
        let sub = self.platform.subscribe(key).await.map_err(PushError::Platform)?;

        let user_agent = self.platform.user_agent();
        self.api
            .register_push(PushSubscriptionCreate {
                endpoint: sub.endpoint,
                p256dh_key: sub.p256dh,
                auth_key: sub.auth,
                device_name: device_name(&user_agent).to_owned(),
                user_agent,
            })
            .await?;

        self.subscribed.store(true, Ordering::Release);
        tracing::info!("push notifications enabled");
        Ok(())
    }

    /// Remove the platform subscription and tell the backend.
    ///
    /// Once the platform side is gone the device counts as unsubscribed,
    /// even if the backend call then fails.
    pub async fn unsubscribe_from_push(&self) -> Result<(), PushError> {
        let _guard = self.op_lock.lock().await;
        let current = self.platform.current_subscription().await.map_err(PushError::Platform)?;
        let Some(sub) = current else {
            self.subscribed.store(false, Ordering::Release);
            return Ok(());
        };

        self.platform.unsubscribe().await.map_err(|e| {
            tracing::error!(err = %e, "failed to unsubscribe from push");
            PushError::Platform(e)
        })?;
        self.subscribed.store(false, Ordering::Release);

        self.api.unregister_push(sub.endpoint).await.map_err(|e| {
            tracing::warn!(err = %e, "backend did not drop push subscription");
            PushError::Api(e)
        })?;
        tracing::info!("push notifications disabled");
        Ok(())
    }

    /// Re-create a subscription the platform revoked behind our back.
    ///
    /// Returns `true` when a new subscription was registered.
    pub async fn resync(&self) -> Result<bool, PushError> {
        if !self.supported || !self.is_push_subscribed() {
            return Ok(false);
        }
        let current = self.platform.current_subscription().await.map_err(PushError::Platform)?;
        if current.is_some() {
            return Ok(false);
        }
        if self.platform.permission() != Permission::Granted {
            tracing::info!("push subscription revoked and permission withdrawn");
            self.subscribed.store(false, Ordering::Release);
            return Ok(false);
        }
        tracing::info!("push subscription revoked, re-subscribing");
        self.subscribed.store(false, Ordering::Release);
        self.subscribe_to_push().await?;
        Ok(true)
    }
}

/// Decode a URL-safe base64 VAPID key, adding any missing padding.
pub fn decode_vapid_key(key: &str) -> Result<Vec<u8>, PushError> {
    let mut padded = key.trim().to_owned();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| PushError::Platform(format!("invalid VAPID key: {e}")))
}

/// Device label stored with the backend record.
pub fn device_name(user_agent: &str) -> &'static str {
    if user_agent.contains("Mobile") {
        "Mobile"
    } else {
        "Desktop"
    }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
