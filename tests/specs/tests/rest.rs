// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST client, push registration and `tola-admin` commands against a mock
//! backend.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tola_admin::api::{ApiClient, PushApi};
use tola_admin::error::ApiErrorKind;
use tola_admin::model::PreferencesUpdate;
use tola_admin::push::{Permission, PlatformFuture, PlatformSubscription, PushPlatform, PushSubscriptionManager};
use tola_admin::session::{Session, TokenProvider};
use tola_specs::{notification, run_admin, MockBackend, PASSWORD, REFRESH_TOKEN, USERNAME};

const TIMEOUT: Duration = Duration::from_secs(2);

fn api_for(backend: &MockBackend, session: Arc<Session>) -> anyhow::Result<Arc<ApiClient>> {
    Ok(Arc::new(ApiClient::new(&backend.api_url(), session, TIMEOUT)?))
}

fn signed_in(backend: &MockBackend) -> Arc<Session> {
    let session = Arc::new(Session::in_memory());
    session.set_tokens(backend.issue_token(), Some(REFRESH_TOKEN.to_owned()));
    session
}

// -- Auth ---------------------------------------------------------------------

#[tokio::test]
async fn login_persists_tokens() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");

    let session = Arc::new(Session::load(&path)?);
    api_for(&backend, Arc::clone(&session))?.login(USERNAME, PASSWORD).await?;

    let reloaded = Session::load(&path)?;
    assert!(reloaded.is_authenticated());
    assert_eq!(reloaded.refresh_token().as_deref(), Some(REFRESH_TOKEN));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let session = Arc::new(Session::in_memory());

    let err = api_for(&backend, Arc::clone(&session))?.login(USERNAME, "wrong").await.err();

    assert_eq!(err.map(|e| e.kind), Some(ApiErrorKind::Unauthorized));
    assert!(!session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.seed(vec![notification(1, "Lead", false)]);
    let session = signed_in(&backend);
    let api = api_for(&backend, Arc::clone(&session))?;
    let before = session.access_token();
    backend.expire_access_tokens();

    let list = api.notifications().await?;

    assert_eq!(list.len(), 1);
    assert_eq!(backend.refresh_count(), 1);
    assert_ne!(session.access_token(), before);
    Ok(())
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let session = signed_in(&backend);
    let api = api_for(&backend, session)?;
    backend.expire_access_tokens();

    let (a, b, c) = tokio::join!(api.unread_count(), api.preferences(), api.notifications());
    a?;
    b?;
    c?;

    assert_eq!(backend.refresh_count(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_clears_the_session() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let session = Arc::new(Session::in_memory());
    session.set_tokens("access-stale".to_owned(), Some("refresh-revoked".to_owned()));
    let api = api_for(&backend, Arc::clone(&session))?;

    let err = api.notifications().await.err();

    assert_eq!(err.map(|e| e.kind), Some(ApiErrorKind::SessionExpired));
    assert!(!session.is_authenticated());
    assert_eq!(session.refresh_token(), None);
    Ok(())
}

// -- Notifications and preferences --------------------------------------------

#[tokio::test]
async fn unread_count_and_mark_read() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.seed(vec![notification(2, "b", false), notification(1, "a", false)]);
    let api = api_for(&backend, signed_in(&backend))?;

    assert_eq!(api.unread_count().await?, 2);
    api.mark_read(1).await?;
    assert_eq!(api.unread_count().await?, 1);
    api.mark_all_read().await?;
    assert_eq!(api.unread_count().await?, 0);

    let err = api.mark_read(99).await.err();
    assert_eq!(err.map(|e| e.kind), Some(ApiErrorKind::NotFound));
    Ok(())
}

#[tokio::test]
async fn preferences_update_is_partial() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let api = api_for(&backend, signed_in(&backend))?;

    let update = PreferencesUpdate { sound_enabled: Some(false), ..Default::default() };
    let prefs = api.update_preferences(&update).await?;

    assert!(!prefs.sound_enabled);
    assert!(prefs.new_lead_enabled);
    assert_eq!(api.preferences().await?, prefs);
    Ok(())
}

// -- Push registration --------------------------------------------------------

struct BrowserPush {
    current: Mutex<Option<PlatformSubscription>>,
}

impl BrowserPush {
    fn new() -> Arc<Self> {
        Arc::new(Self { current: Mutex::new(None) })
    }
}

impl PushPlatform for BrowserPush {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> PlatformFuture<'_, Permission> {
        Box::pin(async { Permission::Granted })
    }

    fn subscribe(&self, key: Vec<u8>) -> PlatformFuture<'_, Result<PlatformSubscription, String>> {
        Box::pin(async move {
            if key != b"hello?" {
                return Err(format!("unexpected application server key {key:?}"));
            }
            let sub = PlatformSubscription {
                endpoint: "https://push.example/send/abc".to_owned(),
                p256dh: "BNcRd".to_owned(),
                auth: "tBHI".to_owned(),
            };
            *self.current.lock() = Some(sub.clone());
            Ok(sub)
        })
    }

    fn current_subscription(
        &self,
    ) -> PlatformFuture<'_, Result<Option<PlatformSubscription>, String>> {
        Box::pin(async move { Ok(self.current.lock().clone()) })
    }

    fn unsubscribe(&self) -> PlatformFuture<'_, Result<(), String>> {
        Box::pin(async move {
            *self.current.lock() = None;
            Ok(())
        })
    }

    fn user_agent(&self) -> String {
        "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0".to_owned()
    }
}

#[tokio::test]
async fn push_subscription_round_trips_through_backend() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let api = api_for(&backend, signed_in(&backend))?;
    let manager = PushSubscriptionManager::new(BrowserPush::new(), api as Arc<dyn PushApi>);

    manager.subscribe_to_push().await?;

    assert!(manager.is_push_subscribed());
    let subs = backend.subscriptions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["endpoint"], "https://push.example/send/abc");
    assert_eq!(subs[0]["p256dh_key"], "BNcRd");
    assert_eq!(subs[0]["device_name"], "Desktop");

    manager.unsubscribe_from_push().await?;

    assert!(!manager.is_push_subscribed());
    assert!(backend.subscriptions().is_empty());
    Ok(())
}

// -- Binary -------------------------------------------------------------------

#[tokio::test]
async fn cli_login_then_list() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.seed(vec![notification(7, "Quote accepted", false), notification(3, "Old lead", true)]);
    let dir = tempfile::tempdir()?;

    let out =
        run_admin(&backend, dir.path(), &["login", "--username", USERNAME, "--password", PASSWORD])
            .await?;
    assert!(out.contains("Logged in as admin"));

    let all = run_admin(&backend, dir.path(), &["list"]).await?;
    assert_eq!(all.lines().count(), 2);
    assert!(all.lines().next().is_some_and(|l| l.starts_with('*') && l.contains("Quote accepted")));

    let unread = run_admin(&backend, dir.path(), &["list", "--unread"]).await?;
    assert_eq!(unread.lines().count(), 1);

    run_admin(&backend, dir.path(), &["read-all"]).await?;
    assert!(backend.stored().iter().all(|n| n["is_read"] == true));
    Ok(())
}
