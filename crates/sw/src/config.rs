// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Admin shell routes and static assets stored on install.
pub const DEFAULT_PRECACHE: &str = "/admin/login,/admin/dashboard,/admin/blog,/admin/blog/calendar,\
/images/logo.png,/images/logo.webp,/images/badge-72.png,/sounds/notification.wav";

/// Configuration for the offline proxy and the worker it hosts.
#[derive(Debug, Clone, clap::Args)]
pub struct SwConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "TOLA_SW_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "TOLA_SW_PORT")]
    pub port: u16,

    /// Origin serving the admin app.
    #[arg(long, default_value = "http://localhost:3000", env = "TOLA_SW_UPSTREAM")]
    pub upstream: String,

    /// Shared prefix of every cache generation.
    #[arg(long, default_value = "tola-admin-", env = "TOLA_SW_CACHE_PREFIX")]
    pub cache_prefix: String,

    /// Current cache generation. Bump on deploy to drop stale entries.
    #[arg(long, default_value = "v5", env = "TOLA_SW_CACHE_VERSION")]
    pub cache_version: String,

    /// Requests whose path contains this are intercepted.
    #[arg(long, default_value = "/admin", env = "TOLA_SW_ADMIN_PATH")]
    pub admin_path: String,

    /// Page served to HTML requests when offline with no cached copy.
    #[arg(long, default_value = "/admin/login", env = "TOLA_SW_LOGIN_PATH")]
    pub login_path: String,

    /// Where a notification click goes when the push carried no URL.
    #[arg(long, default_value = "/admin/notifications", env = "TOLA_SW_NOTIFICATION_FALLBACK")]
    pub notification_fallback: String,

    /// URLs stored on install (comma separated).
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_PRECACHE, env = "TOLA_SW_PRECACHE")]
    pub precache: Vec<String>,

    /// Timeout for upstream requests in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "TOLA_SW_UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,
}

impl SwConfig {
    /// Name of the current cache generation.
    pub fn cache_name(&self) -> String {
        format!("{}{}", self.cache_prefix, self.cache_version)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Build a config for tests.
    #[doc(hidden)]
    pub fn test(upstream: &str) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            upstream: upstream.to_owned(),
            cache_prefix: "tola-admin-".into(),
            cache_version: "v5".into(),
            admin_path: "/admin".into(),
            login_path: "/admin/login".into(),
            notification_fallback: "/admin/notifications".into(),
            precache: vec!["/admin/login".into(), "/images/logo.png".into()],
            upstream_timeout_ms: 2_000,
        }
    }
}
