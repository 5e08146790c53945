// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use tola_sw::config::SwConfig;

#[derive(Debug, Parser)]
#[command(name = "tola-sw", version, about = "Offline proxy and push host for the Tola Tiles admin.")]
struct Cli {
    #[command(flatten)]
    config: SwConfig,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TOLA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "TOLA_LOG_FORMAT", default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let _ = rustls::crypto::ring::default_provider().install_default();

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    if let Err(e) = tola_sw::run(cli.config, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}
