// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Receives contact-form submissions and relays them to an email provider.
//!
//! ## Configuration
//!
//! Configuration is read from an optional file (`--config`) and environment
//! variables prefixed `RELAY__`, with `.env` loaded first:
//!
//! - `RELAY__BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RELAY__RATE_LIMIT__MAX_REQUESTS`: Admissions per window (default: 5)
//! - `RELAY__RATE_LIMIT__WINDOW_MINUTES`: Window length (default: 15)
//! - `RELAY__RATE_LIMIT__BACKEND`: `memory` or `redis` (default: memory)
//! - `RELAY__BOT_CHECK__SECRET`: Enables bot-score verification
//! - `RELAY__DELIVERY__API_KEY`, `RELAY__DELIVERY__FROM`, `RELAY__DELIVERY__TO`

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{
    config::Config,
    handlers::{router, AppState},
};

#[derive(Parser)]
#[command(name = "contact-relay", about = "Contact form relay service")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!(
        bind_addr = %config.bind_addr,
        endpoint = %config.endpoint_path,
        max_requests = config.rate_limit.max_requests,
        window_minutes = config.rate_limit.window_minutes,
        key = ?config.rate_limit.key,
        backend = ?config.rate_limit.backend,
        bot_check = config.bot_check.secret.is_some(),
        "Starting contact relay"
    );

    let addr: SocketAddr = config.bind_addr.parse()?;
    let sweep_interval = config.rate_limit.sweep_interval();
    let state = Arc::new(AppState::from_config(config).await?);

    // Spawn sweep task
    if sweep_interval.is_zero() {
        warn!("Admission sweep disabled");
    } else {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                sweep_state.pipeline.limiter().sweep().await;
            }
        });
    }

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
