// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use chaosmeme_hub_server::{
    api::router,
    config::{Config, DEFAULT_LOG_FILTER},
    providers::telegram::{BotApi, TelegramClient},
    state::AppState,
    storage::{init_market_store, settlement_backend},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    info!(?config, "Configuration loaded");

    let market = init_market_store(&config)?;
    let settlement = settlement_backend(market.as_ref());
    let telegram: Arc<dyn BotApi> = Arc::new(TelegramClient::from_config(&config)?);

    if let Some(url) = &config.webhook_url {
        if let Err(e) = telegram
            .set_webhook(url, config.webhook_secret.as_deref())
            .await
        {
            warn!(error = %e, "Webhook registration failed; continuing with existing registration");
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let tls = config.tls.clone();
    let mut state = AppState::new(config, telegram, settlement);
    if let Some(market) = market {
        state = state.with_market(market);
    }
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let shutdown = CancellationToken::new();
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    tokio::spawn({
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match tls {
        Some(tls) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "failed to install rustls crypto provider")?;
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;

            info!("ChaosMeme Hub listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            info!("ChaosMeme Hub listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    info!("Server stopped");
    Ok(())
}
