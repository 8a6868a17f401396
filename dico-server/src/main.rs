use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use dico_core::{InMemoryWordCorpus, RoomEventBus};
use dico_persistence::{RoomRepository, connection::connect_and_migrate};
use dico_server::{
    auth::AuthService, broadcast::spawn_event_dispatcher, config::Config, create_routes,
    engine::RoomEngine, websocket::ConnectionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting Dico server...");

    let config = Config::from_env()?;

    let words = match &config.words_file {
        Some(path) => InMemoryWordCorpus::new(path)?,
        None => {
            warn!("WORDS_FILE is not set, using the built-in sample word list");
            InMemoryWordCorpus::new_with_test_words()
        }
    };
    if words.is_empty() {
        warn!("Word list is empty, rounds will not be able to start");
    }

    let db = connect_and_migrate(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let engine = RoomEngine::new(
        Arc::new(RoomRepository::new(db)),
        Arc::new(words),
        RoomEventBus::new(config.event_channel_capacity),
        config.engine_config(),
    );

    let connection_manager = Arc::new(ConnectionManager::new());
    let dispatcher = spawn_event_dispatcher(&engine, connection_manager.clone());

    let auth_service = if config.auth_dev_mode {
        info!("Starting in development authentication mode - JWT validation disabled");
        Arc::new(AuthService::new_dev_mode())
    } else {
        let secret = config
            .jwt_secret
            .as_deref()
            .context("JWT_SECRET is required unless AUTH_DEV_MODE=true")?;
        Arc::new(AuthService::new(secret, config.jwt_issuer.as_deref()))
    };

    let routes = create_routes(engine.clone(), connection_manager, auth_service);

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST '{}'", config.host))?;

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown((ip, config.port), async {
            shutdown_signal().await;
        })?;

    info!("Server started on {}. Press Ctrl+C to stop.", addr);
    server.await;

    engine.shutdown();
    dispatcher.abort();
    info!("Server shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigint, mut sigterm) = match (
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
            signal::unix::signal(signal::unix::SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            _ => {
                warn!("Could not install signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
