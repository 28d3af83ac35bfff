pub mod capture;
pub mod common;
pub mod config;
pub mod exec;
pub mod notifier;
pub mod permissions;
pub mod platform;
pub mod proxy;
pub mod settings;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::{info, warn};

use common::AppResult;
use config::HelperConfig;
use platform::Platform;
use proxy::{Dispatcher, ProxyServer};
use settings::FileSettingsStore;

/// Run the helper until SIGINT/SIGTERM.
pub async fn serve(config: HelperConfig) -> AppResult<()> {
    let settings = Arc::new(FileSettingsStore::open(config.settings_path()?));
    info!(path = ?settings.path(), "Settings loaded");

    // Start hot-reload watcher
    if let Err(e) = Arc::clone(&settings).start_watcher() {
        warn!("Failed to start settings watcher: {}", e);
    }

    let dispatcher = Arc::new(Dispatcher::new(settings, Platform::native(), &config));
    let server = Arc::new(ProxyServer::new(config.socket_path()?, dispatcher));
    let listener = server.bind()?;

    let serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve(listener).await })
    };

    shutdown_signal().await;
    server.shutdown();
    if let Err(e) = serving.await {
        warn!("Server task ended abnormally: {}", e);
    }
    info!("Postern helper stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = term.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
