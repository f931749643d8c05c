//! Daemon lifecycle: startup, upload directory, HTTP server, shutdown

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use rdx_core::config::RdxConfig;
use rdx_engine::{PatternExtractor, Redactor, RedactorSettings};
use std::sync::Arc;
use tracing::info;

use crate::api::{router, AppState};
use crate::metrics::RdxMetrics;

pub async fn run(config: RdxConfig) -> Result<()> {
    info!("daemon starting");

    let settings = RedactorSettings::from(&config);
    tokio::fs::create_dir_all(&settings.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", settings.upload_dir.display()))?;

    let extractor = PatternExtractor::new(config.extraction.min_confidence)?;
    info!(
        upload_dir = %settings.upload_dir.display(),
        min_passkey_len = settings.policy.min_len,
        min_confidence = extractor.min_confidence(),
        timeout_secs = settings.operation_timeout.as_secs(),
        "redactor ready"
    );

    let mut registry = Registry::default();
    let metrics = RdxMetrics::new(&mut registry);
    let state = AppState {
        redactor: Arc::new(Redactor::new(settings, Arc::new(extractor))),
        metrics,
        registry: Arc::new(registry),
    };

    let max_upload_bytes = (config.daemon.max_upload_mb as usize).saturating_mul(1024 * 1024);
    let app = router(state, max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.daemon.listen)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {e}", config.daemon.listen))?;
    info!(addr = %config.daemon.listen, "HTTP: listening");

    notify_ready();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("http server: {e}"))?;

    info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("registering SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("shutdown: SIGINT"),
        _ = terminate => info!("shutdown: SIGTERM"),
    }
}

fn notify_ready() {
    // sd_notify(READY=1) when running under systemd; no-op otherwise
    #[cfg(unix)]
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}
