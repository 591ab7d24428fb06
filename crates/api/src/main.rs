use api::{AppState, get_configuration, router};
use common::{TelemetryGuard, setup_logging};
use tokio::signal;

const SERVICE_NAME: &str = "logo-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = get_configuration()?;

    let _telemetry = TelemetryGuard::init_optional(SERVICE_NAME, settings.otel_endpoint.as_deref())?;
    setup_logging(SERVICE_NAME, settings.environment);

    tracing::info!(settings = ?settings, "Loaded service settings");

    let state = AppState::new(settings.clone());

    let context = state.context.clone();
    let default_config = settings.default_config.clone();
    let active = tokio::task::spawn_blocking(move || context.reload(&default_config)).await?;
    state.metrics.record_reload(active.predictor.is_placeholder());
    tracing::info!(
        config = ?active.config,
        predictor = %active.identity(),
        "Active configuration"
    );

    let addr = settings.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Logo detection API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
