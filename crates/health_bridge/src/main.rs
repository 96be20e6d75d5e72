use std::sync::Arc;

use health_bridge::config::{load_with, log_filter_with};
use health_bridge::http::{AppState, router};
use health_bridge::observability::env_filter;
use health_bridge::{AcquisitionScope, HealthProvider, MethodChannel, Orchestrator};
use health_provider_client::http_client::ReqwestHealthProvider;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let log_env = log_filter_with(|k| std::env::var(k).ok());
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter(&log_env))
        .init();
    info!(%log_env, "health_bridge: log filter");

    let handle = PrometheusBuilder::new().install_recorder()?;

    let (config, provider_config) = load_with(|k| std::env::var(k).ok())?;
    let provider: Arc<dyn HealthProvider> =
        Arc::new(ReqwestHealthProvider::from_config(&provider_config));

    let scope = AcquisitionScope::new();
    let orchestrator = Orchestrator::new(provider, config.acquisition.clone(), scope.clone());
    let state = Arc::new(AppState {
        channel: MethodChannel::new(orchestrator),
        metrics: handle,
        scope: scope.clone(),
    });
    let app = router(state, config.request_timeout());

    let addr = config.address;
    info!(
        %addr,
        provider = %provider_config.base_url,
        window_hours = config.acquisition.window_hours,
        "starting HTTP server"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl+c: {e}");
            }
            info!("shutting down; cancelling in-flight acquisitions");
            scope.cancel();
        })
        .await?;

    Ok(())
}
