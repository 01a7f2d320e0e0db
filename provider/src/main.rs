use axum::{Json, Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use scorm_provider::config::Config;
use scorm_provider::session::ScoContext;
use scorm_provider::{MemoryBackend, ProviderConfig, ScormProvider, scorm_routes};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    scorm_connected: bool,
}

async fn health(sco: ScoContext) -> Json<HealthResponse> {
    let connected = sco.scorm_state().api_connected;
    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        scorm_connected: connected,
    })
}

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Build the demo backend from configuration
fn demo_backend(config: &Config) -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    if let Some(ref name) = config.demo.learner_name {
        backend = backend.with_learner_name(name);
    }
    if let Some(ref data) = config.demo.suspend_data {
        backend = backend.with_value("cmi.suspend_data", data);
    }
    backend
}

/// Resolves on Ctrl-C, the bridge's equivalent of a page unload
async fn unload_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorm_provider=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, scorm_version={}",
        config.host, config.port, config.scorm.version
    );

    let backend = Arc::new(demo_backend(&config));
    let provider = Arc::new(ScormProvider::new(
        backend,
        ProviderConfig::from(&config.scorm),
    )?);

    let sco = provider.mount().await;
    if !provider.is_connected() {
        warn!("Serving without a SCORM connection; writes will be rejected");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_sco = sco.clone();
    let app = Router::new()
        .route("/health", get(move || health(health_sco.clone())))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .nest("/api/scorm", scorm_routes(sco))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("SCORM bridge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(unload_signal())
        .await?;

    // Same teardown path as a page unload
    provider.unmount().await;
    info!("SCORM bridge stopped");

    Ok(())
}
