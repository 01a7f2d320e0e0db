//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use scorm_provider::{MemoryBackend, ProviderConfig, ScoContext, ScormProvider, scorm_routes};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_LEARNER: &str = "Grace Hopper";

/// Mounted provider with its backend and bridge router
pub struct TestBridge {
    pub backend: Arc<MemoryBackend>,
    pub provider: Arc<ScormProvider>,
    pub sco: ScoContext,
    pub router: Router,
}

impl TestBridge {
    /// Mount a provider over `backend` and build the router around it
    pub async fn mount(backend: MemoryBackend, version: &str) -> Self {
        let backend = Arc::new(backend);
        let provider = Arc::new(
            ScormProvider::new(backend.clone(), ProviderConfig::new(version))
                .expect("Failed to create provider"),
        );
        let sco = provider.mount().await;
        let router = scorm_routes(sco.clone());
        Self {
            backend,
            provider,
            sco,
            router,
        }
    }

    /// Connected bridge over a backend seeded with `TEST_LEARNER`
    pub async fn connected(version: &str) -> Self {
        Self::mount(MemoryBackend::new().with_learner_name(TEST_LEARNER), version).await
    }

    /// Send `method uri` with an optional JSON body, parse the JSON response
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Option<T>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json).expect("Failed to serialize body"),
                )),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        (status, serde_json::from_slice(&body).ok())
    }
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorm_provider=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
