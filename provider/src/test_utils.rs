//! Test Utilities Module
//!
//! Fixtures shared by the unit tests. Only compiled when running tests.

#![cfg(test)]

use crate::backend::MemoryBackend;
use crate::session::provider::{ProviderConfig, ScormProvider};
use std::sync::Arc;

pub const TEST_LEARNER: &str = "Test Learner";

/// Provider over `backend` with default settings for `version`
pub fn provider_with(backend: Arc<MemoryBackend>, version: &str) -> ScormProvider {
    ScormProvider::new(backend, ProviderConfig::new(version))
        .expect("test version should be supported")
}

/// Connected provider over a fresh backend seeded with `TEST_LEARNER`
pub async fn connected_provider(version: &str) -> (ScormProvider, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new().with_learner_name(TEST_LEARNER));
    let provider = provider_with(backend.clone(), version);
    provider
        .connect()
        .await
        .expect("Failed to connect test provider");
    (provider, backend)
}
