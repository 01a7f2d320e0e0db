//! Capability object handed to consumers of a mounted provider

use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

use super::provider::{ScoreWrite, ScormError, ScormProvider};
use super::state::{CompletionStatus, Score, ScormState, SuspendData};

/// Cheap-to-clone handle exposing the provider's operations.
///
/// This is what consumers receive instead of subscribing to the provider
/// directly: pass it down as an argument, or let a framework inject it (the
/// HTTP bridge takes it from axum `State`).
#[derive(Clone)]
pub struct ScoContext {
    provider: Arc<ScormProvider>,
}

impl ScoContext {
    pub fn new(provider: Arc<ScormProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<ScormProvider> {
        &self.provider
    }

    /// Current mirrored state
    pub fn scorm_state(&self) -> ScormState {
        self.provider.state()
    }

    pub async fn get_suspend_data(&self) -> Result<SuspendData, ScormError> {
        self.provider.get_suspend_data().await
    }

    pub async fn set_suspend_data(
        &self,
        key: Option<&str>,
        value: Option<Value>,
    ) -> Result<SuspendData, ScormError> {
        self.provider.set_suspend_data(key, value).await
    }

    pub async fn clear_suspend_data(&self) -> Result<SuspendData, ScormError> {
        self.provider.clear_suspend_data().await
    }

    pub async fn set_status(
        &self,
        status: &str,
        defer_save: bool,
    ) -> Result<CompletionStatus, ScormError> {
        self.provider.set_status(status, defer_save).await
    }

    pub async fn set_score(&self, score: Score) -> Result<Vec<ScoreWrite>, ScormError> {
        self.provider.set_score(score).await
    }

    pub async fn set(
        &self,
        param: &str,
        value: impl Display,
        defer_save: bool,
    ) -> Result<(String, String), ScormError> {
        self.provider.set(param, value, defer_save).await
    }

    pub fn get(&self, param: &str) -> Option<String> {
        self.provider.get(param)
    }
}

/// Wrap `consumer` so callers only supply its own props; the capability
/// object is injected as the second argument.
pub fn with_scorm<P, R, F>(sco: ScoContext, consumer: F) -> impl Fn(P) -> R
where
    F: Fn(P, &ScoContext) -> R,
{
    move |props| consumer(props, &sco)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::connected_provider;
    use serde_json::json;

    #[tokio::test]
    async fn test_with_scorm_injects_capability() {
        let (provider, _backend) = connected_provider("2004").await;
        let sco = ScoContext::new(Arc::new(provider));

        let greeting = with_scorm(sco.clone(), |prefix: String, sco: &ScoContext| {
            format!("{} {}", prefix, sco.scorm_state().learner_name)
        });

        assert_eq!(greeting("Welcome back,".to_string()), "Welcome back, Test Learner");
    }

    #[tokio::test]
    async fn test_clones_share_one_provider() {
        let (provider, _backend) = connected_provider("2004").await;
        let sco = ScoContext::new(Arc::new(provider));
        let other = sco.clone();

        sco.set_suspend_data(Some("chapter"), Some(json!("intro")))
            .await
            .unwrap();

        assert_eq!(other.scorm_state().suspend_data["chapter"], json!("intro"));
        assert!(Arc::ptr_eq(sco.provider(), other.provider()));
    }
}
