use crate::backend::SessionBackend;
use crate::session::context::ScoContext;
use crate::session::state::{
    CompletionStatus, SUSPEND_DATA_FIELD, Score, ScormState, ScormVersion, SuspendData,
    decode_suspend_data, encode_suspend_data,
};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Provider errors. Every variant is local to the operation that returned it.
#[derive(Debug, Error)]
pub enum ScormError {
    #[error("SCORM API not connected")]
    NotConnected,

    #[error("could not set: {{ {field}: {value} }}")]
    BackendWriteRejected { field: String, value: String },

    #[error("could not create the SCORM API connection")]
    BackendConnectFailed,

    #[error("could not close the SCORM API connection")]
    BackendDisconnectFailed,

    #[error("could not set the status provided: {0:?}")]
    InvalidStatus(String),

    #[error("could not save the score object provided: {}", .0.join("; "))]
    ScoreRejected(Vec<String>),

    #[error("suspend data is not valid JSON: {0}")]
    SuspendDataDecode(#[from] serde_json::Error),

    #[error("suspend data must be a JSON object, found {0}")]
    SuspendDataNotObject(&'static str),

    #[error("could not encode suspend data: {0}")]
    SuspendDataEncode(#[source] serde_json::Error),

    #[error("unsupported SCORM version: {0:?}")]
    UnsupportedVersion(String),
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Protocol version handed to the backend before init, unchanged
    /// ("1.2", "2004", "2004 4th Edition", ...)
    pub version: String,
    /// Log connection and write failures
    pub debug: bool,
    /// Wait before the single init retry
    pub connect_retry_delay: Duration,
}

impl ProviderConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            version: "2004".to_string(),
            debug: false,
            connect_retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Init (or its retry) is in flight. `close_requested` is set when a
    /// teardown arrives before the connection is up.
    Connecting { close_requested: bool },
    Connected,
}

/// One write performed on behalf of `set_score`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreWrite {
    Field { field: String, value: String },
    Status { status: CompletionStatus },
}

struct Inner {
    link: LinkState,
    state: ScormState,
    /// Version the backend reported at connect; selects score field paths
    version: ScormVersion,
}

impl Inner {
    fn ensure_connected(&self) -> Result<(), ScormError> {
        if self.link == LinkState::Connected {
            Ok(())
        } else {
            Err(ScormError::NotConnected)
        }
    }
}

/// Resets `Connecting` to `Disconnected` when a connect is dropped mid-flight
struct ConnectingGuard<'a> {
    inner: &'a RwLock<Inner>,
    armed: bool,
}

impl ConnectingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.write();
        if matches!(inner.link, LinkState::Connecting { .. }) {
            debug!("connect dropped before completing, link reset");
            inner.link = LinkState::Disconnected;
        }
    }
}

/// Owns one backend connection and mirrors its state for consumers.
///
/// Backend calls happen while the state lock is held, so calls never
/// interleave. The lock is never held across an await.
pub struct ScormProvider {
    backend: Arc<dyn SessionBackend>,
    config: ProviderConfig,
    version: ScormVersion,
    inner: RwLock<Inner>,
}

impl ScormProvider {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        config: ProviderConfig,
    ) -> Result<Self, ScormError> {
        let version: ScormVersion = config.version.parse()?;
        Ok(Self {
            backend,
            config,
            version,
            inner: RwLock::new(Inner {
                link: LinkState::Disconnected,
                state: ScormState::default(),
                version,
            }),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn link_state(&self) -> LinkState {
        self.inner.read().link
    }

    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }

    /// Snapshot of the mirrored session state
    pub fn state(&self) -> ScormState {
        self.inner.read().state.clone()
    }

    /// Connect and hand out the capability object. A failed connect is logged
    /// (when debug is on) and otherwise tolerated.
    pub async fn mount(self: &Arc<Self>) -> ScoContext {
        if let Err(e) = self.connect().await {
            debug!("ScormProvider mounted without a connection: {}", e);
        }
        ScoContext::new(Arc::clone(self))
    }

    /// Tear the connection down; failures are logged and tolerated
    pub async fn unmount(&self) {
        if let Err(e) = self.close().await {
            debug!("ScormProvider unmounted with an open connection: {}", e);
        }
    }

    /// Run the teardown path once `signal` resolves (host page unload,
    /// process shutdown, ...)
    pub fn close_on<F>(self: &Arc<Self>, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            signal.await;
            info!("Unload signal received, closing SCORM session");
            provider.unmount().await;
        })
    }

    /// Open the backend connection, retrying init once after
    /// `connect_retry_delay`.
    pub async fn connect(&self) -> Result<(), ScormError> {
        {
            let mut inner = self.inner.write();
            if inner.link != LinkState::Disconnected {
                debug!("connect ignored, link is {:?}", inner.link);
                return Ok(());
            }
            inner.link = LinkState::Connecting {
                close_requested: false,
            };
        }
        let guard = ConnectingGuard {
            inner: &self.inner,
            armed: true,
        };

        self.backend.set_version(&self.config.version);
        if self.config.debug {
            info!("------ ScormProvider debug mode is on ------");
            self.backend.set_debug(true);
        }

        let mut opened = self.backend.init();
        if !opened {
            debug!(
                "SCORM init refused, retrying in {:?}",
                self.config.connect_retry_delay
            );
            tokio::time::sleep(self.config.connect_retry_delay).await;
            opened = self.backend.init();
        }

        if !opened {
            self.inner.write().link = LinkState::Disconnected;
            guard.disarm();
            counter!("scorm_connects_total", "outcome" => "failed").increment(1);
            if self.config.debug {
                error!("ScormProvider init error: could not create the SCORM API connection");
            }
            return Err(ScormError::BackendConnectFailed);
        }

        let (close_requested, reported_version) = {
            let mut inner = self.inner.write();
            let reported = self.backend.version();
            let version: ScormVersion = reported.parse().unwrap_or(self.version);
            let learner_name = self
                .backend
                .get(version.learner_name_field())
                .unwrap_or_default();
            let completion_status =
                CompletionStatus::from_backend(self.backend.get_status().as_deref());

            let close_requested = matches!(
                inner.link,
                LinkState::Connecting {
                    close_requested: true
                }
            );
            inner.link = LinkState::Connected;
            inner.version = version;
            inner.state = ScormState {
                api_connected: true,
                learner_name,
                completion_status,
                suspend_data: SuspendData::new(),
                scorm_version: reported.clone(),
            };
            (close_requested, reported)
        };
        guard.disarm();

        counter!("scorm_connects_total", "outcome" => "connected").increment(1);
        info!("SCORM API connected (version {})", reported_version);

        if close_requested {
            debug!("close was requested while connecting, tearing down");
            return self.close().await;
        }

        if let Err(e) = self.get_suspend_data().await
            && self.config.debug
        {
            warn!("ScormProvider could not load suspend data: {}", e);
        }
        Ok(())
    }

    /// Push local state to the backend and quit. Steps run best-effort; the
    /// state only resets when quit succeeds.
    pub async fn close(&self) -> Result<(), ScormError> {
        let mut inner = self.inner.write();
        match &mut inner.link {
            LinkState::Disconnected => return Ok(()),
            LinkState::Connecting { close_requested } => {
                *close_requested = true;
                debug!("close deferred until the pending connect finishes");
                return Ok(());
            }
            LinkState::Connected => {}
        }

        let pushed = encode_suspend_data(&inner.state.suspend_data)
            .and_then(|encoded| self.write(SUSPEND_DATA_FIELD, &encoded));
        if let Err(e) = pushed
            && self.config.debug
        {
            warn!("ScormProvider close: suspend data not pushed: {}", e);
        }

        let status = inner.state.completion_status;
        if !self.backend.set_status(status.as_str()) && self.config.debug {
            warn!("ScormProvider close: status {} not pushed", status);
        }

        self.save();

        if self.backend.quit() {
            inner.link = LinkState::Disconnected;
            inner.state = ScormState::default();
            inner.version = self.version;
            info!("SCORM API disconnected");
            Ok(())
        } else {
            if self.config.debug {
                error!("ScormProvider error: could not close the API connection");
            }
            Err(ScormError::BackendDisconnectFailed)
        }
    }

    /// Reload suspend data from the backend into the mirror
    pub async fn get_suspend_data(&self) -> Result<SuspendData, ScormError> {
        let mut inner = self.inner.write();
        inner.ensure_connected()?;

        let raw = self.backend.get(SUSPEND_DATA_FIELD);
        let data = decode_suspend_data(raw.as_deref())?;
        inner.state.suspend_data = data.clone();
        Ok(data)
    }

    /// Merge `{key: value}` into the suspend data and write it back. With
    /// either argument absent the current mirror is written unchanged.
    pub async fn set_suspend_data(
        &self,
        key: Option<&str>,
        value: Option<serde_json::Value>,
    ) -> Result<SuspendData, ScormError> {
        let mut inner = self.inner.write();
        inner.ensure_connected()?;

        let mut data = inner.state.suspend_data.clone();
        if let (Some(key), Some(value)) = (key, value) {
            data.insert(key.to_string(), value);
        }
        let encoded = encode_suspend_data(&data)?;
        self.write(SUSPEND_DATA_FIELD, &encoded)?;

        inner.state.suspend_data = data.clone();
        self.save();
        Ok(data)
    }

    pub async fn clear_suspend_data(&self) -> Result<SuspendData, ScormError> {
        let mut inner = self.inner.write();
        inner.ensure_connected()?;

        let empty = SuspendData::new();
        self.write(SUSPEND_DATA_FIELD, &encode_suspend_data(&empty)?)?;

        inner.state.suspend_data = empty.clone();
        self.save();
        Ok(empty)
    }

    /// Set the completion status. `defer_save` skips the trailing save for
    /// callers batching several writes.
    pub async fn set_status(
        &self,
        status: &str,
        defer_save: bool,
    ) -> Result<CompletionStatus, ScormError> {
        let mut inner = self.inner.write();
        inner.ensure_connected()?;

        let parsed: CompletionStatus = status.parse().inspect_err(|_| {
            if self.config.debug {
                error!("ScormProvider setStatus error: could not set the status provided");
            }
        })?;

        counter!("scorm_backend_writes_total").increment(1);
        if !self.backend.set_status(parsed.as_str()) {
            counter!("scorm_backend_write_failures_total").increment(1);
            return Err(ScormError::BackendWriteRejected {
                field: inner.version.status_field().to_string(),
                value: parsed.to_string(),
            });
        }

        inner.state.completion_status = parsed;
        if !defer_save {
            self.save();
        }
        Ok(parsed)
    }

    /// Write every present score part and the optional status, then save once
    pub async fn set_score(&self, score: Score) -> Result<Vec<ScoreWrite>, ScormError> {
        let version = {
            let inner = self.inner.read();
            inner.ensure_connected()?;
            inner.version
        };

        let mut pending: Vec<BoxFuture<'_, Result<ScoreWrite, ScormError>>> = Vec::new();
        for (part, value) in score.numeric_parts() {
            let field = version.score_field(part);
            pending.push(
                async move {
                    self.set(&field, value, true)
                        .await
                        .map(|(field, value)| ScoreWrite::Field { field, value })
                }
                .boxed(),
            );
        }
        if let Some(status) = score.status.as_deref() {
            pending.push(
                async move {
                    self.set_status(status, true)
                        .await
                        .map(|status| ScoreWrite::Status { status })
                }
                .boxed(),
            );
        }

        let mut writes = Vec::new();
        let mut failures = Vec::new();
        for result in join_all(pending).await {
            match result {
                Ok(write) => writes.push(write),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if !failures.is_empty() {
            if self.config.debug {
                error!("ScormProvider setScore error: {}", failures.join("; "));
            }
            return Err(ScormError::ScoreRejected(failures));
        }

        self.save();
        Ok(writes)
    }

    /// Write a single data-model field
    pub async fn set(
        &self,
        param: &str,
        value: impl Display,
        defer_save: bool,
    ) -> Result<(String, String), ScormError> {
        let inner = self.inner.write();
        inner.ensure_connected()?;

        let value = value.to_string();
        self.write(param, &value)?;
        if !defer_save {
            self.save();
        }
        drop(inner);
        Ok((param.to_string(), value))
    }

    /// Read a data-model field. `None` when disconnected.
    pub fn get(&self, param: &str) -> Option<String> {
        let inner = self.inner.read();
        if inner.ensure_connected().is_err() {
            return None;
        }
        self.backend.get(param)
    }

    fn write(&self, field: &str, value: &str) -> Result<(), ScormError> {
        counter!("scorm_backend_writes_total").increment(1);
        if self.backend.set(field, value) {
            Ok(())
        } else {
            counter!("scorm_backend_write_failures_total").increment(1);
            Err(ScormError::BackendWriteRejected {
                field: field.to_string(),
                value: value.to_string(),
            })
        }
    }

    fn save(&self) {
        counter!("scorm_saves_total").increment(1);
        if !self.backend.save() {
            debug!("SCORM backend reported a failed save");
        }
    }
}
