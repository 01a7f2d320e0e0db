//! In-memory session backend
//!
//! Behaves like a SCORM API wrapper sitting on top of a plain key space. It is
//! the backend the demo bridge runs against and the fake the tests inject.
//!
//! Wrapper conventions it reproduces:
//! - the completion status lives under the version's status field
//! - `init` promotes a missing or `not attempted` status to `incomplete`
//! - `quit` records the exit mode (`suspend` unless the unit is finished) and
//!   saves before closing

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::service::SessionBackend;
use crate::session::state::{CompletionStatus, ScormVersion};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Init,
    Get(String),
    Set(String, String),
    Save,
    Quit,
    GetStatus,
    SetStatus(String),
}

#[derive(Debug, Default)]
struct Inner {
    version: String,
    debug: bool,
    active: bool,
    values: HashMap<String, String>,
    /// Snapshot of `values` at the last successful save
    committed: HashMap<String, String>,
    calls: Vec<BackendCall>,
    init_failures: usize,
    quit_fails: bool,
    rejected_fields: HashSet<String>,
    reject_status: bool,
}

impl Inner {
    fn parsed_version(&self) -> ScormVersion {
        self.version.parse().unwrap_or(ScormVersion::Scorm2004)
    }
}

/// In-memory `SessionBackend` with a call log and failure injection
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a data-model field
    pub fn with_value(self, field: &str, value: &str) -> Self {
        self.inner
            .lock()
            .values
            .insert(field.to_string(), value.to_string());
        self
    }

    /// Seed the learner name under both the legacy and the modern field
    pub fn with_learner_name(self, name: &str) -> Self {
        self.with_value(ScormVersion::Scorm12.learner_name_field(), name)
            .with_value(ScormVersion::Scorm2004.learner_name_field(), name)
    }

    /// Fail the next `count` calls to `init`
    pub fn failing_inits(self, count: usize) -> Self {
        self.inner.lock().init_failures = count;
        self
    }

    /// Make `quit` fail until `set_quit_fails(false)`
    pub fn set_quit_fails(&self, fails: bool) {
        self.inner.lock().quit_fails = fails;
    }

    /// Reject every `set` against `field`
    pub fn reject_field(&self, field: &str) {
        self.inner.lock().rejected_fields.insert(field.to_string());
    }

    /// Reject every `set_status`
    pub fn set_reject_status(&self, reject: bool) {
        self.inner.lock().reject_status = reject;
    }

    /// Whether a session is currently open
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Whether the runtime's own diagnostics were switched on
    pub fn debug_enabled(&self) -> bool {
        self.inner.lock().debug
    }

    /// Current value of a field, bypassing the call log and the open check
    pub fn peek(&self, field: &str) -> Option<String> {
        self.inner.lock().values.get(field).cloned()
    }

    /// Value of a field as of the last save
    pub fn committed(&self, field: &str) -> Option<String> {
        self.inner.lock().committed.get(field).cloned()
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Number of calls matching `pred`
    pub fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

impl SessionBackend for MemoryBackend {
    fn init(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Init);

        if inner.init_failures > 0 {
            inner.init_failures -= 1;
            debug!("MemoryBackend: init refused");
            return false;
        }
        if inner.active {
            return false;
        }

        let status_field = inner.parsed_version().status_field();
        let status = CompletionStatus::from_backend(inner.values.get(status_field).map(String::as_str));
        if matches!(status, CompletionStatus::NotAttempted | CompletionStatus::Unknown) {
            inner.values.insert(
                status_field.to_string(),
                CompletionStatus::Incomplete.to_string(),
            );
        }

        inner.active = true;
        true
    }

    fn get(&self, field: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Get(field.to_string()));
        if !inner.active {
            return None;
        }
        inner.values.get(field).cloned()
    }

    fn set(&self, field: &str, value: &str) -> bool {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(BackendCall::Set(field.to_string(), value.to_string()));
        if !inner.active || inner.rejected_fields.contains(field) {
            return false;
        }
        inner.values.insert(field.to_string(), value.to_string());
        true
    }

    fn save(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Save);
        if !inner.active {
            return false;
        }
        inner.committed = inner.values.clone();
        true
    }

    fn quit(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Quit);
        if !inner.active || inner.quit_fails {
            return false;
        }

        let version = inner.parsed_version();
        let status = CompletionStatus::from_backend(
            inner.values.get(version.status_field()).map(String::as_str),
        );
        let exit = match (status.is_finished(), version) {
            (false, _) => "suspend",
            (true, ScormVersion::Scorm12) => "",
            (true, ScormVersion::Scorm2004) => "normal",
        };
        inner
            .values
            .insert(version.exit_field().to_string(), exit.to_string());
        inner.committed = inner.values.clone();
        inner.active = false;
        true
    }

    fn get_status(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::GetStatus);
        if !inner.active {
            return None;
        }
        let field = inner.parsed_version().status_field();
        inner.values.get(field).cloned()
    }

    fn set_status(&self, status: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::SetStatus(status.to_string()));
        if !inner.active || inner.reject_status {
            return false;
        }
        let field = inner.parsed_version().status_field();
        inner.values.insert(field.to_string(), status.to_string());
        true
    }

    fn version(&self) -> String {
        self.inner.lock().version.clone()
    }

    fn set_version(&self, version: &str) {
        self.inner.lock().version = version.to_string();
    }

    fn set_debug(&self, enabled: bool) {
        self.inner.lock().debug = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_backend_refuses_everything() {
        let backend = MemoryBackend::new().with_value("cmi.location", "p1");
        assert_eq!(backend.get("cmi.location"), None);
        assert!(!backend.set("cmi.location", "p2"));
        assert!(!backend.quit());
        assert_eq!(backend.peek("cmi.location").as_deref(), Some("p1"));
    }

    #[test]
    fn test_init_promotes_not_attempted() {
        let backend = MemoryBackend::new().with_value("cmi.core.lesson_status", "not attempted");
        backend.set_version("1.2");
        assert!(backend.init());
        assert_eq!(backend.get_status().as_deref(), Some("incomplete"));
    }

    #[test]
    fn test_init_keeps_existing_status() {
        let backend = MemoryBackend::new().with_value("cmi.completion_status", "completed");
        backend.set_version("2004");
        assert!(backend.init());
        assert_eq!(backend.get_status().as_deref(), Some("completed"));
    }

    #[test]
    fn test_failing_inits_count_down() {
        let backend = MemoryBackend::new().failing_inits(2);
        assert!(!backend.init());
        assert!(!backend.init());
        assert!(backend.init());
        assert_eq!(backend.count_calls(|c| *c == BackendCall::Init), 3);
    }

    #[test]
    fn test_quit_records_exit_mode() {
        let backend = MemoryBackend::new();
        backend.set_version("2004");
        backend.init();
        assert!(backend.quit());
        assert_eq!(backend.peek("cmi.exit").as_deref(), Some("suspend"));
        assert!(!backend.is_active());

        let backend = MemoryBackend::new();
        backend.set_version("1.2");
        backend.init();
        backend.set_status("passed");
        assert!(backend.quit());
        assert_eq!(backend.peek("cmi.core.exit").as_deref(), Some(""));
    }

    #[test]
    fn test_save_commits_values() {
        let backend = MemoryBackend::new();
        backend.set_version("2004");
        backend.init();
        backend.set("cmi.location", "p4");
        assert_eq!(backend.committed("cmi.location"), None);
        backend.save();
        assert_eq!(backend.committed("cmi.location").as_deref(), Some("p4"));
    }

    #[test]
    fn test_rejected_field() {
        let backend = MemoryBackend::new();
        backend.set_version("2004");
        backend.init();
        backend.reject_field("cmi.score.raw");
        assert!(!backend.set("cmi.score.raw", "10"));
        assert!(backend.set("cmi.score.max", "10"));
    }
}
