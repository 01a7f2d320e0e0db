//! SCORM Session Provider Library
//!
//! Owns one connection to a SCORM runtime (`SessionBackend`), mirrors the
//! learner's progress locally and hands consumers a `ScoContext` capability
//! object. The `server` module exposes the same capability over HTTP.

pub mod backend;
pub mod config;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use backend::{MemoryBackend, SessionBackend};
pub use server::scorm_routes;
pub use session::{
    CompletionStatus, ProviderConfig, Score, ScoContext, ScormError, ScormProvider, ScormState,
    ScormVersion, with_scorm,
};
