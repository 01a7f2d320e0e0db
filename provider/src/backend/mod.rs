//! Session backend module
//!
//! This module provides:
//! - `SessionBackend` trait abstracting the runtime that implements the
//!   learner-progress protocol
//! - `MemoryBackend`, an in-memory backend used by tests and the demo bridge

mod memory;
mod service;

pub use memory::{BackendCall, MemoryBackend};
pub use service::SessionBackend;
