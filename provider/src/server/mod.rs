//! HTTP bridge exposing a mounted provider's capability object
//!
//! Handlers receive the `ScoContext` through axum `State`, so any number of
//! routes share the one provider without holding it themselves.

pub mod routes;

pub use routes::{ScormErrorResponse, scorm_routes};
