//! HTTP API layer.

pub mod routes;
pub mod types;

pub use routes::{AppState, router};
