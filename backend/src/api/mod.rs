//! HTTP API module.
//!
//! The axum server, its request and response types, and the log broadcaster
//! shared with the rest of the crate.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState, SharedState};
pub use types::*;
