//! HTTP control surface for the office local bridge.
//!
//! Configuration UIs use these routes to manage tool-server configs, drive
//! lifecycles, inspect status and tools, and invoke tools.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, HttpConfig, bootstrap, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
