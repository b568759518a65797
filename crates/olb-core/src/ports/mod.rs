//! Port definitions (trait abstractions) for external systems.
//!
//! Adapters implement these traits; services depend only on the traits.

mod event_emitter;
mod repository;

pub use event_emitter::{AppEventEmitter, BroadcastEmitter, NoopEmitter};
pub use repository::{RepositoryError, ServerConfigRepository};
