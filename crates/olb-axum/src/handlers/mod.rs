//! HTTP request handlers.
//!
//! Handlers are thin wrappers that delegate to `BridgeService`.

pub mod configs;
pub mod servers;
pub mod system;
pub mod tools;
