//! `ServerConfigRepository` implementations.

mod json;
mod memory;

pub use json::JsonServerStore;
pub use memory::MemoryServerStore;
