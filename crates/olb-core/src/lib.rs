//! Core domain types and ports for the office local bridge.
//!
//! This crate has no process, protocol, or HTTP concerns. It defines what a
//! supervised tool-server is, what its tools and invocations look like, and
//! the traits adapters implement.

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod storage;

// Re-export commonly used types for convenience
pub use domain::{
    ConfigError, ErrorKind, InvocationRequest, InvocationResult, ProcessRuntimeInfo,
    ResolutionOrder, ResourceUsage, ServerConfig, ServerSnapshot, ServerState, ToolAction,
    ToolCategory, ToolEntry, UnsupportedAction, actions_from_schema,
};
pub use events::AppEvent;
pub use paths::PathError;
pub use ports::{
    AppEventEmitter, BroadcastEmitter, NoopEmitter, RepositoryError, ServerConfigRepository,
};
pub use settings::{BridgeSettings, DEFAULT_PORT, SettingsError, ToolNaming};
pub use storage::{JsonServerStore, MemoryServerStore};
