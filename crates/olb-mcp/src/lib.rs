//! Tool-server supervision, discovery and dispatch.
//!
//! Each configured server gets a [`Supervisor`] that owns its process and
//! lifecycle. Discovered tools land in a versioned [`ToolCatalog`], and the
//! [`Dispatcher`] routes invocations to the owning server over MCP stdio.
//! [`BridgeService`] ties these together for the HTTP and CLI adapters.

#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod discovery;
pub mod dispatcher;
pub mod health;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod service;
pub mod status;
pub mod supervisor;

// Re-export domain types from core for convenience
pub use olb_core::{
    ErrorKind, InvocationRequest, InvocationResult, ServerConfig, ServerSnapshot, ServerState,
    ToolCategory, ToolEntry,
};

// Re-export this crate's public types
pub use catalog::{CatalogSnapshot, ToolCatalog};
pub use client::{ClientError, ToolServerClient};
pub use dispatcher::Dispatcher;
pub use policy::{RestartDecision, RestartPolicy};
pub use registry::SupervisorRegistry;
pub use service::{BridgeService, ServiceError};
pub use status::{ServerStatus, StatusSummary};
pub use supervisor::{LifecycleOutcome, Supervisor};
