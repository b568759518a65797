//! Domain types for supervised tool-servers, their tools, and invocations.

mod action;
mod invocation;
mod server;
mod state;
mod tool;

pub use action::{ResolutionOrder, ToolAction, UnsupportedAction};
pub use invocation::{ErrorKind, InvocationRequest, InvocationResult};
pub use server::{ConfigError, ServerConfig};
pub use state::{ProcessRuntimeInfo, ResourceUsage, ServerSnapshot, ServerState};
pub use tool::{ToolCategory, ToolEntry, actions_from_schema};
