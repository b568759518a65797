//! Process runtime for supervised tool-servers.
//!
//! Spawning, stdio plumbing, exit detection, graceful termination, and
//! OS-level probing. Protocol and lifecycle policy live in `olb-mcp`.

pub mod probe;
pub mod process;

pub use probe::{ProcessProbe, ProcessSample};
pub use process::{ProcessError, ProcessExit, ProcessHandle, ProcessIo, resolve_command};
