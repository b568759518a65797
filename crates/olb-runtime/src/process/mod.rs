//! Child process ownership.

mod handle;
mod launch;
mod shutdown;
mod stream;

pub use handle::{ProcessError, ProcessExit, ProcessHandle, ProcessIo};
pub use launch::resolve_command;
pub use shutdown::terminate_child;
pub use stream::StderrTail;
