//! `olb` command-line adapter.
//!
//! Parses arguments, resolves the config directory and settings, then hands
//! off to one handler per command.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod logging;
pub mod parser;

pub use bootstrap::CliContext;
pub use commands::Commands;
pub use parser::Cli;
