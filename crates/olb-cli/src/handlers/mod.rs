//! Command handlers.
//!
//! Each handler takes the resolved [`CliContext`](crate::CliContext),
//! does its work, and formats output for the terminal. Rendering is split
//! into plain functions so it can be tested without a terminal.

pub mod check;
pub mod paths;
pub mod serve;
pub mod servers;
