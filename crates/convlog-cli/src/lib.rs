//! Library side of the `convlog` binary: argument types and the commands
//! they run.

pub mod commands;
pub mod config;
