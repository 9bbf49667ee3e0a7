//! I/O adapters: child processes, toolchains, the collaborator backend,
//! configuration files, prompt rendering, and tool contracts.

pub mod collaborator;
pub mod config;
pub mod harness;
pub mod process;
pub mod prompt;
pub mod tools;
pub mod validator;
