//! Frontend components
//!
//! The command-line interface and the process-wide configuration that
//! form the user-facing side of jvbridge.

pub mod cli;
pub mod config;

pub use cli::main as cli_main;
pub use config::{Environment, Overrides};
