//! Shared types, error taxonomy, and environment configuration for bgshell.

pub mod env;
pub mod error;
pub mod types;

pub use error::ShellError;
pub use types::{LogEntry, ProcessInfo, ProcessStatus};
