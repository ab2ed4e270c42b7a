//! Background process supervision: spawning, output draining, timeout
//! enforcement, termination, and retention-based garbage collection.

mod drain;
mod record;
mod supervisor;

pub use record::{CreateProcessOptions, ProcessRecord};
pub use supervisor::{
    communicate, spawn_under_shell, Supervisor, DEFAULT_FOLLOW_POLL_INTERVAL,
};
