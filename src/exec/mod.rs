// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for spawning the external WML tools with
//! `tokio::process::Command` and giving callers incremental access to their
//! output without ever letting a full pipe stall the child.
//!
//! - [`session`] owns one child process, its pipes, its kill switch, an
//!   optional shared cancel switch and its exit status.
//! - [`monitor`] contains the background drain loops that collect a pipe
//!   into a text buffer ("fire and collect").

pub mod monitor;
pub mod session;

pub use monitor::{Accumulator, OutputMonitor, StreamKind};
pub use session::{KillSwitch, ProcessSession, StopSignal, WaitStatus};
