// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Process-level failures (`Start`, `WaitInterrupted`) abort one invocation
//! and are handed back to the caller. Per-item failures (one diagnostic line,
//! one record) never reach this type; they are logged and skipped where they
//! happen.

use std::path::PathBuf;

use thiserror::Error;

use crate::parse::ParseError;

#[derive(Error, Debug)]
pub enum WmlkitError {
    /// The external process could not be spawned (missing binary, permission).
    #[error("failed to start {binary:?}: {source}")]
    Start {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shared cancel switch was raised before the process could start.
    #[error("cancelled before starting {0}")]
    Cancelled(String),

    #[error("wait interrupted: {0}")]
    WaitInterrupted(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("cache IO error: {0}")]
    CacheIo(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A tool could not be invoked because its binary or target is missing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WmlkitError>;
