use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Where the incremental cache keeps its path -> timestamp table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorageMode {
    /// Persist the table to `[cache].path` between sessions.
    File,
    /// Keep the table in memory only (lost on exit).
    Memory,
}

impl Default for CacheStorageMode {
    fn default() -> Self {
        CacheStorageMode::File
    }
}

impl FromStr for CacheStorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(CacheStorageMode::File),
            "memory" => Ok(CacheStorageMode::Memory),
            other => Err(format!(
                "invalid cache storage: {other} (expected \"file\" or \"memory\")"
            )),
        }
    }
}

/// Severity of a diagnostic produced by one of the WML tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}
