// src/tools/mod.rs

//! The external WML tool family and how to invoke it.
//!
//! - [`builders`] turns (config, request) into a concrete binary + argument
//!   vector, one pure function per tool.
//! - [`invocation`] runs one built command through a [`ProcessSession`] and
//!   tracks its lifecycle.
//! - [`toolchain`] is the façade callers use: precondition checks,
//!   cache-aware preprocessing, run-and-collect and the streaming parser
//!   runs.
//!
//! [`ProcessSession`]: crate::exec::ProcessSession

pub mod builders;
pub mod invocation;
pub mod toolchain;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::types::Severity;

pub use builders::{ToolCommand, build_command, check_preconditions};
pub use invocation::{CollectedOutput, Invocation, InvocationState};
pub use toolchain::{PreprocessOutcome, StreamReport, Toolchain};

/// One of the supported external tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `wesnoth -p`: expands macros into an output directory.
    Preprocessor,
    /// `wmllint`: static checks and upgrades.
    Linter,
    /// `wmlscope`: cross-reference scanner.
    Scanner,
    /// `wmlindent`: reformatter.
    Indenter,
    /// `wesnoth_addon_manager`: add-on upload client.
    Uploader,
    /// `wmlparser3.py`: structured (XML) dump of WML and macro tables.
    Parser,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Preprocessor,
        Tool::Linter,
        Tool::Scanner,
        Tool::Indenter,
        Tool::Uploader,
        Tool::Parser,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Preprocessor => "preprocessor",
            Tool::Linter => "wmllint",
            Tool::Scanner => "wmlscope",
            Tool::Indenter => "wmlindent",
            Tool::Uploader => "wesnoth_addon_manager",
            Tool::Parser => "wmlparser",
        }
    }

    /// File name of the python script inside `[paths].wmltools_dir`, or
    /// `None` for the preprocessor, which is the game binary itself.
    pub fn script_name(&self) -> Option<&'static str> {
        match self {
            Tool::Preprocessor => None,
            Tool::Linter => Some("wmllint"),
            Tool::Scanner => Some("wmlscope"),
            Tool::Indenter => Some("wmlindent"),
            Tool::Uploader => Some("wesnoth_addon_manager"),
            Tool::Parser => Some("wmlparser3.py"),
        }
    }

    /// Severity for diagnostics whose message does not state one.
    pub fn default_severity(&self) -> Severity {
        match self {
            Tool::Scanner | Tool::Parser => Severity::Info,
            Tool::Preprocessor => Severity::Error,
            Tool::Linter | Tool::Indenter | Tool::Uploader => Severity::Warning,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preprocessor" | "preprocess" => Ok(Tool::Preprocessor),
            "lint" | "wmllint" => Ok(Tool::Linter),
            "scan" | "wmlscope" => Ok(Tool::Scanner),
            "indent" | "wmlindent" => Ok(Tool::Indenter),
            "upload" | "wesnoth_addon_manager" => Ok(Tool::Uploader),
            "parser" | "wmlparser" => Ok(Tool::Parser),
            other => Err(format!("unknown tool: {other}")),
        }
    }
}

/// Ordered argument vector for one subprocess. Built once, then handed to
/// the session as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolArguments(Vec<String>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, arg: impl Into<String>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    pub fn push_if(&mut self, cond: bool, arg: impl Into<String>) -> &mut Self {
        if cond {
            self.0.push(arg.into());
        }
        self
    }

    pub fn push_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.0.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn push_repeated(&mut self, arg: &str, times: u8) -> &mut Self {
        for _ in 0..times {
            self.0.push(arg.to_string());
        }
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ToolArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, "{arg:?}")?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

/// What to run a tool on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRequest {
    /// File or directory the tool works on.
    pub target: PathBuf,
    /// Output directory; required by the preprocessor only.
    pub output_dir: Option<PathBuf>,
    /// Extra defines, appended after `[preprocessor].default_defines`.
    pub defines: Vec<String>,
}

impl ToolRequest {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_defines<I, S>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defines.extend(defines.into_iter().map(Into::into));
        self
    }
}
