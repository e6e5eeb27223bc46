// src/tools/builders.rs

//! Argument-vector builders, one pure function per tool.
//!
//! Nothing here touches the filesystem or spawns anything; the only I/O is
//! in [`check_preconditions`], which is kept separate so that builders can be
//! tested on their own.

use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::errors::{Result, WmlkitError};
use crate::fs::FileSystem;
use crate::tools::{Tool, ToolArguments, ToolRequest};

/// A fully built invocation: what to execute and with which arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: Tool,
    pub binary: PathBuf,
    pub args: ToolArguments,
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.binary.display(), self.args)
    }
}

type Builder = fn(&ConfigFile, &ToolRequest) -> ToolArguments;

fn builder_for(tool: Tool) -> Builder {
    match tool {
        Tool::Preprocessor => preprocessor_args,
        Tool::Linter => lint_args,
        Tool::Scanner => scan_args,
        Tool::Indenter => indent_args,
        Tool::Uploader => upload_args,
        Tool::Parser => parser_args,
    }
}

/// Binary to execute for `tool`: the game binary for the preprocessor, the
/// python interpreter for everything else.
pub fn binary_for(cfg: &ConfigFile, tool: Tool) -> PathBuf {
    match tool {
        Tool::Preprocessor => cfg.paths.wesnoth.clone(),
        _ => cfg.paths.python.clone(),
    }
}

/// Location of the tool's python script, if it has one.
pub fn script_path(cfg: &ConfigFile, tool: Tool) -> Option<PathBuf> {
    tool.script_name()
        .map(|name| cfg.paths.wmltools_dir.join(name))
}

pub fn build_command(cfg: &ConfigFile, tool: Tool, request: &ToolRequest) -> ToolCommand {
    ToolCommand {
        tool,
        binary: binary_for(cfg, tool),
        args: builder_for(tool)(cfg, request),
    }
}

/// Default defines followed by the request's extras, first occurrence wins.
pub fn effective_defines(cfg: &ConfigFile, request: &ToolRequest) -> Vec<String> {
    let mut defines: Vec<String> = Vec::new();
    for define in cfg
        .preprocessor
        .default_defines
        .iter()
        .chain(request.defines.iter())
    {
        let define = define.trim();
        if !define.is_empty() && !defines.iter().any(|d| d == define) {
            defines.push(define.to_string());
        }
    }
    defines
}

/// `--config-dir <dir> --data-dir <dir> [--preprocess-input-macros <file>
/// --preprocess-output-macros <file>] (-p=<defines> | -p) <input> <outdir>`
pub fn preprocessor_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let mut args = ToolArguments::new();
    args.push("--config-dir")
        .push_path(&cfg.paths.config_dir)
        .push("--data-dir")
        .push_path(&cfg.paths.data_dir);

    if let Some(macros) = &cfg.preprocessor.macros_file {
        args.push("--preprocess-input-macros")
            .push_path(macros)
            .push("--preprocess-output-macros")
            .push_path(macros);
    }

    let defines = effective_defines(cfg, request);
    if defines.is_empty() {
        args.push("-p");
    } else {
        args.push(format!("-p={}", defines.join(",")));
    }

    args.push_path(&request.target);
    if let Some(out) = &request.output_dir {
        args.push_path(out);
    }
    args
}

pub fn lint_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let lint = &cfg.lint;
    let mut args = script_args(cfg, Tool::Linter);
    args.push_if(lint.dry_run, "--dryrun")
        .push_repeated("-v", lint.verbosity)
        .push_if(!lint.spellcheck, "--nospellcheck");
    if lint.include_core {
        args.push_path(cfg.core_dir());
    }
    args.push_path(&request.target);
    args
}

pub fn scan_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let scan = &cfg.scan;
    let mut args = script_args(cfg, Tool::Scanner);
    args.push_if(scan.crossreference, "--crossreference")
        .push_if(scan.unresolved, "--unresolved")
        .push_if(scan.collisions, "--collisions");
    if scan.include_core {
        args.push_path(cfg.core_dir());
    }
    args.push_path(&request.target);
    args
}

pub fn indent_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let mut args = script_args(cfg, Tool::Indenter);
    args.push_if(cfg.indent.dry_run, "--dryrun")
        .push_repeated("-v", cfg.indent.verbosity)
        .push_path(&request.target);
    args
}

pub fn upload_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let mut args = script_args(cfg, Tool::Uploader);
    if let Some(server) = &cfg.upload.server {
        args.push("-a").push(server.as_str());
    }
    if let Some(port) = cfg.upload.port {
        args.push("-p").push(port.to_string());
    }
    args.push("--upload").push_path(&request.target);
    args
}

pub fn parser_args(cfg: &ConfigFile, request: &ToolRequest) -> ToolArguments {
    let mut args = script_args(cfg, Tool::Parser);
    args.push("--wesnoth")
        .push_path(&cfg.paths.wesnoth)
        .push("--data-dir")
        .push_path(&cfg.paths.data_dir)
        .push("--config-dir")
        .push_path(&cfg.paths.config_dir)
        .push("--to-xml");

    let defines = effective_defines(cfg, request);
    if !defines.is_empty() {
        args.push("--defines").push(defines.join(","));
    }
    args.push("--input").push_path(&request.target);
    args
}

/// Python tools start with their script path.
fn script_args(cfg: &ConfigFile, tool: Tool) -> ToolArguments {
    let mut args = ToolArguments::new();
    if let Some(script) = script_path(cfg, tool) {
        args.push_path(script);
    }
    args
}

/// Check that `tool` can run on `request` before spawning anything.
///
/// - the binary must exist, unless it is a bare name left to `PATH` lookup;
/// - the tool's script must exist;
/// - the target must exist;
/// - the preprocessor needs an output directory.
pub fn check_preconditions(
    fs: &dyn FileSystem,
    cfg: &ConfigFile,
    tool: Tool,
    request: &ToolRequest,
) -> Result<()> {
    let binary = binary_for(cfg, tool);
    if !is_bare_command(&binary) && !fs.is_file(&binary) {
        return Err(WmlkitError::Precondition(format!(
            "{tool}: binary {:?} does not exist",
            binary
        )));
    }

    if let Some(script) = script_path(cfg, tool) {
        if !fs.is_file(&script) {
            return Err(WmlkitError::Precondition(format!(
                "{tool}: script {:?} does not exist",
                script
            )));
        }
    }

    if !fs.exists(&request.target) {
        return Err(WmlkitError::Precondition(format!(
            "{tool}: target {:?} does not exist",
            request.target
        )));
    }

    if tool == Tool::Preprocessor && request.output_dir.is_none() {
        return Err(WmlkitError::Precondition(
            "preprocessor: an output directory is required".to_string(),
        ));
    }

    Ok(())
}

/// A single path component such as `python3`, resolved by the OS.
fn is_bare_command(binary: &Path) -> bool {
    binary.components().count() == 1 && !binary.is_absolute()
}
