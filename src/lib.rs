// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod markers;
pub mod parse;
pub mod tools;
pub mod types;

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, FileCacheStore, IncrementalCache, MemoryCacheStore};
use crate::cli::{CacheAction, CliArgs, Command};
use crate::config::{ConfigFile, load_and_validate};
use crate::exec::KillSwitch;
use crate::fs::{FileSystem, RealFileSystem};
use crate::tools::{CollectedOutput, InvocationState, PreprocessOutcome, Tool, ToolRequest, Toolchain};
use crate::types::CacheStorageMode;

/// Exit code reported when a run was cancelled (Ctrl-C).
pub const EXIT_KILLED: i32 = 130;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - the incremental cache and its store
/// - the toolchain
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    let cfg = Arc::new(cfg);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut store = open_store(&cfg, fs.clone());
    let cache = Arc::new(IncrementalCache::new(fs.clone()));
    if let Err(e) = cache.load(store.as_ref()) {
        warn!(error = %e, "could not load incremental cache; starting empty");
    }

    let toolchain = Toolchain::new(cfg.clone(), fs, cache.clone());
    spawn_ctrl_c_handler(toolchain.kill_switch());

    if args.dry_run {
        return dry_run(&toolchain, &args.command);
    }

    let code = match args.command {
        Command::Preprocess {
            file,
            out_dir,
            defines,
            force,
        } => {
            let outcome = toolchain
                .preprocess_file(&file, &out_dir, &defines.defines, force)
                .await?;
            let code = match outcome {
                PreprocessOutcome::Skipped => {
                    println!("skipped: {} is up to date", file.display());
                    0
                }
                PreprocessOutcome::Completed(output) => {
                    print_diagnostics(&output);
                    println!("{}: {}", file.display(), output.state);
                    exit_code(&output.state)
                }
            };
            cache
                .save(store.as_mut())
                .context("saving incremental cache")?;
            code
        }

        Command::Lint { target } => run_diagnostic_tool(&toolchain, Tool::Linter, &target).await?,
        Command::Scan { target } => run_diagnostic_tool(&toolchain, Tool::Scanner, &target).await?,
        Command::Indent { target } => run_diagnostic_tool(&toolchain, Tool::Indenter, &target).await?,

        Command::Upload { addon_dir } => {
            let output = toolchain
                .run_and_collect(Tool::Uploader, &ToolRequest::new(&addon_dir))
                .await?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            exit_code(&output.state)
        }

        Command::Defines {
            macros_file,
            defines,
        } => {
            let report = toolchain
                .stream_defines(&macros_file, &defines.defines, |define| {
                    println!(
                        "{}({}) @ {}:{}",
                        define.name,
                        define.arguments.join(", "),
                        define.location,
                        define.line
                    );
                    ControlFlow::Continue(())
                })
                .await?;
            eprint!("{}", report.stderr);
            info!(
                committed = report.value.committed,
                rejected = report.value.rejected,
                "defines listed"
            );
            exit_code(&report.state)
        }

        Command::CampaignId { file } => {
            let report = toolchain.find_campaign_id(&file).await?;
            match report.value {
                Some(id) => {
                    println!("{id}");
                    0
                }
                None => {
                    eprint!("{}", report.stderr);
                    eprintln!("no campaign found in {}", file.display());
                    1
                }
            }
        }

        Command::Cache { action } => match action {
            CacheAction::Show => {
                for (path, ts) in cache.entries() {
                    println!("{ts}\t{path}");
                }
                debug!(entries = cache.len(), "cache listed");
                0
            }
            CacheAction::Clear => {
                let removed = cache.len();
                cache.clear();
                cache
                    .save(store.as_mut())
                    .context("saving incremental cache")?;
                println!("removed {removed} cache entries");
                0
            }
        },
    };

    Ok(code)
}

fn open_store(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Box<dyn CacheStore> {
    match cfg.cache.storage {
        CacheStorageMode::File => Box::new(FileCacheStore::new(cfg.cache.path.clone(), fs)),
        CacheStorageMode::Memory => Box::new(MemoryCacheStore::new()),
    }
}

/// Ctrl-C raises the shared kill switch; running tools are killed and the
/// command reports how far it got.
fn spawn_ctrl_c_handler(kill_switch: KillSwitch) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received; cancelling running tools");
        kill_switch.kill();
    });
}

async fn run_diagnostic_tool(toolchain: &Toolchain, tool: Tool, target: &Path) -> Result<i32> {
    let output = toolchain
        .run_and_collect(tool, &ToolRequest::new(target))
        .await?;
    print_diagnostics(&output);
    Ok(exit_code(&output.state))
}

fn print_diagnostics(output: &CollectedOutput) {
    let diagnostics = output.diagnostics();
    for record in &diagnostics {
        println!("{record}");
    }
    debug!(tool = %output.tool, count = diagnostics.len(), "diagnostics printed");
}

fn exit_code(state: &InvocationState) -> i32 {
    match state {
        InvocationState::Completed(code) => *code,
        InvocationState::Killed => EXIT_KILLED,
        InvocationState::NotStarted | InvocationState::Running | InvocationState::Failed(_) => 1,
    }
}

/// Print the command each subcommand would run.
fn dry_run(toolchain: &Toolchain, command: &Command) -> Result<i32> {
    let (tool, request) = match command {
        Command::Preprocess {
            file,
            out_dir,
            defines,
            force,
        } => {
            let cached = !force && toolchain.cache().should_skip(file);
            println!("cache: {}", if cached { "up to date (would skip)" } else { "stale" });
            (
                Tool::Preprocessor,
                ToolRequest::new(file)
                    .with_output_dir(out_dir)
                    .with_defines(defines.defines.iter().cloned()),
            )
        }
        Command::Lint { target } => (Tool::Linter, ToolRequest::new(target)),
        Command::Scan { target } => (Tool::Scanner, ToolRequest::new(target)),
        Command::Indent { target } => (Tool::Indenter, ToolRequest::new(target)),
        Command::Upload { addon_dir } => (Tool::Uploader, ToolRequest::new(addon_dir)),
        Command::Defines {
            macros_file,
            defines,
        } => (
            Tool::Parser,
            ToolRequest::new(macros_file).with_defines(defines.defines.iter().cloned()),
        ),
        Command::CampaignId { file } => (Tool::Parser, ToolRequest::new(file)),
        Command::Cache { .. } => {
            println!("wmlkit dry-run: cache commands do not run tools");
            return Ok(0);
        }
    };

    let built = toolchain.command(tool, &request)?;
    println!("wmlkit dry-run");
    println!("  tool: {tool}");
    println!("  cmd: {built}");
    debug!("dry-run complete (no execution)");
    Ok(0)
}
