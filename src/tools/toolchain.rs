// src/tools/toolchain.rs

//! Entry point for running tools against files.
//!
//! A [`Toolchain`] bundles the validated configuration, the filesystem seam
//! and the shared incremental cache. Every invocation it launches shares one
//! [`KillSwitch`], so a single raise (Ctrl-C, a cancelled job) stops all of
//! them.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::process::ChildStdout;
use tracing::{debug, info, warn};

use crate::cache::{CacheDecision, IncrementalCache};
use crate::config::ConfigFile;
use crate::errors::{Result, WmlkitError};
use crate::exec::KillSwitch;
use crate::fs::FileSystem;
use crate::parse::{self, Define, DefineTable, ParseSummary};
use crate::tools::{
    CollectedOutput, Invocation, InvocationState, Tool, ToolCommand, ToolRequest, build_command,
    check_preconditions,
};

/// Result of a cache-aware preprocessing request.
#[derive(Debug, Clone)]
pub enum PreprocessOutcome {
    /// The input had not changed since it was last preprocessed.
    Skipped,
    /// The preprocessor ran; see the output for how it ended.
    Completed(CollectedOutput),
}

impl PreprocessOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PreprocessOutcome::Skipped)
    }
}

/// What a streaming parser run produced.
#[derive(Debug, Clone)]
pub struct StreamReport<T> {
    pub value: T,
    /// Terminal state of the parser tool. `Killed` after an early stop.
    pub state: InvocationState,
    /// The tool's stderr.
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    cfg: Arc<ConfigFile>,
    fs: Arc<dyn FileSystem>,
    cache: Arc<IncrementalCache>,
    kill_switch: KillSwitch,
}

impl Toolchain {
    pub fn new(cfg: Arc<ConfigFile>, fs: Arc<dyn FileSystem>, cache: Arc<IncrementalCache>) -> Self {
        Self {
            cfg,
            fs,
            cache,
            kill_switch: KillSwitch::new(),
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.cfg
    }

    pub fn cache(&self) -> &Arc<IncrementalCache> {
        &self.cache
    }

    /// Raising this cancels every invocation launched by this toolchain.
    /// Launches after that fail with [`WmlkitError::Cancelled`]. Stopping a
    /// single invocation never raises it.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    /// Check preconditions and build the command for `tool`.
    pub fn command(&self, tool: Tool, request: &ToolRequest) -> Result<ToolCommand> {
        check_preconditions(self.fs.as_ref(), &self.cfg, tool, request)?;
        Ok(build_command(&self.cfg, tool, request))
    }

    /// Start `tool` and return without waiting.
    pub fn launch(&self, tool: Tool, request: &ToolRequest) -> Result<Invocation> {
        let command = self.command(tool, request)?;
        let mut invocation = Invocation::new(command).with_cancel(self.kill_switch.clone());
        invocation.launch()?;
        Ok(invocation)
    }

    /// Run `tool` to completion and return everything it printed.
    pub async fn run_and_collect(&self, tool: Tool, request: &ToolRequest) -> Result<CollectedOutput> {
        let invocation = self.launch(tool, request)?;
        invocation.collect().await
    }

    /// Preprocess `file` into `out_dir` unless the cache says it is up to
    /// date. `force` bypasses the skip check but still records the result.
    ///
    /// The cache is updated only when the preprocessor exits with 0.
    pub async fn preprocess_file(
        &self,
        file: &Path,
        out_dir: &Path,
        defines: &[String],
        force: bool,
    ) -> Result<PreprocessOutcome> {
        let decision = if force {
            CacheDecision::Proceed {
                modified: self.fs.modified_millis(file).ok(),
            }
        } else {
            self.cache.decide(file)
        };

        let modified = match decision {
            CacheDecision::Skip => {
                info!(path = ?file, "unchanged since last preprocessing; skipped");
                return Ok(PreprocessOutcome::Skipped);
            }
            CacheDecision::Proceed { modified } => modified,
        };

        let request = ToolRequest::new(file)
            .with_output_dir(out_dir)
            .with_defines(defines.iter().cloned());
        let command = self.command(Tool::Preprocessor, &request)?;
        self.fs.create_dir_all(out_dir)?;

        let output = Invocation::new(command)
            .with_cancel(self.kill_switch.clone())
            .collect()
            .await?;

        if output.success() {
            match modified {
                Some(ts) => self.cache.mark_processed(file, ts),
                None => warn!(path = ?file, "modification time unknown; not caching"),
            }
        } else {
            info!(path = ?file, state = %output.state, "preprocessing did not succeed; cache unchanged");
        }
        Ok(PreprocessOutcome::Completed(output))
    }

    /// Run the parser tool on `macros_file` and hand each define to `sink`
    /// while the tool is still running. If the sink breaks, the tool is
    /// killed.
    pub async fn stream_defines<F>(
        &self,
        macros_file: &Path,
        defines: &[String],
        sink: F,
    ) -> Result<StreamReport<ParseSummary>>
    where
        F: FnMut(Define) -> ControlFlow<()>,
    {
        let request = ToolRequest::new(macros_file).with_defines(defines.iter().cloned());
        let (mut invocation, stdout) = self.launch_streaming(&request)?;

        let parsed = parse::stream_defines(stdout, sink).await;
        let stopped_early = parsed.as_ref().is_ok_and(|s| s.stopped_early);
        let stderr = finish_streaming(&mut invocation, stopped_early || parsed.is_err()).await;

        let summary = parsed?;
        Ok(StreamReport {
            value: summary,
            state: invocation.state().clone(),
            stderr,
        })
    }

    /// Full define table of `macros_file`.
    pub async fn defines_table(
        &self,
        macros_file: &Path,
        defines: &[String],
    ) -> Result<StreamReport<(DefineTable, ParseSummary)>> {
        let mut table = DefineTable::new();
        let report = self
            .stream_defines(macros_file, defines, |define| {
                table.insert(define);
                ControlFlow::Continue(())
            })
            .await?;

        Ok(StreamReport {
            value: (table, report.value),
            state: report.state,
            stderr: report.stderr,
        })
    }

    /// Id of the first `campaign` element in `cfg_file`. The parser tool is
    /// killed as soon as the id is known.
    pub async fn find_campaign_id(&self, cfg_file: &Path) -> Result<StreamReport<Option<String>>> {
        self.find_first_id(cfg_file, "campaign").await
    }

    pub async fn find_first_id(&self, cfg_file: &Path, tag: &str) -> Result<StreamReport<Option<String>>> {
        let request = ToolRequest::new(cfg_file);
        let (mut invocation, stdout) = self.launch_streaming(&request)?;

        let found = parse::find_first_id(stdout, tag).await;
        let stop = found.as_ref().map_or(true, Option::is_some);
        let stderr = finish_streaming(&mut invocation, stop).await;

        let id = found?;
        debug!(tag, ?id, "id lookup finished");
        Ok(StreamReport {
            value: id,
            state: invocation.state().clone(),
            stderr,
        })
    }

    fn launch_streaming(&self, request: &ToolRequest) -> Result<(Invocation, BufReader<ChildStdout>)> {
        let mut invocation = self.launch(Tool::Parser, request)?;
        let session = invocation.session_mut();
        // stderr must keep draining while stdout is parsed.
        session.start_error_monitor();
        let Some(stdout) = session.take_stdout() else {
            return Err(WmlkitError::Other(anyhow::anyhow!(
                "parser stdout is not available"
            )));
        };
        Ok((invocation, stdout))
    }
}

/// End a streaming run: kill the tool when the parser stopped reading,
/// otherwise wait for it. Returns the collected stderr.
async fn finish_streaming(invocation: &mut Invocation, stop: bool) -> String {
    if stop {
        invocation.cancel().await;
    } else {
        invocation.wait().await;
    }
    invocation.session_mut().error_text()
}
