// src/tools/invocation.rs

//! Lifecycle of one tool run.
//!
//! ```text
//! NotStarted --launch ok--> Running --exit--> Completed(code)
//!     |                        |--kill-----> Killed
//!     |                        `--wait err-> Failed
//!     `--spawn error--> Failed
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use crate::errors::{Result, WmlkitError};
use crate::exec::{KillSwitch, ProcessSession, WaitStatus};
use crate::markers::{DiagnosticRecord, MarkerTranslator};
use crate::tools::{Tool, ToolCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationState {
    NotStarted,
    Running,
    Completed(i32),
    Failed(String),
    Killed,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Completed(_) | InvocationState::Failed(_) | InvocationState::Killed
        )
    }

    pub fn success(&self) -> bool {
        matches!(self, InvocationState::Completed(0))
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationState::NotStarted => f.write_str("not started"),
            InvocationState::Running => f.write_str("running"),
            InvocationState::Completed(code) => write!(f, "completed (exit code {code})"),
            InvocationState::Failed(reason) => write!(f, "failed: {reason}"),
            InvocationState::Killed => f.write_str("killed"),
        }
    }
}

/// Everything a "run and collect" invocation produced.
#[derive(Debug, Clone)]
pub struct CollectedOutput {
    pub tool: Tool,
    pub state: InvocationState,
    pub status: WaitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CollectedOutput {
    pub fn success(&self) -> bool {
        self.state.success()
    }

    /// Diagnostics from stdout followed by those from stderr. Each stream is
    /// translated on its own so a checksum block on one cannot swallow lines
    /// of the other.
    pub fn diagnostics(&self) -> Vec<DiagnosticRecord> {
        let severity = self.tool.default_severity();
        let mut records = MarkerTranslator::new(severity).translate_all(self.stdout.lines());
        records.extend(MarkerTranslator::new(severity).translate_all(self.stderr.lines()));
        records
    }
}

/// One tool run: a built command, its session and its state.
#[derive(Debug)]
pub struct Invocation {
    command: ToolCommand,
    session: ProcessSession,
    state: InvocationState,
}

impl Invocation {
    pub fn new(command: ToolCommand) -> Self {
        let session = ProcessSession::new(command.binary.clone(), command.args.as_slice().to_vec());
        Self {
            command,
            session,
            state: InvocationState::NotStarted,
        }
    }

    /// Also stop when the shared `cancel` switch is raised.
    pub fn with_cancel(mut self, cancel: KillSwitch) -> Self {
        self.session = self.session.with_cancel(cancel);
        self
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    pub fn state(&self) -> &InvocationState {
        &self.state
    }

    /// Direct access for callers that stream the output themselves.
    pub fn session_mut(&mut self) -> &mut ProcessSession {
        &mut self.session
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.session.kill_switch()
    }

    /// Start the process and return immediately ("fire and forget").
    pub fn launch(&mut self) -> Result<()> {
        if self.state != InvocationState::NotStarted {
            return Err(WmlkitError::Other(anyhow::anyhow!(
                "{} invocation already {}",
                self.command.tool,
                self.state
            )));
        }

        match self.session.start() {
            Ok(()) => {
                self.state = InvocationState::Running;
                info!(tool = %self.command.tool, command = %self.command, "tool launched");
                Ok(())
            }
            Err(e @ WmlkitError::Cancelled(_)) => {
                self.state = InvocationState::Killed;
                info!(tool = %self.command.tool, "tool cancelled before launch");
                Err(e)
            }
            Err(e) => {
                self.state = InvocationState::Failed(e.to_string());
                warn!(tool = %self.command.tool, error = %e, "tool failed to start");
                Err(e)
            }
        }
    }

    /// Wait for a launched invocation to end and record the terminal state.
    pub async fn wait(&mut self) -> WaitStatus {
        let status = self.session.wait().await;
        self.state = match status {
            WaitStatus::NotStarted => self.state.clone(),
            WaitStatus::Exited(code) => InvocationState::Completed(code),
            WaitStatus::Interrupted if self.session.was_killed() => InvocationState::Killed,
            WaitStatus::Interrupted => InvocationState::Failed(
                WmlkitError::WaitInterrupted(self.command.tool.to_string()).to_string(),
            ),
        };
        debug!(tool = %self.command.tool, state = %self.state, "invocation finished");
        status
    }

    /// Kill the process and wait for the OS to confirm.
    pub async fn cancel(&mut self) {
        if self.state != InvocationState::Running {
            debug!(tool = %self.command.tool, state = %self.state, "cancel on non-running invocation");
            return;
        }
        self.session.kill(true).await;
        self.state = InvocationState::Killed;
    }

    /// Launch if needed, drain both pipes through monitors, wait, and return
    /// the captured text.
    pub async fn collect(mut self) -> Result<CollectedOutput> {
        if self.state == InvocationState::NotStarted {
            self.launch()?;
        }

        self.session.start_output_monitor();
        self.session.start_error_monitor();
        let status = self.wait().await;

        Ok(CollectedOutput {
            tool: self.command.tool,
            state: self.state.clone(),
            status,
            stdout: self.session.output_text(),
            stderr: self.session.error_text(),
        })
    }
}
