// src/exec/session.rs

//! One supervised external process.
//!
//! A [`ProcessSession`] spawns a single child with piped stdout/stderr and
//! hands out exactly one consumer per pipe: direct line reads, a background
//! [`OutputMonitor`], or the raw reader (for the streaming parsers). Callers
//! that want both pipes consumed must set that up before [`ProcessSession::wait`],
//! otherwise a child that fills the unread pipe will never exit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{Result, WmlkitError};
use crate::exec::monitor::{Accumulator, OutputMonitor, StreamKind};

/// How long monitors may keep draining after the child exited (e.g. because
/// a grandchild still holds the pipe) before they are cancelled.
const MONITOR_GRACE: Duration = Duration::from_secs(2);

/// Result of waiting for a session's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The process was never started.
    NotStarted,
    /// The process exited with this code; `-1` when it was ended by a signal.
    Exited(i32),
    /// The wait itself was cut short (kill switch or OS error).
    Interrupted,
}

impl WaitStatus {
    pub fn success(&self) -> bool {
        matches!(self, WaitStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            WaitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStatus::NotStarted => f.write_str("not started"),
            WaitStatus::Exited(code) => write!(f, "exit code {code}"),
            WaitStatus::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Cloneable cancellation handle.
///
/// Every session owns a private switch; raising it stops every monitor of
/// that session and makes a pending (or the next) [`ProcessSession::wait`]
/// kill the child and return [`WaitStatus::Interrupted`]. A switch can also
/// be attached to several sessions as a shared cancel signal through
/// [`ProcessSession::with_cancel`].
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl KillSwitch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn kill(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_killed(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// What a session listens to: its own switch plus an optional shared one.
#[derive(Debug, Clone)]
pub struct StopSignal {
    own: watch::Receiver<bool>,
    shared: Option<watch::Receiver<bool>>,
}

impl StopSignal {
    fn new(own: &KillSwitch, shared: Option<&KillSwitch>) -> Self {
        Self {
            own: own.subscribe(),
            shared: shared.map(KillSwitch::subscribe),
        }
    }

    pub fn is_raised(&self) -> bool {
        *self.own.borrow() || self.shared.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once either switch is raised; never resolves otherwise.
    pub async fn raised(&mut self) {
        let own = raised(&mut self.own);
        match self.shared.as_mut() {
            Some(shared) => {
                tokio::select! {
                    _ = own => {}
                    _ = raised(shared) => {}
                }
            }
            None => own.await,
        }
    }
}

async fn raised(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|killed| *killed).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    NotStarted,
    Running,
    Finished(WaitStatus),
}

/// Exclusive owner of one child process and its two pipes.
pub struct ProcessSession {
    binary: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    label: String,
    state: SessionState,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<BufReader<ChildStderr>>,
    monitors: Vec<OutputMonitor>,
    output: Accumulator,
    errors: Accumulator,
    kill_switch: KillSwitch,
    cancel: Option<KillSwitch>,
}

impl ProcessSession {
    /// Describe a process without starting it.
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let binary = binary.into();
        let label = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary.display().to_string());

        Self {
            binary,
            args,
            working_dir: None,
            label,
            state: SessionState::NotStarted,
            child: None,
            stdout: None,
            stderr: None,
            monitors: Vec::new(),
            output: Accumulator::new(),
            errors: Accumulator::new(),
            kill_switch: KillSwitch::new(),
            cancel: None,
        }
    }

    /// Describe and immediately start a process.
    pub fn spawn(binary: impl Into<PathBuf>, args: Vec<String>) -> Result<Self> {
        let mut session = Self::new(binary, args);
        session.start()?;
        Ok(session)
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Also stop when `cancel` is raised. [`ProcessSession::kill`] never
    /// raises it, so one session stopping does not affect the others sharing
    /// the switch.
    pub fn with_cancel(mut self, cancel: KillSwitch) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// This session's own switch. Raising it affects no other session.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    fn stop_signal(&self) -> StopSignal {
        StopSignal::new(&self.kill_switch, self.cancel.as_ref())
    }

    /// Spawn the process. Calling this on a session that already started is
    /// a no-op.
    ///
    /// Nothing is spawned once the shared cancel switch is raised; that
    /// returns [`WmlkitError::Cancelled`] and leaves the session unstarted.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::NotStarted {
            debug!(process = %self.label, "start requested twice; ignoring");
            return Ok(());
        }
        if self.cancel.as_ref().is_some_and(KillSwitch::is_killed) {
            info!(process = %self.label, "cancelled before start; not spawning");
            return Err(WmlkitError::Cancelled(self.label.clone()));
        }

        info!(
            process = %self.label,
            binary = ?self.binary,
            args = ?self.args,
            "starting process"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| WmlkitError::Start {
            binary: self.binary.clone(),
            source,
        })?;

        self.stdout = child.stdout.take().map(BufReader::new);
        self.stderr = child.stderr.take().map(BufReader::new);
        self.child = Some(child);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Next stdout line without its terminator, or `None` at end of stream.
    ///
    /// Also `None` when stdout is being drained by someone else.
    pub async fn read_stdout_line(&mut self) -> Option<String> {
        read_line(&mut self.stdout, StreamKind::Stdout, &self.label).await
    }

    /// Next stderr line without its terminator, or `None` at end of stream.
    pub async fn read_stderr_line(&mut self) -> Option<String> {
        read_line(&mut self.stderr, StreamKind::Stderr, &self.label).await
    }

    /// Hand stdout to a background drain loop. Returns `false` if stdout is
    /// no longer available (already monitored, taken, or closed).
    pub fn start_output_monitor(&mut self) -> bool {
        match self.stdout.take() {
            Some(reader) => {
                self.monitors.push(OutputMonitor::spawn(
                    StreamKind::Stdout,
                    self.label.clone(),
                    reader,
                    self.output.clone(),
                    self.stop_signal(),
                ));
                true
            }
            None => {
                debug!(process = %self.label, "stdout not available for monitoring");
                false
            }
        }
    }

    /// Hand stderr to a background drain loop.
    pub fn start_error_monitor(&mut self) -> bool {
        match self.stderr.take() {
            Some(reader) => {
                self.monitors.push(OutputMonitor::spawn(
                    StreamKind::Stderr,
                    self.label.clone(),
                    reader,
                    self.errors.clone(),
                    self.stop_signal(),
                ));
                true
            }
            None => {
                debug!(process = %self.label, "stderr not available for monitoring");
                false
            }
        }
    }

    /// Take ownership of the raw stdout reader, e.g. to feed a streaming
    /// parser.
    pub fn take_stdout(&mut self) -> Option<BufReader<ChildStdout>> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<BufReader<ChildStderr>> {
        self.stderr.take()
    }

    /// Text collected by the stdout monitor so far.
    pub fn output_text(&self) -> String {
        self.output.text()
    }

    /// Text collected by the stderr monitor so far.
    pub fn error_text(&self) -> String {
        self.errors.text()
    }

    /// Block until the process terminates.
    ///
    /// Once this returns, the direct readers are closed and every monitor has
    /// stopped. Waiting again returns the same status.
    pub async fn wait(&mut self) -> WaitStatus {
        match self.state {
            SessionState::NotStarted => return WaitStatus::NotStarted,
            SessionState::Finished(status) => return status,
            SessionState::Running => {}
        }

        let mut stop = self.stop_signal();
        let Some(child) = self.child.as_mut() else {
            return WaitStatus::NotStarted;
        };

        let status = tokio::select! {
            biased;

            _ = stop.raised() => {
                info!(process = %self.label, "kill requested while waiting; killing process");
                if let Err(e) = child.kill().await {
                    warn!(process = %self.label, error = %e, "failed to kill process");
                }
                WaitStatus::Interrupted
            }

            res = child.wait() => match res {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    info!(
                        process = %self.label,
                        exit_code = code,
                        success = status.success(),
                        "process exited"
                    );
                    WaitStatus::Exited(code)
                }
                Err(e) => {
                    warn!(process = %self.label, error = %e, "waiting for process failed");
                    WaitStatus::Interrupted
                }
            },
        };

        self.finish(status).await;
        status
    }

    /// Request termination of this session only. With `wait_for_termination`
    /// the call returns only after the OS reports the process gone. Monitors
    /// are always told to stop.
    pub async fn kill(&mut self, wait_for_termination: bool) {
        self.kill_switch.kill();

        if self.state != SessionState::Running {
            return;
        }
        let Some(child) = self.child.as_mut() else {
            return;
        };

        info!(process = %self.label, "killing process");
        if let Err(e) = child.start_kill() {
            // Already exited and reaped.
            debug!(process = %self.label, error = %e, "start_kill failed");
        }

        if wait_for_termination {
            match child.wait().await {
                Ok(status) => {
                    debug!(process = %self.label, ?status, "process terminated after kill");
                }
                Err(e) => {
                    warn!(process = %self.label, error = %e, "waiting after kill failed");
                }
            }
            self.finish(WaitStatus::Interrupted).await;
        }
    }

    /// Whether this session was killed or its shared cancel switch raised.
    pub fn was_killed(&self) -> bool {
        self.stop_signal().is_raised()
    }

    async fn finish(&mut self, status: WaitStatus) {
        self.state = SessionState::Finished(status);
        self.child = None;
        self.stdout = None;
        self.stderr = None;

        for monitor in &mut self.monitors {
            if timeout(MONITOR_GRACE, monitor.join()).await.is_err() {
                warn!(
                    process = %self.label,
                    stream = %monitor.kind(),
                    "monitor still draining after exit; cancelling"
                );
                monitor.abort();
                monitor.join().await;
            }
        }
    }
}

impl fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSession")
            .field("binary", &self.binary)
            .field("args", &self.args)
            .field("state", &self.state)
            .field("monitors", &self.monitors)
            .finish()
    }
}

async fn read_line<R>(
    slot: &mut Option<BufReader<R>>,
    kind: StreamKind,
    label: &str,
) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let reader = slot.as_mut()?;
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => {
            *slot = None;
            None
        }
        Ok(_) => Some(normalize_line(line)),
        Err(e) => {
            warn!(process = %label, stream = %kind, error = %e, "read failed; treating as end of stream");
            *slot = None;
            None
        }
    }
}

/// Strip a trailing `\n` or `\r\n`.
fn normalize_line(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
