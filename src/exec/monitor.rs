// src/exec/monitor.rs

//! Background drain loops for child output pipes.
//!
//! A monitor owns one pipe reader and appends every line it reads (plus a
//! trailing `\n`) to a shared accumulator. It stops on EOF, on a read error
//! (treated as EOF), or as soon as the session's stop signal is raised; the
//! signal is checked while a read is pending, not only between lines.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::exec::session::StopSignal;

/// Which output pipe a reader or monitor is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Shared text buffer a monitor appends to.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    inner: Arc<Mutex<String>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_line(&self, line: &str) {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push_str(line);
        buf.push('\n');
    }

    /// Snapshot of everything collected so far.
    pub fn text(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle to a running drain loop.
pub struct OutputMonitor {
    kind: StreamKind,
    handle: Option<JoinHandle<()>>,
}

impl OutputMonitor {
    /// Spawn a drain loop over `reader`.
    ///
    /// `stop` is the session's stop signal; the loop exits once it is
    /// raised.
    pub fn spawn<R>(
        kind: StreamKind,
        label: String,
        reader: BufReader<R>,
        accumulator: Accumulator,
        mut stop: StopSignal,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut lines = reader.lines();
            let mut count: usize = 0;

            loop {
                if stop.is_raised() {
                    debug!(process = %label, stream = %kind, "monitor cancelled");
                    break;
                }

                tokio::select! {
                    biased;

                    // Re-checked at the top of the loop.
                    _ = stop.raised() => {}

                    next = lines.next_line() => match next {
                        Ok(Some(line)) => {
                            count += 1;
                            accumulator.push_line(&line);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(
                                process = %label,
                                stream = %kind,
                                error = %e,
                                "read failed; treating as end of stream"
                            );
                            break;
                        }
                    },
                }
            }

            debug!(process = %label, stream = %kind, lines = count, "monitor finished");
        });

        Self {
            kind,
            handle: Some(handle),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the drain loop at its next suspension point.
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Wait for the drain loop to end. Returns immediately if it was already
    /// joined.
    pub async fn join(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                debug!(stream = %self.kind, "monitor aborted");
            }
            Err(e) => {
                warn!(stream = %self.kind, error = %e, "monitor task failed");
            }
        }
        self.handle = None;
    }
}

impl fmt::Debug for OutputMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMonitor")
            .field("kind", &self.kind)
            .field("finished", &self.is_finished())
            .finish()
    }
}
