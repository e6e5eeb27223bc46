// src/markers.rs

//! Translation of plain-text tool diagnostics into structured records.
//!
//! The tools print one diagnostic per line:
//!
//! ```text
//! "data/core/units.cfg", line 42: unknown attribute
//! ```
//!
//! Around those lines they also print comments (`# ...`), progress chatter
//! and `%%`-delimited checksum blocks. All of those are skipped silently;
//! everything inside a checksum block is skipped whatever it looks like.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::types::Severity;

static DIAGNOSTIC_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^"([^"]+)", line (\d+): (.*)$"#)
        .map_err(|e| warn!(error = %e, "diagnostic pattern failed to compile"))
        .ok()
});

const CHECKSUM_DELIMITER: &str = "%%";

/// One diagnostic, ready for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub file: String,
    pub line: u32,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}: {}", self.file, self.line, self.severity, self.message)
    }
}

/// What a single line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Diagnostic(DiagnosticRecord),
    Blank,
    Comment,
    Progress,
    ChecksumDelimiter,
    /// Looked like a diagnostic but did not parse.
    Malformed,
    Unrecognized,
}

/// Stateful translator for one output stream. The only state is whether the
/// stream is currently inside a checksum block.
#[derive(Debug, Clone)]
pub struct MarkerTranslator {
    in_checksum_block: bool,
    default_severity: Severity,
}

impl MarkerTranslator {
    pub fn new(default_severity: Severity) -> Self {
        Self {
            in_checksum_block: false,
            default_severity,
        }
    }

    pub fn in_checksum_block(&self) -> bool {
        self.in_checksum_block
    }

    /// Record for `line`, or `None` if the line carries no diagnostic.
    pub fn translate(&mut self, line: &str) -> Option<DiagnosticRecord> {
        let trimmed = line.trim();

        if trimmed.starts_with(CHECKSUM_DELIMITER) {
            self.in_checksum_block = !self.in_checksum_block;
            return None;
        }
        if self.in_checksum_block {
            return None;
        }

        match classify(trimmed, self.default_severity) {
            LineKind::Diagnostic(record) => Some(record),
            LineKind::Malformed => {
                warn!(line = %trimmed, "dropping malformed diagnostic line");
                None
            }
            LineKind::Unrecognized => {
                debug!(line = %trimmed, "ignoring unrecognized output line");
                None
            }
            _ => None,
        }
    }

    pub fn translate_all<'a, I>(&mut self, lines: I) -> Vec<DiagnosticRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.translate(line))
            .collect()
    }
}

/// Translate a batch of lines with fresh checksum-block state.
pub fn translate_lines<'a, I>(lines: I, default_severity: Severity) -> Vec<DiagnosticRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    MarkerTranslator::new(default_severity).translate_all(lines)
}

/// Stateless parse of a single line. Checksum blocks are not tracked.
pub fn parse_diagnostic(line: &str, default_severity: Severity) -> Option<DiagnosticRecord> {
    match classify(line.trim(), default_severity) {
        LineKind::Diagnostic(record) => Some(record),
        _ => None,
    }
}

/// Classify an already trimmed line.
pub fn classify(line: &str, default_severity: Severity) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    if line.starts_with(CHECKSUM_DELIMITER) {
        return LineKind::ChecksumDelimiter;
    }
    if !line.starts_with('"') {
        return if is_progress(line) {
            LineKind::Progress
        } else {
            LineKind::Unrecognized
        };
    }

    let Some(caps) = DIAGNOSTIC_RE.as_ref().and_then(|re| re.captures(line)) else {
        return LineKind::Malformed;
    };

    let Ok(line_no) = caps[2].parse::<u32>() else {
        return LineKind::Malformed;
    };

    let message = caps[3].trim().to_string();
    LineKind::Diagnostic(DiagnosticRecord {
        file: caps[1].to_string(),
        line: line_no,
        severity: infer_severity(&message).unwrap_or(default_severity),
        message,
    })
}

fn is_progress(line: &str) -> bool {
    line.starts_with("--") || line.starts_with("==") || line.ends_with("...")
}

fn infer_severity(message: &str) -> Option<Severity> {
    let lower = message.to_ascii_lowercase();
    if lower.starts_with("error") {
        Some(Severity::Error)
    } else if lower.starts_with("warning") {
        Some(Severity::Warning)
    } else {
        None
    }
}
