// src/parse/defines.rs

//! Macro ("define") records from the parser's element stream.
//!
//! ```xml
//! <preproc_define>
//!   <name>UNIT_HEAL</name>
//!   <value>{AMOUNT} heals</value>
//!   <textdomain>wesnoth-help</textdomain>
//!   <linenum>12</linenum>
//!   <location>data/core/macros/abilities.cfg</location>
//!   <argument><name>AMOUNT</name></argument>
//! </preproc_define>
//! ```
//!
//! A `name` child means the define's name inside the record, and the
//! argument's name inside an `argument` wrapper; which one applies is tracked
//! by [`ParserState`], switched on entering and leaving `argument`.

use std::collections::HashMap;
use std::collections::hash_map;
use std::ops::ControlFlow;

use tokio::io::AsyncBufRead;
use tracing::{debug, warn};

use crate::parse::ParseError;
use crate::parse::stream::{ElementStack, ElementVisitor, drive};

pub const DEFINE_ELEMENT: &str = "preproc_define";
pub const ARGUMENT_ELEMENT: &str = "argument";

/// A named preprocessor macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
    pub textdomain: String,
    /// Line of the definition in `location`; 0 when the record had none.
    pub line: u32,
    pub location: String,
    /// Parameter names in declaration order.
    pub arguments: Vec<String>,
}

/// Name-keyed define table. A later record with the same name replaces the
/// earlier one.
#[derive(Debug, Clone, Default)]
pub struct DefineTable {
    entries: HashMap<String, Define>,
}

impl DefineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `define`, returning the record it replaced, if any.
    pub fn insert(&mut self, define: Define) -> Option<Define> {
        let replaced = self.entries.insert(define.name.clone(), define);
        if let Some(old) = &replaced {
            debug!(
                name = %old.name,
                location = %old.location,
                line = old.line,
                "define redefined; keeping the later record"
            );
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&Define> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Values<'_, String, Define> {
        self.entries.values()
    }

    /// Define names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn into_inner(self) -> HashMap<String, Define> {
        self.entries
    }
}

/// Counters for one parse run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Records handed to the sink.
    pub committed: usize,
    /// Records dropped because a field was malformed.
    pub rejected: usize,
    /// The sink asked to stop before the end of the stream.
    pub stopped_early: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Outside,
    InRecord,
    InArgument,
}

#[derive(Debug, Default)]
struct Scratch {
    name: String,
    value: String,
    textdomain: String,
    linenum: String,
    location: String,
    arguments: Vec<String>,
}

impl Scratch {
    fn into_define(self) -> Result<Define, ParseError> {
        let raw_line = self.linenum.trim();
        let line = if raw_line.is_empty() {
            0
        } else {
            raw_line
                .parse::<u32>()
                .map_err(|source| ParseError::InvalidLineNumber {
                    record: self.name.trim().to_string(),
                    value: raw_line.to_string(),
                    source,
                })?
        };

        Ok(Define {
            name: self.name.trim().to_string(),
            value: self.value,
            textdomain: self.textdomain.trim().to_string(),
            line,
            location: self.location.trim().to_string(),
            arguments: self
                .arguments
                .into_iter()
                .map(|a| a.trim().to_string())
                .collect(),
        })
    }
}

struct DefineParser<F> {
    state: ParserState,
    scratch: Scratch,
    sink: F,
    summary: ParseSummary,
}

impl<F> DefineParser<F>
where
    F: FnMut(Define) -> ControlFlow<()>,
{
    fn new(sink: F) -> Self {
        Self {
            state: ParserState::Outside,
            scratch: Scratch::default(),
            sink,
            summary: ParseSummary::default(),
        }
    }

    fn commit(&mut self) -> ControlFlow<()> {
        let scratch = std::mem::take(&mut self.scratch);
        match scratch.into_define() {
            Ok(define) => {
                self.summary.committed += 1;
                (self.sink)(define)
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed define record");
                self.summary.rejected += 1;
                ControlFlow::Continue(())
            }
        }
    }
}

impl<F> ElementVisitor for DefineParser<F>
where
    F: FnMut(Define) -> ControlFlow<()>,
{
    fn enter(&mut self, stack: &ElementStack, _attributes: &[(String, String)]) -> ControlFlow<()> {
        match (self.state, stack.top()) {
            (ParserState::Outside, Some(DEFINE_ELEMENT)) => {
                self.scratch = Scratch::default();
                self.state = ParserState::InRecord;
            }
            (ParserState::InRecord, Some(ARGUMENT_ELEMENT)) => {
                self.scratch.arguments.push(String::new());
                self.state = ParserState::InArgument;
            }
            (ParserState::InRecord | ParserState::InArgument, Some(DEFINE_ELEMENT)) => {
                warn!(depth = stack.depth(), "nested define record; discarding the open one");
                self.scratch = Scratch::default();
                self.state = ParserState::InRecord;
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn text(&mut self, stack: &ElementStack, text: &str) -> ControlFlow<()> {
        let field = match (self.state, stack.top()) {
            (ParserState::InRecord, Some("name")) => &mut self.scratch.name,
            (ParserState::InRecord, Some("value")) => &mut self.scratch.value,
            (ParserState::InRecord, Some("textdomain")) => &mut self.scratch.textdomain,
            (ParserState::InRecord, Some("linenum")) => &mut self.scratch.linenum,
            (ParserState::InRecord, Some("location")) => &mut self.scratch.location,
            (ParserState::InArgument, Some("name")) => match self.scratch.arguments.last_mut() {
                Some(arg) => arg,
                None => return ControlFlow::Continue(()),
            },
            _ => return ControlFlow::Continue(()),
        };
        field.push_str(text);
        ControlFlow::Continue(())
    }

    fn exit(&mut self, _stack: &ElementStack, name: &str) -> ControlFlow<()> {
        match (self.state, name) {
            (ParserState::InArgument, ARGUMENT_ELEMENT) => {
                self.state = ParserState::InRecord;
                ControlFlow::Continue(())
            }
            (ParserState::InRecord, DEFINE_ELEMENT) => {
                self.state = ParserState::Outside;
                self.commit()
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Parse `source` and hand every completed define to `sink` as soon as its
/// record closes. The sink can stop the stream by returning `Break`.
pub async fn stream_defines<R, F>(source: R, sink: F) -> Result<ParseSummary, ParseError>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Define) -> ControlFlow<()>,
{
    let mut parser = DefineParser::new(sink);
    let outcome = drive(source, &mut parser).await?;

    let mut summary = parser.summary;
    summary.stopped_early = outcome.stopped_early;
    debug!(
        committed = summary.committed,
        rejected = summary.rejected,
        stopped_early = summary.stopped_early,
        "define stream finished"
    );
    Ok(summary)
}

/// Parse all of `source` into a table.
pub async fn collect_defines<R>(source: R) -> Result<(DefineTable, ParseSummary), ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut table = DefineTable::new();
    let summary = stream_defines(source, |define| {
        table.insert(define);
        ControlFlow::Continue(())
    })
    .await?;
    Ok((table, summary))
}
