// src/parse/stream.rs

use std::borrow::Cow;
use std::ops::ControlFlow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::io::AsyncBufRead;
use tracing::{debug, warn};

use crate::parse::ParseError;

/// Names of the currently open elements, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementStack {
    names: Vec<String>,
}

impl ElementStack {
    pub fn top(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    /// The element enclosing the top one.
    pub fn parent(&self) -> Option<&str> {
        let len = self.names.len();
        if len < 2 {
            return None;
        }
        self.names.get(len - 2).map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn push(&mut self, name: String) {
        self.names.push(name);
    }

    fn pop(&mut self) -> Option<String> {
        self.names.pop()
    }
}

/// Receives the events of an element stream.
///
/// `enter` sees the stack with the new element already on top; `exit` sees
/// it after the element was popped. Returning `ControlFlow::Break` stops the
/// stream right there.
pub trait ElementVisitor {
    fn enter(&mut self, _stack: &ElementStack, _attributes: &[(String, String)]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn text(&mut self, _stack: &ElementStack, _text: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn exit(&mut self, _stack: &ElementStack, _name: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Number of elements opened.
    pub elements: usize,
    /// The visitor asked to stop before the end of the stream.
    pub stopped_early: bool,
}

/// Feed `source` to `visitor` event by event until EOF or until the visitor
/// breaks. Only the current event is buffered.
pub async fn drive<R, V>(source: R, visitor: &mut V) -> Result<StreamOutcome, ParseError>
where
    R: AsyncBufRead + Unpin,
    V: ElementVisitor + ?Sized,
{
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut stack = ElementStack::default();
    let mut outcome = StreamOutcome::default();

    loop {
        let event = reader
            .read_event_into_async(&mut buf)
            .await
            .map_err(|e| ParseError::Xml {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;

        let flow = match event {
            Event::Start(e) => {
                outcome.elements += 1;
                stack.push(local_name(&e));
                visitor.enter(&stack, &attributes(&e))
            }
            Event::Empty(e) => {
                outcome.elements += 1;
                stack.push(local_name(&e));
                match visitor.enter(&stack, &attributes(&e)) {
                    ControlFlow::Break(()) => ControlFlow::Break(()),
                    ControlFlow::Continue(()) => {
                        let name = stack.pop().unwrap_or_default();
                        visitor.exit(&stack, &name)
                    }
                }
            }
            Event::End(e) => {
                let name = stack
                    .pop()
                    .unwrap_or_else(|| String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                visitor.exit(&stack, &name)
            }
            Event::Text(e) => {
                if stack.depth() == 0 {
                    ControlFlow::Continue(())
                } else {
                    let text = match e.unescape() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "undecodable text; using raw bytes");
                            Cow::Owned(String::from_utf8_lossy(&e).into_owned())
                        }
                    };
                    visitor.text(&stack, &text)
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                visitor.text(&stack, &text)
            }
            Event::Eof => break,
            _ => ControlFlow::Continue(()),
        };
        buf.clear();

        if flow.is_break() {
            debug!(elements = outcome.elements, "visitor stopped the stream early");
            outcome.stopped_early = true;
            break;
        }
    }

    Ok(outcome)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .filter_map(|attr| match attr {
            Ok(attr) => {
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                let value = match attr.unescape_value() {
                    Ok(v) => v.into_owned(),
                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                };
                Some((key, value))
            }
            Err(err) => {
                warn!(error = %err, "skipping malformed attribute");
                None
            }
        })
        .collect()
}
