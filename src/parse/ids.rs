// src/parse/ids.rs

//! `id` lookup for campaign and scenario elements.
//!
//! The parser dumps an attribute either as an XML attribute
//! (`<campaign id="foo">`) or as a child element (`<campaign><id>foo</id>`).
//! Both forms are accepted; only a direct child counts, so the id of a nested
//! `[side]` or `[unit]` is never mistaken for the campaign's.

use std::ops::ControlFlow;

use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::parse::ParseError;
use crate::parse::stream::{ElementStack, ElementVisitor, drive};

const ID: &str = "id";

struct IdFinder<'a> {
    tag: &'a str,
    limit: Option<usize>,
    ids: Vec<String>,
    /// Depth of the open target element whose id is still unknown.
    pending: Option<usize>,
    buffer: String,
}

impl<'a> IdFinder<'a> {
    fn new(tag: &'a str, limit: Option<usize>) -> Self {
        Self {
            tag,
            limit,
            ids: Vec::new(),
            pending: None,
            buffer: String::new(),
        }
    }

    fn record(&mut self, id: String) -> ControlFlow<()> {
        self.pending = None;
        debug!(tag = self.tag, %id, "found id");
        self.ids.push(id);
        match self.limit {
            Some(limit) if self.ids.len() >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    fn in_id_child(&self, stack: &ElementStack) -> bool {
        self.pending.is_some_and(|depth| stack.depth() == depth + 1)
            && stack.top() == Some(ID)
            && stack.parent() == Some(self.tag)
    }
}

impl ElementVisitor for IdFinder<'_> {
    fn enter(&mut self, stack: &ElementStack, attributes: &[(String, String)]) -> ControlFlow<()> {
        if stack.top() == Some(self.tag) {
            let from_attribute = attributes
                .iter()
                .find(|(key, value)| key == ID && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string());

            match from_attribute {
                Some(id) => return self.record(id),
                None => self.pending = Some(stack.depth()),
            }
        } else if self.in_id_child(stack) {
            self.buffer.clear();
        }
        ControlFlow::Continue(())
    }

    fn text(&mut self, stack: &ElementStack, text: &str) -> ControlFlow<()> {
        if self.in_id_child(stack) {
            self.buffer.push_str(text);
        }
        ControlFlow::Continue(())
    }

    fn exit(&mut self, stack: &ElementStack, name: &str) -> ControlFlow<()> {
        let Some(depth) = self.pending else {
            return ControlFlow::Continue(());
        };

        if name == ID && stack.depth() == depth && stack.top() == Some(self.tag) {
            let id = self.buffer.trim().to_string();
            self.buffer.clear();
            if !id.is_empty() {
                return self.record(id);
            }
        } else if name == self.tag && stack.depth() + 1 == depth {
            // Target closed without an id.
            self.pending = None;
        }
        ControlFlow::Continue(())
    }
}

/// Id of the first `tag` element in `source`. Reading stops as soon as it is
/// known, so the caller can kill the producer early.
pub async fn find_first_id<R>(source: R, tag: &str) -> Result<Option<String>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut finder = IdFinder::new(tag, Some(1));
    drive(source, &mut finder).await?;
    Ok(finder.ids.into_iter().next())
}

/// Ids of every `tag` element in `source`, in document order.
pub async fn collect_ids<R>(source: R, tag: &str) -> Result<Vec<String>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut finder = IdFinder::new(tag, None);
    drive(source, &mut finder).await?;
    Ok(finder.ids)
}
