// src/parse/mod.rs

//! Incremental parsers for the structured (XML) output of the WML tools.
//!
//! The parsers read straight from a child's stdout while the child is still
//! writing, so a large dump never has to fit in a pipe buffer. They keep an
//! explicit stack of open element names ([`stream::ElementStack`]) and hand
//! each event to a small visitor:
//!
//! - [`defines`] turns `preproc_define` records into [`Define`]s.
//! - [`ids`] pulls the `id` of `campaign` / `scenario` elements and can stop
//!   at the first one.

pub mod defines;
pub mod ids;
pub mod stream;

use std::num::ParseIntError;

use thiserror::Error;

pub use defines::{Define, DefineTable, ParseSummary, collect_defines, stream_defines};
pub use ids::{collect_ids, find_first_id};
pub use stream::{ElementStack, ElementVisitor, StreamOutcome, drive};

#[derive(Error, Debug)]
pub enum ParseError {
    /// One record carried a non-integer line number. Only that record is
    /// lost.
    #[error("invalid line number {value:?} in define {record:?}: {source}")]
    InvalidLineNumber {
        record: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The element stream itself is broken; parsing cannot continue.
    #[error("malformed element stream at byte {position}: {message}")]
    Xml { position: u64, message: String },
}
