//! Key extractors
//!
//! An extractor derives zero or more keys from each line, enabling
//! key-to-line lookups over the compressed file. The builder fans every
//! line out to all registered extractors; each emitted key lands in that
//! extractor's index table.
//!
//! - [`FieldIndexer`]: Nth field of the line, split by a one-byte separator
//! - [`RegexIndexer`]: capture group 1 (or the whole match) per match
//! - [`ExternalIndexer`]: asks a child process for the keys, one request
//!   and one response line per input line

pub mod external;
pub mod field;
pub mod regex;

pub use self::external::ExternalIndexer;
pub use self::field::FieldIndexer;
pub use self::regex::RegexIndexer;

use crate::error::IndexResult;

/// Receives the keys an extractor emits for the current line.
pub trait IndexSink {
    /// Record one key. `offset` is a position within the line associated
    /// with the key (a field or match start), stored alongside the row.
    fn add(&mut self, key: &[u8], offset: u64) -> IndexResult<()>;
}

/// Derives keys from a line. One instance lives for the whole build.
pub trait LineIndexer {
    /// Emit zero or more keys for `line` (newline already stripped).
    fn index(&mut self, sink: &mut dyn IndexSink, line: &[u8]) -> IndexResult<()>;
}
