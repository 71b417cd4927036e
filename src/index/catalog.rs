//! Index catalog: fans lines out to registered extractors
//!
//! Each registered index pairs a name with an extractor and a key
//! discipline (alpha or numeric). Keys flow straight into the store through
//! a per-line sink; any extractor failure is wrapped with the line number
//! and raw contents so a broken row in a multi-gigabyte file can be found.

use crate::error::{IndexError, IndexResult};
use crate::extract::{IndexSink, LineIndexer};
use crate::store::Store;

struct IndexHandler {
    name: String,
    numeric: bool,
    indexer: Box<dyn LineIndexer>,
}

/// Sink for one (index, line) pair: parses keys per the index's discipline
/// and writes rows.
struct KeySink<'a> {
    store: &'a Store,
    name: &'a str,
    numeric: bool,
    line: u64,
}

impl IndexSink for KeySink<'_> {
    fn add(&mut self, key: &[u8], offset: u64) -> IndexResult<()> {
        if self.numeric {
            let value = parse_numeric(key)?;
            self.store.add_numeric_key(self.name, value, self.line, offset)
        } else {
            self.store.add_text_key(self.name, key, self.line, offset)
        }
    }
}

/// Parse an optionally-signed decimal integer key.
///
/// Rejects empty input, any non-digit after the optional leading `-`, and
/// values outside `i64`.
pub fn parse_numeric(key: &[u8]) -> IndexResult<i64> {
    let invalid = || IndexError::InvalidKey(String::from_utf8_lossy(key).into_owned());
    let (negative, digits) = match key.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, key),
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i64))
            .ok_or_else(invalid)?;
    }
    Ok(if negative { -value } else { value })
}

/// Registered extractors, one per named index
pub struct IndexCatalog {
    handlers: Vec<IndexHandler>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register an extractor: creates the backing table and remembers the
    /// handler for the build pass.
    pub fn register(
        &mut self,
        store: &Store,
        name: &str,
        creation: &str,
        numeric: bool,
        unique: bool,
        indexer: Box<dyn LineIndexer>,
    ) -> IndexResult<()> {
        store.register_index(name, creation, numeric, unique)?;
        self.handlers.push(IndexHandler {
            name: name.to_string(),
            numeric,
            indexer,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Fan one line out to every registered extractor.
    pub fn dispatch(&mut self, store: &Store, line: u64, bytes: &[u8]) -> IndexResult<()> {
        for handler in &mut self.handlers {
            let IndexHandler {
                name,
                numeric,
                indexer,
            } = handler;
            let mut sink = KeySink {
                store,
                name,
                numeric: *numeric,
                line,
            };
            indexer
                .index(&mut sink, bytes)
                .map_err(|e| IndexError::IndexingFailure {
                    line,
                    content: String::from_utf8_lossy(bytes).into_owned(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self::new()
    }
}
