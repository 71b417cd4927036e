//! Regex extractor: one key per pattern match

use crate::error::{IndexError, IndexResult};
use crate::extract::{IndexSink, LineIndexer};
use regex::bytes::Regex;

/// Emits a key for every match of a pattern within the line.
///
/// If the pattern has a first capture group, that group's text is the key;
/// otherwise the whole match is. The emitted offset is the key's position
/// within the line.
pub struct RegexIndexer {
    pattern: Regex,
}

impl RegexIndexer {
    pub fn new(pattern: &str) -> IndexResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| IndexError::Config(format!("invalid regex: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl LineIndexer for RegexIndexer {
    fn index(&mut self, sink: &mut dyn IndexSink, line: &[u8]) -> IndexResult<()> {
        for caps in self.pattern.captures_iter(line) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(0)) {
                sink.add(m.as_bytes(), m.start() as u64)?;
            }
        }
        Ok(())
    }
}
