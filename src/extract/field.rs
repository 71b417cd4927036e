//! Field extractor: split by a separator byte, emit the Nth field

use crate::error::IndexResult;
use crate::extract::{IndexSink, LineIndexer};

/// Emits the Nth field (1-based) of each line, split on a single byte.
///
/// Lines with fewer than N fields emit nothing. The emitted offset is the
/// field's byte position within the line.
pub struct FieldIndexer {
    separator: u8,
    field: usize,
}

impl FieldIndexer {
    pub fn new(separator: u8, field: usize) -> Self {
        Self { separator, field }
    }
}

impl LineIndexer for FieldIndexer {
    fn index(&mut self, sink: &mut dyn IndexSink, line: &[u8]) -> IndexResult<()> {
        let mut start = 0usize;
        let mut current = 1usize;
        for (i, &b) in line.iter().enumerate() {
            if b == self.separator {
                if current == self.field {
                    return sink.add(&line[start..i], start as u64);
                }
                current += 1;
                start = i + 1;
            }
        }
        if current == self.field {
            sink.add(&line[start..], start as u64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_util::KeyCollector;

    fn keys_of(separator: u8, field: usize, line: &[u8]) -> Vec<(Vec<u8>, u64)> {
        let mut indexer = FieldIndexer::new(separator, field);
        let mut sink = KeyCollector::default();
        indexer.index(&mut sink, line).unwrap();
        sink.keys
    }

    #[test]
    fn test_middle_field() {
        assert_eq!(keys_of(b',', 2, b"x,k1,y"), vec![(b"k1".to_vec(), 2)]);
    }

    #[test]
    fn test_first_and_last_field() {
        assert_eq!(keys_of(b',', 1, b"x,k1,y"), vec![(b"x".to_vec(), 0)]);
        assert_eq!(keys_of(b',', 3, b"x,k1,y"), vec![(b"y".to_vec(), 4)]);
    }

    #[test]
    fn test_missing_field_emits_nothing() {
        assert!(keys_of(b',', 4, b"x,k1,y").is_empty());
        assert!(keys_of(b',', 2, b"nosep").is_empty());
    }

    #[test]
    fn test_trailing_separator_yields_empty_field() {
        assert_eq!(keys_of(b',', 2, b"a,"), vec![(b"".to_vec(), 2)]);
    }

    #[test]
    fn test_tab_separator() {
        assert_eq!(keys_of(b'\t', 2, b"a\tb\tc"), vec![(b"b".to_vec(), 2)]);
    }
}
