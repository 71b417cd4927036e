//! External extractor: keys supplied by a child process
//!
//! The child is spawned once per build via `sh -c COMMAND` with both of its
//! standard streams piped. The protocol is strict request/response: the
//! builder writes one line (newline-terminated) to the child's stdin, then
//! reads exactly one newline-terminated response from its stdout. The
//! response is split on a separator byte into zero or more keys. A child
//! that buffers responses instead of answering line-by-line will deadlock
//! the exchange, so commands must run unbuffered (`grep --line-buffered`,
//! `sed -u`, `awk` with `fflush()`).

use crate::error::IndexResult;
use crate::extract::{IndexSink, LineIndexer};
use std::io::{BufRead, BufReader, Error, ErrorKind, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Asks a user-supplied command for the keys of each line.
///
/// Every key is emitted with offset 0; the child has no way to report
/// positions within the original line.
pub struct ExternalIndexer {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    separator: u8,
}

impl ExternalIndexer {
    pub fn new(command: &str, separator: u8) -> IndexResult<Self> {
        tracing::debug!("spawning external indexer: {}", command);
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::new(ErrorKind::BrokenPipe, "child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::new(ErrorKind::BrokenPipe, "child stdout not captured"))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            separator,
        })
    }
}

impl LineIndexer for ExternalIndexer {
    fn index(&mut self, sink: &mut dyn IndexSink, line: &[u8]) -> IndexResult<()> {
        self.stdin.write_all(line)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;

        let mut response = Vec::new();
        let n = self.stdout.read_until(b'\n', &mut response)?;
        if n == 0 {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "external indexer closed its output",
            )
            .into());
        }
        if response.last() == Some(&b'\n') {
            response.pop();
        }

        for key in response.split(|&b| b == self.separator) {
            if !key.is_empty() {
                sink.add(key, 0)?;
            }
        }
        Ok(())
    }
}

impl Drop for ExternalIndexer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_util::KeyCollector;

    #[test]
    fn test_identity_command_splits_response() {
        let mut indexer = ExternalIndexer::new("cat", b',').unwrap();
        let mut sink = KeyCollector::default();
        indexer.index(&mut sink, b"k1,k2,k3").unwrap();
        assert_eq!(
            sink.keys,
            vec![
                (b"k1".to_vec(), 0),
                (b"k2".to_vec(), 0),
                (b"k3".to_vec(), 0),
            ]
        );
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        let mut indexer = ExternalIndexer::new("cat", b',').unwrap();
        let mut sink = KeyCollector::default();
        indexer.index(&mut sink, b",k1,,").unwrap();
        assert_eq!(sink.keys, vec![(b"k1".to_vec(), 0)]);
    }

    #[test]
    fn test_multiple_exchanges_stay_in_sync() {
        let mut indexer = ExternalIndexer::new("cat", b' ').unwrap();
        for i in 0..10 {
            let line = format!("key{}", i);
            let mut sink = KeyCollector::default();
            indexer.index(&mut sink, line.as_bytes()).unwrap();
            assert_eq!(sink.keys, vec![(line.into_bytes(), 0)]);
        }
    }

    #[test]
    fn test_exited_child_reports_eof() {
        let mut indexer = ExternalIndexer::new("true", b',').unwrap();
        let mut sink = KeyCollector::default();
        // The child exits immediately; either the write or the read fails.
        assert!(indexer.index(&mut sink, b"anything").is_err());
    }
}
