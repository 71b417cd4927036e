//! Line detection over arbitrarily chunked decompressed output
//!
//! The decoder hands the finder whatever slab sizes it produces; lines may
//! span any number of slabs. The finder tracks the uncompressed byte offset
//! of every line start and invokes a sink with each complete line, with the
//! terminating newline stripped.
//!
//! Offsets carry a trailing sentinel equal to the total byte count, so the
//! stored length of line N is `offsets[N+1] - offsets[N]` (newline
//! included). A final unterminated line is emitted at end of input and its
//! length runs to the end of the stream.

use crate::error::IndexResult;

/// Receives complete lines as they are discovered.
///
/// `bytes` excludes the terminating newline; `offset` is the uncompressed
/// byte offset of the line's first character. Line numbers are 1-based.
pub trait LineSink {
    fn on_line(&mut self, line: u64, offset: u64, bytes: &[u8]) -> IndexResult<()>;
}

/// Incremental newline scanner with per-line offset tracking
pub struct LineFinder {
    offsets: Vec<u64>,
    pending: Vec<u8>,
    cursor: u64,
    line_start: u64,
    in_line: bool,
    lines: u64,
}

impl LineFinder {
    pub fn new() -> Self {
        Self {
            offsets: Vec::new(),
            pending: Vec::new(),
            cursor: 0,
            line_start: 0,
            in_line: false,
            lines: 0,
        }
    }

    /// Consume the next slab of decompressed bytes.
    ///
    /// Pass `last = true` with the final slab (which may be empty) to flush
    /// a trailing unterminated line and record the end sentinel.
    pub fn add(&mut self, data: &[u8], last: bool, sink: &mut dyn LineSink) -> IndexResult<()> {
        let mut rest = data;
        while !rest.is_empty() {
            if !self.in_line {
                self.in_line = true;
                self.line_start = self.cursor;
                self.offsets.push(self.cursor);
            }
            match rest.iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    self.lines += 1;
                    if self.pending.is_empty() {
                        sink.on_line(self.lines, self.line_start, &rest[..nl])?;
                    } else {
                        self.pending.extend_from_slice(&rest[..nl]);
                        let line = std::mem::take(&mut self.pending);
                        sink.on_line(self.lines, self.line_start, &line)?;
                    }
                    self.cursor += (nl + 1) as u64;
                    self.in_line = false;
                    rest = &rest[nl + 1..];
                }
                None => {
                    self.pending.extend_from_slice(rest);
                    self.cursor += rest.len() as u64;
                    rest = &[];
                }
            }
        }
        if last {
            if self.in_line {
                self.lines += 1;
                let line = std::mem::take(&mut self.pending);
                sink.on_line(self.lines, self.line_start, &line)?;
                self.in_line = false;
            }
            self.offsets.push(self.cursor);
        }
        Ok(())
    }

    /// Offsets of every line start, plus the end sentinel once the final
    /// slab has been added.
    pub fn line_offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Total uncompressed bytes consumed so far.
    pub fn total_bytes(&self) -> u64 {
        self.cursor
    }
}

impl Default for LineFinder {
    fn default() -> Self {
        Self::new()
    }
}
