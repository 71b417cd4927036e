//! Random-access reads over a built index
//!
//! Opening validates the companion compressed file against the recorded
//! metadata (size and mtime); a mismatch is fatal unless `force` is set,
//! in which case the reader proceeds with a warning.
//!
//! `get_line` resolves the covering access point, seeks the compressed
//! file to its bit-level position, primes and re-seeds a raw decoder with
//! the stored window, discards output up to the line's offset, then
//! captures exactly the line's bytes. The decoder lives only for the one
//! query.

use crate::deflate::stream::{Framing, ZStream};
use crate::deflate::{window, CHUNK_SIZE, WINDOW_SIZE};
use crate::error::{IndexError, IndexResult};
use crate::lines::LineSink;
use crate::store::{IndexInfo, Store};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Reads lines and key lookups from an existing index
pub struct IndexReader {
    compressed: File,
    store: Store,
    metadata: HashMap<String, String>,
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl IndexReader {
    /// Open an index and its companion compressed file.
    ///
    /// With `force`, staleness (size or mtime drift) is downgraded to a
    /// warning; queries against regions the drift invalidated may fail or
    /// return garbage, which the caller accepted.
    pub fn open(compressed_path: &Path, index_path: &Path, force: bool) -> IndexResult<Self> {
        let compressed = File::open(compressed_path)?;
        let store = Store::open_read_only(index_path)?;

        // An index without readable metadata is usable, just unvalidated
        let metadata = match store.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("failed to read index metadata: {}", e);
                HashMap::new()
            }
        };

        let reader = Self {
            compressed,
            store,
            metadata,
        };
        reader.validate(force)?;
        Ok(reader)
    }

    fn validate(&self, force: bool) -> IndexResult<()> {
        let stat = self.compressed.metadata()?;

        let size = stat.len().to_string();
        if let Some(expected) = self.metadata.get("compressedSize") {
            if *expected != size {
                if force {
                    tracing::warn!(
                        "compressed size mismatch ({} vs expected {}), continuing anyway",
                        size,
                        expected
                    );
                } else {
                    return Err(IndexError::StaleIndex(format!(
                        "compressed size changed since the index was built ({} vs {})",
                        size, expected
                    )));
                }
            }
        }

        let mod_time = stat
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_string();
        if let Some(expected) = self.metadata.get("compressedModTime") {
            if *expected != mod_time {
                if force {
                    tracing::warn!("compressed mtime mismatch, continuing anyway");
                } else {
                    return Err(IndexError::StaleIndex(
                        "compressed file has been modified since the index was built".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fetch line `line`, emitting it to `sink` without its newline.
    ///
    /// A line number with no LineOffsets row emits nothing and returns Ok.
    pub fn get_line(&mut self, line: u64, sink: &mut dyn LineSink) -> IndexResult<()> {
        let loc = match self.store.find_access_point(line)? {
            Some(loc) => loc,
            None => return Ok(()),
        };

        let dictionary = window::restore(&loc.window)?;
        let mut zs = ZStream::new(Framing::Raw)?;

        let seek_to = if loc.bit_offset != 0 {
            loc.compressed_offset - 1
        } else {
            loc.compressed_offset
        };
        self.compressed.seek(SeekFrom::Start(seek_to))?;
        if loc.bit_offset != 0 {
            let mut byte = [0u8; 1];
            self.compressed.read_exact(&mut byte)?;
            zs.prime(loc.bit_offset, byte[0] >> (8 - loc.bit_offset))?;
        }
        zs.set_dictionary(&dictionary)?;

        let mut line_buf = vec![0u8; loc.length as usize];
        let mut filled = 0usize;
        let mut to_skip = loc.offset - loc.uncompressed_offset;
        let mut discard = vec![0u8; WINDOW_SIZE];
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut have = 0usize;
        let mut pos = 0usize;

        while filled < line_buf.len() {
            if pos == have {
                have = self.compressed.read(&mut chunk)?;
                if have == 0 {
                    return Err(IndexError::CorruptStream(
                        "compressed stream ended before the requested line".to_string(),
                    ));
                }
                pos = 0;
            }
            let step = if to_skip > 0 {
                let take = to_skip.min(WINDOW_SIZE as u64) as usize;
                let step = zs.step(&chunk[pos..have], &mut discard[..take])?;
                to_skip -= step.produced as u64;
                step
            } else {
                let step = zs.step(&chunk[pos..have], &mut line_buf[filled..])?;
                filled += step.produced;
                step
            };
            pos += step.consumed;
            if step.stream_end && filled < line_buf.len() {
                return Err(IndexError::CorruptStream(
                    "compressed stream ended before the requested line".to_string(),
                ));
            }
        }

        // Visible slice drops the terminating newline
        let logical = line_buf.len().saturating_sub(1);
        sink.on_line(line, loc.offset, &line_buf[..logical])
    }

    /// Fetch several lines in order, one `get_line` each.
    pub fn get_lines(&mut self, lines: &[u64], sink: &mut dyn LineSink) -> IndexResult<()> {
        for &line in lines {
            self.get_line(line, sink)?;
        }
        Ok(())
    }

    /// All line numbers matching `key` in the named index.
    pub fn query_index(&self, name: &str, key: &str) -> IndexResult<Vec<u64>> {
        self.store.query_index(name, key.as_bytes())
    }

    /// Row count of the named index.
    pub fn index_size(&self, name: &str) -> IndexResult<u64> {
        self.store.index_size(name)
    }

    /// The registered indexes.
    pub fn indexes(&self) -> IndexResult<Vec<IndexInfo>> {
        self.store.indexes()
    }

    /// Metadata recorded at build time.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
