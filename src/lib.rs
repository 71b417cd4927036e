//! # gzindex
//!
//! Random-access line index for gzip- and zlib-compressed text files.
//!
//! Retrieving line N from a compressed file normally means decompressing
//! everything before it. gzindex builds a one-file SQLite index holding
//! bit-accurate DEFLATE checkpoints (compressed position, bit offset, and a
//! 32 KiB window snapshot), per-line offsets, and optional key-to-line
//! indexes, so a cold reader can jump near the target and decode only a
//! checkpoint's worth of data.
//!
//! ## Features
//!
//! - **Bit-level resume**: checkpoints at DEFLATE block boundaries, even
//!   when those fall mid-byte
//! - **Line addressing**: fetch any line by number without a full
//!   decompress
//! - **Secondary indexes**: field, regex, or external-command key
//!   extractors mapping keys to line numbers
//! - **Single-file format**: one SQLite database, openable read-only
//!
//! ## Modules
//!
//! - [`deflate`]: raw zlib wrapper and window snapshots
//! - [`lines`]: newline detection over chunked output
//! - [`extract`]: key extractors
//! - [`store`]: SQLite persistence
//! - [`index`]: builder and reader
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gzindex::{BuildConfig, FieldIndexer, IndexBuilder, IndexReader, LineSink};
//! use std::path::Path;
//!
//! fn main() -> gzindex::IndexResult<()> {
//!     let gz = Path::new("access.log.gz");
//!     let idx = Path::new("access.log.gz.gzidx");
//!
//!     // Build, indexing field 2 of each comma-separated line
//!     let mut builder = IndexBuilder::new(gz, idx, BuildConfig::default())?;
//!     builder.add_indexer(
//!         "user",
//!         "field 2 separated by ,",
//!         false,
//!         false,
//!         Box::new(FieldIndexer::new(b',', 2)),
//!     )?;
//!     builder.build()?;
//!
//!     // Query
//!     struct Print;
//!     impl LineSink for Print {
//!         fn on_line(&mut self, _line: u64, _offset: u64, bytes: &[u8]) -> gzindex::IndexResult<()> {
//!             println!("{}", String::from_utf8_lossy(bytes));
//!             Ok(())
//!         }
//!     }
//!     let mut reader = IndexReader::open(gz, idx, false)?;
//!     let lines = reader.query_index("user", "alice")?;
//!     reader.get_lines(&lines, &mut Print)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deflate;
pub mod error;
pub mod extract;
pub mod index;
pub mod lines;
pub mod store;

// Re-export top-level types for convenience
pub use config::{BuildConfig, Config};
pub use error::{IndexError, IndexResult};

pub use deflate::{Framing, InflateStep, ZStream, WINDOW_SIZE};
pub use extract::{ExternalIndexer, FieldIndexer, IndexSink, LineIndexer, RegexIndexer};
pub use index::{IndexBuilder, IndexReader};
pub use lines::{LineFinder, LineSink};
pub use store::{AccessPoint, IndexInfo, LineLocation, Store};
