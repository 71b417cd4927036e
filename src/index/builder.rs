//! Single-pass index construction
//!
//! One forward scan over the compressed file drives everything:
//!
//! ```text
//! compressed chunks → ZStream (Z_BLOCK)
//!                       ├─ output slabs → LineFinder → extractors → Store
//!                       └─ block boundaries → CheckpointManager → Store
//! ```
//!
//! The decoder writes into a 32 KiB ring shared with the checkpoint
//! manager; full slabs are forwarded to the line finder, and the partial
//! tail is flushed once the stream ends. Line offsets accumulate in memory
//! and are written in one burst at the end, inside the same transaction as
//! everything else.

use crate::config::BuildConfig;
use crate::deflate::stream::{Framing, ZStream};
use crate::deflate::{CHUNK_SIZE, WINDOW_SIZE};
use crate::error::{IndexError, IndexResult};
use crate::extract::LineIndexer;
use crate::index::catalog::IndexCatalog;
use crate::index::checkpoint::CheckpointManager;
use crate::lines::{LineFinder, LineSink};
use crate::store::Store;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant, UNIX_EPOCH};

const VERSION: u32 = 1;

/// Builds a fresh index file over a gzip/zlib-compressed text file
pub struct IndexBuilder {
    from: File,
    store: Store,
    config: BuildConfig,
    catalog: IndexCatalog,
}

/// Routes completed lines past the skip threshold into the catalog.
struct CatalogSink<'a> {
    store: &'a Store,
    catalog: &'a mut IndexCatalog,
    skip_first: u64,
}

impl LineSink for CatalogSink<'_> {
    fn on_line(&mut self, line: u64, _offset: u64, bytes: &[u8]) -> IndexResult<()> {
        if line <= self.skip_first {
            return Ok(());
        }
        self.catalog.dispatch(self.store, line, bytes)
    }
}

impl IndexBuilder {
    /// Create the index file and record metadata about the source.
    ///
    /// An existing index at `index_path` is replaced.
    pub fn new(compressed_path: &Path, index_path: &Path, config: BuildConfig) -> IndexResult<Self> {
        let from = File::open(compressed_path)?;
        let store = Store::create(index_path)?;

        let stat = from.metadata()?;
        let mod_time = stat
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        store.add_metadata("version", &VERSION.to_string())?;
        store.add_metadata("compressedFile", &compressed_path.to_string_lossy())?;
        store.add_metadata("compressedSize", &stat.len().to_string())?;
        store.add_metadata("compressedModTime", &mod_time.to_string())?;

        Ok(Self {
            from,
            store,
            config,
            catalog: IndexCatalog::new(),
        })
    }

    /// Register a key extractor under `name`. `creation` is a free-form
    /// description recorded in the registry (typically the CLI invocation
    /// that declared it).
    pub fn add_indexer(
        &mut self,
        name: &str,
        creation: &str,
        numeric: bool,
        unique: bool,
        indexer: Box<dyn LineIndexer>,
    ) -> IndexResult<()> {
        self.catalog
            .register(&self.store, name, creation, numeric, unique, indexer)
    }

    /// Run the build pass to completion and commit.
    pub fn build(mut self) -> IndexResult<()> {
        let compressed_size = self.from.metadata()?.len();
        tracing::info!(
            "building index, checkpoint every {}",
            pretty_bytes(self.config.index_every)
        );

        self.store.begin()?;

        let mut zs = ZStream::new(Framing::ZlibOrGzip)?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut ring = vec![0u8; WINDOW_SIZE];
        let mut fill = 0usize;
        let mut total_in = 0u64;
        let mut total_out = 0u64;
        let mut checkpoints = CheckpointManager::new(self.config.index_every);
        let mut finder = LineFinder::new();

        let progress_every = Duration::from_secs(self.config.progress_every_secs);
        let mut next_progress = Instant::now();

        let from = &mut self.from;
        let store = &self.store;
        let mut sink = CatalogSink {
            store,
            catalog: &mut self.catalog,
            skip_first: self.config.skip_first,
        };

        tracing::info!("indexing...");
        'stream: loop {
            let n = from.read(&mut chunk)?;
            if n == 0 {
                return Err(IndexError::CorruptStream(
                    "unexpected end of compressed input".to_string(),
                ));
            }
            let mut pos = 0;
            while pos < n {
                if fill == WINDOW_SIZE {
                    finder.add(&ring, false, &mut sink)?;
                    fill = 0;
                }
                let step = zs.step_block(&chunk[pos..n], &mut ring[fill..])?;
                pos += step.consumed;
                fill += step.produced;
                total_in += step.consumed as u64;
                total_out += step.produced as u64;
                if step.stream_end {
                    break 'stream;
                }
                if let Some(point) = checkpoints.observe(&step, total_in, total_out, &ring, fill)? {
                    store.add_access_point(&point)?;
                }
                let now = Instant::now();
                if now >= next_progress {
                    tracing::info!(
                        "progress: {} of {} ({:.2}%)",
                        pretty_bytes(total_in),
                        pretty_bytes(compressed_size),
                        (total_in as f64 * 100.0) / compressed_size.max(1) as f64
                    );
                    next_progress = now + progress_every;
                }
            }
        }

        if let Some(point) = checkpoints.finish(total_out) {
            store.add_access_point(&point)?;
        }
        tracing::info!("scan complete, {} uncompressed", pretty_bytes(total_out));

        finder.add(&ring[..fill], true, &mut sink)?;

        let offsets = finder.line_offsets();
        for (i, pair) in offsets.windows(2).enumerate() {
            store.add_line((i + 1) as u64, pair[0], pair[1] - pair[0])?;
        }

        tracing::info!("flushing {} lines", offsets.len().saturating_sub(1));
        self.store.commit()?;
        tracing::info!("done");
        Ok(())
    }
}

/// Human-readable byte count for log output.
pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FieldIndexer;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn write_gzip(data: &[u8]) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let gz_path = dir.path().join("data.gz");
        let idx_path = dir.path().join("data.gz.gzidx");
        let mut enc = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap();
        (dir, gz_path, idx_path)
    }

    #[test]
    fn test_simple_build_records_line_offsets() {
        let (_dir, gz, idx) = write_gzip(b"a\nb\nc\n");
        let builder = IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap();
        builder.build().unwrap();

        let store = Store::open_read_only(&idx).unwrap();
        assert_eq!(store.line_count().unwrap(), 3);

        let loc = store.find_access_point(2).unwrap().unwrap();
        assert_eq!(loc.offset, 2);
        assert_eq!(loc.length, 2);

        // Every small file still gets the point at offset zero
        let points = store.access_points().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].uncompressed_offset, 0);
        assert_eq!(points[0].uncompressed_end_offset, 5);
    }

    #[test]
    fn test_metadata_describes_source() {
        let (_dir, gz, idx) = write_gzip(b"hello\n");
        IndexBuilder::new(&gz, &idx, BuildConfig::default())
            .unwrap()
            .build()
            .unwrap();

        let store = Store::open_read_only(&idx).unwrap();
        let meta = store.metadata().unwrap();
        assert_eq!(meta.get("version").map(String::as_str), Some("1"));
        let expected_size = std::fs::metadata(&gz).unwrap().len().to_string();
        assert_eq!(meta.get("compressedSize"), Some(&expected_size));
        assert!(meta.contains_key("compressedModTime"));
        assert!(meta.get("compressedFile").unwrap().contains("data.gz"));
    }

    #[test]
    fn test_access_points_partition_output() {
        // Enough lines to cross many deflate block boundaries
        let data: Vec<u8> = (1..=200_000u64)
            .flat_map(|i| format!("{}\n", i).into_bytes())
            .collect();
        let (_dir, gz, idx) = write_gzip(&data);
        let config = BuildConfig {
            index_every: 64 * 1024,
            ..Default::default()
        };
        IndexBuilder::new(&gz, &idx, config).unwrap().build().unwrap();

        let store = Store::open_read_only(&idx).unwrap();
        let points = store.access_points().unwrap();
        assert!(points.len() >= 3, "expected several access points, got {}", points.len());

        assert_eq!(points[0].uncompressed_offset, 0);
        assert_eq!(
            points.last().unwrap().uncompressed_end_offset,
            data.len() as u64 - 1
        );
        for pair in points.windows(2) {
            assert_eq!(pair[0].uncompressed_end_offset + 1, pair[1].uncompressed_offset);
        }
        for point in &points {
            assert!(point.bit_offset <= 7);
        }
    }

    #[test]
    fn test_field_index_build() {
        let (_dir, gz, idx) = write_gzip(b"x,k1,y\nx,k2,y\n");
        let mut builder = IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap();
        builder
            .add_indexer("f", "field 2", false, false, Box::new(FieldIndexer::new(b',', 2)))
            .unwrap();
        builder.build().unwrap();

        let store = Store::open_read_only(&idx).unwrap();
        assert_eq!(store.query_index("f", b"k2").unwrap(), vec![2]);
        assert_eq!(store.index_size("f").unwrap(), 2);
    }

    #[test]
    fn test_skip_first_excludes_header_from_indexes_only() {
        let (_dir, gz, idx) = write_gzip(b"x,k1,y\nx,k2,y\n");
        let config = BuildConfig {
            skip_first: 1,
            ..Default::default()
        };
        let mut builder = IndexBuilder::new(&gz, &idx, config).unwrap();
        builder
            .add_indexer("f", "field 2", false, false, Box::new(FieldIndexer::new(b',', 2)))
            .unwrap();
        builder.build().unwrap();

        let store = Store::open_read_only(&idx).unwrap();
        // Both lines keep offsets; only the second reached the extractor
        assert_eq!(store.line_count().unwrap(), 2);
        assert!(store.query_index("f", b"k1").unwrap().is_empty());
        assert_eq!(store.query_index("f", b"k2").unwrap(), vec![2]);
    }

    #[test]
    fn test_invalid_numeric_key_aborts_naming_line() {
        let (_dir, gz, idx) = write_gzip(b"17\nnot a number\n");
        let mut builder = IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap();
        builder
            .add_indexer("n", "numeric line", true, false, Box::new(FieldIndexer::new(b'\0', 1)))
            .unwrap();
        let err = builder.build().unwrap_err();
        match err {
            IndexError::IndexingFailure { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "not a number");
            }
            other => panic!("unexpected error: {}", other),
        }

        // The aborted build never committed its lines
        let store = Store::open_read_only(&idx).unwrap();
        assert_eq!(store.line_count().unwrap(), 0);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_lines() {
        let (_dir, gz, idx) = write_gzip(b"same\nsame\n");
        let mut builder = IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap();
        builder
            .add_indexer("u", "whole line", false, true, Box::new(FieldIndexer::new(b'\0', 1)))
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            IndexError::IndexingFailure { line: 2, .. }
        ));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let data: Vec<u8> = (1..=5000u64)
            .flat_map(|i| format!("row {}\n", i).into_bytes())
            .collect();
        let (_dir, gz, idx) = write_gzip(&data);

        let collect = |path: &Path| {
            let store = Store::open_read_only(path).unwrap();
            let mut rows = Vec::new();
            for line in 1..=store.line_count().unwrap() {
                let loc = store.find_access_point(line).unwrap().unwrap();
                rows.push((loc.line, loc.offset, loc.length));
            }
            rows
        };

        IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap().build().unwrap();
        let first = collect(&idx);
        IndexBuilder::new(&gz, &idx, BuildConfig::default()).unwrap().build().unwrap();
        let second = collect(&idx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncated_input_is_corrupt() {
        let (_dir, gz, idx) = write_gzip(b"some data that will be cut\n");
        let full = std::fs::read(&gz).unwrap();
        std::fs::write(&gz, &full[..full.len() / 2]).unwrap();

        let err = IndexBuilder::new(&gz, &idx, BuildConfig::default())
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::CorruptStream(_)));
    }

    #[test]
    fn test_pretty_bytes() {
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(2048), "2.00 KiB");
        assert_eq!(pretty_bytes(32 * 1024 * 1024), "32.00 MiB");
    }
}
