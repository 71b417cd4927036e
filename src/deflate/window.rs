//! Sliding-window snapshots for access points
//!
//! The decoder writes into a 32 KiB ring buffer. When a checkpoint is
//! emitted the ring is linearized into stream order (the unwritten or older
//! tail first, then the freshly filled prefix) and compressed at maximum
//! level for storage. A cold reader restores the blob and hands it to the
//! decoder as its back-reference dictionary.
//!
//! Before 32 KiB of output has been produced the tail of the ring is still
//! zero, so early snapshots come out zero-padded; DEFLATE back-references
//! never reach before the start of the stream, making the padding inert.

use crate::error::{IndexError, IndexResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Size of the DEFLATE history window.
pub const WINDOW_SIZE: usize = 32 * 1024;

/// Linearize the ring at write position `fill` and compress it for storage.
///
/// `ring` must be exactly [`WINDOW_SIZE`] bytes; `fill` is the number of
/// bytes written since the ring last wrapped.
pub fn snapshot(ring: &[u8], fill: usize) -> IndexResult<Vec<u8>> {
    debug_assert_eq!(ring.len(), WINDOW_SIZE);
    debug_assert!(fill <= WINDOW_SIZE);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(&ring[fill..])?;
    encoder.write_all(&ring[..fill])?;
    Ok(encoder.finish()?)
}

/// Decompress a stored window blob back into its 32 KiB form.
pub fn restore(blob: &[u8]) -> IndexResult<Vec<u8>> {
    let mut window = Vec::with_capacity(WINDOW_SIZE);
    ZlibDecoder::new(blob)
        .read_to_end(&mut window)
        .map_err(|e| IndexError::CorruptStream(format!("bad window blob: {}", e)))?;
    if window.len() != WINDOW_SIZE {
        return Err(IndexError::CorruptStream(format!(
            "window blob decompressed to {} bytes, expected {}",
            window.len(),
            WINDOW_SIZE
        )));
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut ring = vec![0u8; WINDOW_SIZE];
        for (i, b) in ring.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }

        let blob = snapshot(&ring, 1000).unwrap();
        let restored = restore(&blob).unwrap();

        assert_eq!(restored.len(), WINDOW_SIZE);
        // Stream order: ring[1000..] happened before ring[..1000]
        assert_eq!(&restored[..WINDOW_SIZE - 1000], &ring[1000..]);
        assert_eq!(&restored[WINDOW_SIZE - 1000..], &ring[..1000]);
    }

    #[test]
    fn test_snapshot_zero_pads_at_stream_start() {
        let mut ring = vec![0u8; WINDOW_SIZE];
        ring[0] = b'x';
        ring[1] = b'y';

        let blob = snapshot(&ring, 2).unwrap();
        let restored = restore(&blob).unwrap();

        assert!(restored[..WINDOW_SIZE - 2].iter().all(|&b| b == 0));
        assert_eq!(&restored[WINDOW_SIZE - 2..], b"xy");
    }

    #[test]
    fn test_snapshot_compresses_zero_window_small() {
        let ring = vec![0u8; WINDOW_SIZE];
        let blob = snapshot(&ring, 0).unwrap();
        assert!(blob.len() < 256, "zero window should compress tightly");
    }

    #[test]
    fn test_restore_rejects_garbage() {
        assert!(restore(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }

    #[test]
    fn test_restore_rejects_short_window() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
        encoder.write_all(b"too short").unwrap();
        let blob = encoder.finish().unwrap();
        assert!(restore(&blob).is_err());
    }
}
