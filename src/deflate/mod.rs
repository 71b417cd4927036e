//! DEFLATE decoding layer
//!
//! Wraps the raw zlib inflate state machine with the two capabilities the
//! index depends on:
//!
//! - **stream**: block-by-block decoding that reports DEFLATE block
//!   boundaries and the bit-level position inside the compressed stream,
//!   plus mid-stream resume via bit priming and a pre-seeded dictionary
//! - **window**: snapshot and restore of the 32 KiB sliding history a
//!   resumed decoder needs as its back-reference dictionary
//!
//! ```text
//! Build path:
//!   compressed chunks → ZStream (Z_BLOCK) → output slabs + boundary events
//!
//! Query path:
//!   window blob → restore → ZStream (raw) ← prime(bit_offset) ← seek
//! ```

pub mod stream;
pub mod window;

pub use stream::{Framing, InflateStep, ZStream};
pub use window::{restore, snapshot, WINDOW_SIZE};

/// Compressed input is read and fed to the decoder in chunks of this size.
pub const CHUNK_SIZE: usize = 16 * 1024;
