//! Checkpoint emission policy
//!
//! Decides, at each DEFLATE block boundary, whether to place an access
//! point, and owns the backfill of `uncompressed_end_offset`: a freshly
//! emitted point stays pending until the next emission (or the end of the
//! stream) reveals where its coverage stops, keeping the recorded ranges a
//! contiguous partition of the uncompressed stream.
//!
//! A point is emitted when the boundary is not the final block and either
//! `index_every` bytes have been produced since the previous point or no
//! output has been produced at all. The latter fires at the stream-header
//! boundary, so every file gets a point covering offset zero.

use crate::deflate::stream::InflateStep;
use crate::deflate::window;
use crate::error::IndexResult;
use crate::store::AccessPoint;

struct Pending {
    uncompressed_offset: u64,
    compressed_offset: u64,
    bit_offset: u8,
    window: Vec<u8>,
}

/// Decides when to emit access points and captures their windows
pub struct CheckpointManager {
    index_every: u64,
    last: u64,
    pending: Option<Pending>,
}

impl CheckpointManager {
    pub fn new(index_every: u64) -> Self {
        Self {
            index_every,
            last: 0,
            pending: None,
        }
    }

    /// Inspect one inflate step. Returns the previous access point,
    /// completed with its end offset, when this step emits a new one.
    ///
    /// `ring`/`fill` describe the rolling output window at the boundary;
    /// `total_in`/`total_out` are the stream totals after the step.
    pub fn observe(
        &mut self,
        step: &InflateStep,
        total_in: u64,
        total_out: u64,
        ring: &[u8],
        fill: usize,
    ) -> IndexResult<Option<AccessPoint>> {
        if !step.end_of_block || step.last_block {
            return Ok(None);
        }
        let since_last = total_out - self.last;
        if since_last <= self.index_every && total_out != 0 {
            return Ok(None);
        }

        tracing::debug!(
            "checkpoint at uncompressed offset {} (compressed offset {}, {} unused bits)",
            total_out,
            total_in,
            step.unused_bits
        );

        let completed = if total_out != 0 {
            self.complete_pending(total_out)
        } else {
            None
        };
        self.pending = Some(Pending {
            uncompressed_offset: total_out,
            compressed_offset: total_in,
            bit_offset: step.unused_bits,
            window: window::snapshot(ring, fill)?,
        });
        self.last = total_out;
        Ok(completed)
    }

    /// At stream end, complete the pending point so it covers through
    /// `total_out - 1`. Returns `None` for an empty stream.
    pub fn finish(&mut self, total_out: u64) -> Option<AccessPoint> {
        if total_out == 0 {
            self.pending = None;
            return None;
        }
        self.complete_pending(total_out)
    }

    fn complete_pending(&mut self, next_offset: u64) -> Option<AccessPoint> {
        self.pending.take().map(|p| AccessPoint {
            uncompressed_offset: p.uncompressed_offset,
            uncompressed_end_offset: next_offset - 1,
            compressed_offset: p.compressed_offset,
            bit_offset: p.bit_offset,
            window: p.window,
        })
    }
}
