//! Safe wrapper over the raw zlib inflate state machine
//!
//! Higher-level DEFLATE bindings hide the three pieces of state a
//! random-access index is built from: the end-of-block and last-block flags,
//! the count of unused bits in the last consumed byte, and the ability to
//! prime a fresh decoder with a partial byte and a 32 KiB dictionary. This
//! module talks to zlib directly to get at them.
//!
//! After every inflate call zlib encodes the bit-level position in
//! `data_type`: bit 7 is set when the decoder stopped at a block boundary
//! (or right after the stream header), bit 6 while decoding the final block,
//! and bits 0..2 hold the number of unused bits in the last input byte.

use crate::error::{IndexError, IndexResult};
use libz_sys::{
    inflate, inflateEnd, inflateInit2_, inflatePrime, inflateSetDictionary, z_stream, zlibVersion,
    Z_BLOCK, Z_BUF_ERROR, Z_NEED_DICT, Z_NO_FLUSH, Z_OK, Z_STREAM_END,
};
use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_int, c_uint};

/// Framing expected at the start of the compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Auto-detect a zlib or gzip header (scan mode)
    ZlibOrGzip,
    /// Headerless DEFLATE, for resuming mid-stream (query mode)
    Raw,
}

impl Framing {
    fn window_bits(self) -> c_int {
        match self {
            // 15-bit window plus 32 selects zlib/gzip auto-detection
            Framing::ZlibOrGzip => 15 + 32,
            Framing::Raw => -15,
        }
    }
}

/// Outcome of a single inflate step
#[derive(Debug, Clone, Copy, Default)]
pub struct InflateStep {
    /// Compressed bytes consumed from the input slice
    pub consumed: usize,
    /// Uncompressed bytes produced into the output slice
    pub produced: usize,
    /// The decoder reached the end of the stream
    pub stream_end: bool,
    /// The step ended exactly on a DEFLATE block boundary (or stream header)
    pub end_of_block: bool,
    /// The decoder is inside the final block of the stream
    pub last_block: bool,
    /// Unused bits in the last consumed input byte (0..=7)
    pub unused_bits: u8,
}

/// Incremental DEFLATE decoder
///
/// Wraps a `z_stream` whose lifetime is tied to this value; the underlying
/// state is torn down on drop.
pub struct ZStream {
    strm: Box<z_stream>,
}

impl ZStream {
    /// Initialize a decoder for the given framing.
    pub fn new(framing: Framing) -> IndexResult<Self> {
        // `z_stream` is boxed so its address stays fixed after `inflateInit2_`:
        // zlib's internal state stores a back-pointer to this struct, and
        // moving it afterward (e.g. out of a by-value return) invalidates
        // that pointer.
        let mut strm: Box<z_stream> = unsafe {
            let mut s = Box::<z_stream>::new_uninit();
            std::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        };
        let rc = unsafe {
            inflateInit2_(
                strm.as_mut(),
                framing.window_bits(),
                zlibVersion(),
                mem::size_of::<z_stream>() as c_int,
            )
        };
        if rc != Z_OK {
            return Err(IndexError::CorruptStream(format!(
                "inflateInit2 failed with code {}",
                rc
            )));
        }
        Ok(Self { strm })
    }

    /// Push the top `bits` bits of `value` into the decoder before the first
    /// real input byte. Used to resume at an access point whose block
    /// boundary is not byte-aligned.
    pub fn prime(&mut self, bits: u8, value: u8) -> IndexResult<()> {
        let rc = unsafe { inflatePrime(self.strm.as_mut(), bits as c_int, value as c_int) };
        if rc != Z_OK {
            return Err(self.stream_error("inflatePrime", rc));
        }
        Ok(())
    }

    /// Seed the 32 KiB back-reference dictionary for a raw resume.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> IndexResult<()> {
        let rc = unsafe {
            inflateSetDictionary(self.strm.as_mut(), dict.as_ptr(), dict.len() as c_uint)
        };
        if rc != Z_OK {
            return Err(self.stream_error("inflateSetDictionary", rc));
        }
        Ok(())
    }

    /// Inflate, stopping at every DEFLATE block boundary (scan mode).
    pub fn step_block(&mut self, input: &[u8], output: &mut [u8]) -> IndexResult<InflateStep> {
        self.run(input, output, Z_BLOCK)
    }

    /// Inflate as much as input and output allow (resume mode).
    pub fn step(&mut self, input: &[u8], output: &mut [u8]) -> IndexResult<InflateStep> {
        self.run(input, output, Z_NO_FLUSH)
    }

    fn run(&mut self, input: &[u8], output: &mut [u8], flush: c_int) -> IndexResult<InflateStep> {
        self.strm.next_in = input.as_ptr() as *mut _;
        self.strm.avail_in = input.len() as c_uint;
        self.strm.next_out = output.as_mut_ptr();
        self.strm.avail_out = output.len() as c_uint;

        let rc = unsafe { inflate(self.strm.as_mut(), flush) };

        let consumed = input.len() - self.strm.avail_in as usize;
        let produced = output.len() - self.strm.avail_out as usize;

        match rc {
            Z_OK | Z_STREAM_END => Ok(InflateStep {
                consumed,
                produced,
                stream_end: rc == Z_STREAM_END,
                end_of_block: self.strm.data_type & 0x80 != 0,
                last_block: self.strm.data_type & 0x40 != 0,
                unused_bits: (self.strm.data_type & 0x07) as u8,
            }),
            Z_NEED_DICT => Err(IndexError::CorruptStream(
                "decoder requested a dictionary mid-stream".to_string(),
            )),
            Z_BUF_ERROR => Err(IndexError::CorruptStream(
                "decoder made no progress".to_string(),
            )),
            code => Err(self.stream_error("inflate", code)),
        }
    }

    fn stream_error(&self, call: &str, code: c_int) -> IndexError {
        let detail = if self.strm.msg.is_null() {
            format!("code {}", code)
        } else {
            unsafe { CStr::from_ptr(self.strm.msg) }
                .to_string_lossy()
                .into_owned()
        };
        IndexError::CorruptStream(format!("{} failed: {}", call, detail))
    }
}

impl Drop for ZStream {
    fn drop(&mut self) {
        unsafe {
            inflateEnd(self.strm.as_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_scan_decodes_whole_stream() {
        let original: Vec<u8> = (0..50_000u32)
            .flat_map(|i| format!("line {}\n", i).into_bytes())
            .collect();
        let compressed = gzip(&original);

        let mut zs = ZStream::new(Framing::ZlibOrGzip).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        let mut pos = 0;
        loop {
            let step = zs.step_block(&compressed[pos..], &mut buf).unwrap();
            pos += step.consumed;
            out.extend_from_slice(&buf[..step.produced]);
            if step.stream_end {
                break;
            }
        }
        assert_eq!(out, original);
    }

    #[test]
    fn test_scan_stops_after_header_with_no_output() {
        let compressed = gzip(b"hello world\n");

        let mut zs = ZStream::new(Framing::ZlibOrGzip).unwrap();
        let mut buf = [0u8; 4096];
        let step = zs.step_block(&compressed, &mut buf).unwrap();

        // First boundary return is the end of the gzip header: a block
        // boundary with nothing produced yet and a byte-aligned position.
        assert!(step.end_of_block);
        assert!(!step.last_block);
        assert_eq!(step.produced, 0);
        assert_eq!(step.unused_bits, 0);
    }

    #[test]
    fn test_unused_bits_in_range() {
        let original: Vec<u8> = (0..200_000u32)
            .flat_map(|i| format!("{}\n", i).into_bytes())
            .collect();
        let compressed = gzip(&original);

        let mut zs = ZStream::new(Framing::ZlibOrGzip).unwrap();
        let mut buf = [0u8; 4096];
        let mut pos = 0;
        let mut boundaries = 0;
        loop {
            let step = zs.step_block(&compressed[pos..], &mut buf).unwrap();
            pos += step.consumed;
            if step.stream_end {
                break;
            }
            if step.end_of_block {
                boundaries += 1;
                assert!(step.unused_bits <= 7);
            }
        }
        assert!(boundaries > 1, "expected multiple block boundaries");
    }

    #[test]
    fn test_raw_mode_resumes_headerless_data() {
        let original = b"raw deflate data with no framing at all";
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(original).unwrap();
        let compressed = enc.finish().unwrap();

        let mut zs = ZStream::new(Framing::Raw).unwrap();
        let mut out = vec![0u8; original.len()];
        let mut filled = 0;
        let mut pos = 0;
        loop {
            let step = zs.step(&compressed[pos..], &mut out[filled..]).unwrap();
            pos += step.consumed;
            filled += step.produced;
            if step.stream_end || filled == out.len() {
                break;
            }
        }
        assert_eq!(&out[..filled], original);
    }

    #[test]
    fn test_garbage_input_is_corrupt() {
        let mut zs = ZStream::new(Framing::ZlibOrGzip).unwrap();
        let mut buf = [0u8; 256];
        let garbage = [0xffu8; 64];
        let err = zs.step_block(&garbage, &mut buf).unwrap_err();
        assert!(matches!(err, IndexError::CorruptStream(_)));
    }
}
