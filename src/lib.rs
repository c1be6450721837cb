//! A byte-stream compression engine with a C-callable surface.
//!
//! Callers on the other side of the C boundary hand over pull/push callbacks
//! ([`read::CallbackReader`], [`write::CallbackWriter`]); the engine frames
//! its input in independent blocks, so the compressed size of a stream can
//! also be measured on a worker pool ([`parallel`]).

use std::io;
use std::io::Read;
use std::os::raw::c_int;

pub mod block;
pub mod buffer;
pub mod capi;
pub mod codec;
pub mod compressor;
pub mod crypto;
pub mod decompressor;
pub mod errors;
pub mod frame;
pub mod last_error;
pub mod method;
pub mod parallel;
pub mod probe;
pub mod read;
pub mod stream;
pub mod write;

pub use codec::{Codec, CompressParams, Engine};
pub use errors::{Error, Result};
pub use method::block_size_for;
pub use parallel::{compress_size_parallel, compress_size_parallel_with};
pub use stream::{compress, compress_size, decompress, decompress_size};

/// The signature that opens every block.
pub const MAGIC_NUMBER: &[u8; 4] = b"zPK1";

/// Returned by a callback to signal failure.
///
/// Any other negative value from a pull callback means end of stream.
pub const CALLBACK_ERROR: c_int = -2;

/// Little-endian `u16` from the first two bytes of `bytes`.
///
/// Missing bytes read as zero.
pub fn to_u16(bytes: &[u8]) -> u16 {
    let lo = bytes.first().copied().unwrap_or(0);
    let hi = bytes.get(1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

pub(crate) trait ReadUpTo {
    /// Replace the contents of `buf` with up to `limit` bytes.
    ///
    /// Fewer than `limit` bytes are returned only at EOF.
    fn read_up_to(&mut self, limit: usize, buf: &mut Vec<u8>) -> io::Result<usize>;
}

impl<R: Read + ?Sized> ReadUpTo for R {
    fn read_up_to(&mut self, limit: usize, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        Read::take(&mut *self, limit as u64).read_to_end(buf)
    }
}
