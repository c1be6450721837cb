//! Reader adapter: turns caller-supplied pull callbacks into a [`Read`].

use std::io;
use std::io::Read;
use std::os::raw::{c_char, c_int, c_void};

use crate::errors::*;
use crate::CALLBACK_ERROR;

/// `pull_byte(ctx)`: a byte in `0..=255`, a negative value at end of stream,
/// or [`CALLBACK_ERROR`]. Anything above 255 is treated as a callback failure.
pub type PullByteFn = unsafe extern "C" fn(ctx: *mut c_void) -> c_int;

/// `pull_buffer(ctx, buf, max_len)`: bytes stored into `buf`, `0` (or any
/// other non-positive value) at end of stream, or [`CALLBACK_ERROR`].
pub type PullBufferFn = unsafe extern "C" fn(ctx: *mut c_void, buf: *mut c_char, n: c_int) -> c_int;

/// Which pull callbacks the caller provided.
#[derive(Clone, Copy, Debug)]
pub enum PullCallbacks {
    Byte(PullByteFn),
    Buffer(PullBufferFn),
    Both(PullByteFn, PullBufferFn),
}

impl PullCallbacks {
    /// `None` when neither callback is present.
    pub fn new(pull_byte: Option<PullByteFn>, pull_buffer: Option<PullBufferFn>) -> Option<Self> {
        match (pull_byte, pull_buffer) {
            (Some(b), Some(f)) => Some(Self::Both(b, f)),
            (Some(b), None) => Some(Self::Byte(b)),
            (None, Some(f)) => Some(Self::Buffer(f)),
            (None, None) => None,
        }
    }

    fn buffer(&self) -> Option<PullBufferFn> {
        match *self {
            Self::Buffer(f) | Self::Both(_, f) => Some(f),
            Self::Byte(_) => None,
        }
    }
}

pub struct CallbackReader {
    ctx: *mut c_void,
    callbacks: PullCallbacks,
}

impl CallbackReader {
    /// # Errors
    ///
    /// Returns [`Error::NoCallback`] if both callbacks are `None`.
    ///
    /// # Safety
    ///
    /// The callbacks must be sound to call with `ctx` for as long as the
    /// reader lives, and `pull_buffer` must never write more than the
    /// requested number of bytes.
    pub unsafe fn new(
        ctx: *mut c_void,
        pull_byte: Option<PullByteFn>,
        pull_buffer: Option<PullBufferFn>,
    ) -> Result<Self> {
        let callbacks = PullCallbacks::new(pull_byte, pull_buffer).ok_or(Error::NoCallback)?;
        Ok(Self { ctx, callbacks })
    }

    /// Pull one byte; `None` at end of stream.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.callbacks {
            PullCallbacks::Byte(pull_byte) | PullCallbacks::Both(pull_byte, _) => {
                match unsafe { pull_byte(self.ctx) } {
                    CALLBACK_ERROR => Err(Error::ReaderCallback),
                    v if v < 0 => Ok(None),
                    v if v > 255 => Err(Error::ReaderCallback),
                    v => Ok(Some(v as u8)),
                }
            }
            PullCallbacks::Buffer(pull_buffer) => {
                let mut b = 0_u8;
                match self.pull_buffer(pull_buffer, std::slice::from_mut(&mut b))? {
                    0 => Ok(None),
                    _ => Ok(Some(b)),
                }
            }
        }
    }

    /// Read up to `buf.len()` bytes; `0` means end of stream.
    ///
    /// With a buffer callback this is exactly one callback call. Otherwise
    /// bytes are pulled one at a time until `buf` is full or the stream ends.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(pull_buffer) = self.callbacks.buffer() {
            return self.pull_buffer(pull_buffer, buf);
        }
        let mut n = 0;
        while n < buf.len() {
            match self.next_byte()? {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn pull_buffer(&mut self, pull_buffer: PullBufferFn, buf: &mut [u8]) -> Result<usize> {
        let max = buf.len().min(c_int::MAX as usize);
        let got = unsafe { pull_buffer(self.ctx, buf.as_mut_ptr() as *mut c_char, max as c_int) };
        match got {
            CALLBACK_ERROR => Err(Error::ReaderCallback),
            got if got <= 0 => Ok(0),
            got if got as usize > max => Err(Error::ReaderCallback),
            got => Ok(got as usize),
        }
    }
}

impl Read for CallbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(Error::into_io_error)
    }
}
