//! Writer adapters: a buffered writer over caller-supplied push callbacks,
//! and a writer that only counts.

use std::io;
use std::io::Write;
use std::os::raw::{c_char, c_int, c_void};

use tracing::warn;

use crate::errors::*;
use crate::CALLBACK_ERROR;

/// Capacity of the coalescing buffer in front of the push callbacks.
pub const WRITE_BUFFER_SIZE: usize = 1 << 15;

/// `push_byte(ctx, byte)`: any value other than [`CALLBACK_ERROR`] is success.
pub type PushByteFn = unsafe extern "C" fn(ctx: *mut c_void, c: c_int) -> c_int;

/// `push_buffer(ctx, buf, len)`: any value other than [`CALLBACK_ERROR`] is
/// success.
pub type PushBufferFn = unsafe extern "C" fn(ctx: *mut c_void, buf: *const c_char, n: c_int) -> c_int;

/// Which push callbacks the caller provided.
#[derive(Clone, Copy, Debug)]
pub enum PushCallbacks {
    Byte(PushByteFn),
    Buffer(PushBufferFn),
    Both(PushByteFn, PushBufferFn),
}

impl PushCallbacks {
    /// `None` when neither callback is present.
    pub fn new(push_byte: Option<PushByteFn>, push_buffer: Option<PushBufferFn>) -> Option<Self> {
        match (push_byte, push_buffer) {
            (Some(b), Some(f)) => Some(Self::Both(b, f)),
            (Some(b), None) => Some(Self::Byte(b)),
            (None, Some(f)) => Some(Self::Buffer(f)),
            (None, None) => None,
        }
    }

    fn buffer(&self) -> Option<PushBufferFn> {
        match *self {
            Self::Buffer(f) | Self::Both(_, f) => Some(f),
            Self::Byte(_) => None,
        }
    }
}

pub struct CallbackWriter {
    ctx: *mut c_void,
    callbacks: PushCallbacks,
    buffer: Box<[u8]>,
    used: usize,
    failed: bool,
}

impl CallbackWriter {
    /// # Errors
    ///
    /// Returns [`Error::NoCallback`] if both callbacks are `None`.
    ///
    /// # Safety
    ///
    /// The callbacks must be sound to call with `ctx` for as long as the
    /// writer lives, including during its `Drop`.
    pub unsafe fn new(
        ctx: *mut c_void,
        push_byte: Option<PushByteFn>,
        push_buffer: Option<PushBufferFn>,
    ) -> Result<Self> {
        let callbacks = PushCallbacks::new(push_byte, push_buffer).ok_or(Error::NoCallback)?;
        Ok(Self {
            ctx,
            callbacks,
            buffer: vec![0_u8; WRITE_BUFFER_SIZE].into_boxed_slice(),
            used: 0,
            failed: false,
        })
    }

    /// Number of bytes waiting in the coalescing buffer.
    pub fn buffered(&self) -> usize {
        self.used
    }

    pub fn put_byte(&mut self, b: u8) -> Result<()> {
        self.check()?;
        self.buffer[self.used] = b;
        self.used += 1;
        if self.used == self.buffer.len() {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Flush anything pending, then hand `buf` to the buffer callback in a
    /// single call (or byte by byte if only the byte callback exists).
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.check()?;
        if buf.is_empty() {
            return Ok(());
        }
        self.flush_buffer()?;
        match self.callbacks.buffer() {
            Some(push_buffer) => {
                for chunk in buf.chunks(c_int::MAX as usize) {
                    self.push_buffer(push_buffer, chunk)?;
                }
                Ok(())
            }
            None => {
                for &b in buf {
                    self.put_byte(b)?;
                }
                Ok(())
            }
        }
    }

    /// Deliver all buffered bytes. A no-op when the buffer is empty.
    pub fn flush_buffer(&mut self) -> Result<()> {
        self.check()?;
        if self.used == 0 {
            return Ok(());
        }
        let used = std::mem::take(&mut self.used);
        match self.callbacks {
            PushCallbacks::Buffer(push_buffer) | PushCallbacks::Both(_, push_buffer) => {
                let rc = unsafe {
                    push_buffer(self.ctx, self.buffer.as_ptr() as *const c_char, used as c_int)
                };
                if rc == CALLBACK_ERROR {
                    self.failed = true;
                    return Err(Error::WriterCallback);
                }
                Ok(())
            }
            PushCallbacks::Byte(push_byte) => {
                for i in 0..used {
                    let rc = unsafe { push_byte(self.ctx, self.buffer[i] as c_int) };
                    if rc == CALLBACK_ERROR {
                        self.failed = true;
                        return Err(Error::WriterCallback);
                    }
                }
                Ok(())
            }
        }
    }

    fn push_buffer(&mut self, push_buffer: PushBufferFn, buf: &[u8]) -> Result<()> {
        let rc = unsafe { push_buffer(self.ctx, buf.as_ptr() as *const c_char, buf.len() as c_int) };
        if rc == CALLBACK_ERROR {
            self.failed = true;
            return Err(Error::WriterCallback);
        }
        Ok(())
    }

    /// A failed callback ends the stream for good.
    fn check(&self) -> Result<()> {
        if self.failed {
            Err(Error::WriterCallback)
        } else {
            Ok(())
        }
    }
}

impl Write for CallbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Error::into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer().map_err(Error::into_io_error)
    }
}

impl Drop for CallbackWriter {
    fn drop(&mut self) {
        if self.failed {
            return;
        }
        if let Err(e) = self.flush_buffer() {
            warn!("dropping writer with undelivered bytes: {}", e);
        }
    }
}

/// A sink that discards everything and remembers how many bytes it saw.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingWriter {
    count: u64,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
