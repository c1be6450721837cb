use std::io;
use std::io::{Read, Write};

/// An in-memory stream: writes append, reads consume from the front.
#[derive(Debug, Default, Clone)]
pub struct StringBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl StringBuffer {
    /// `initial` is a capacity hint.
    pub fn new(initial: usize) -> Self {
        Self {
            data: Vec::with_capacity(initial),
            read_pos: 0,
        }
    }

    /// Bytes written and not discarded by [`reset`](Self::reset) or
    /// [`resize`](Self::resize).
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Truncate or zero-extend the contents to `n` bytes.
    pub fn resize(&mut self, n: usize) {
        self.data.resize(n, 0);
        self.read_pos = self.read_pos.min(n);
    }

    /// Next unread byte.
    pub fn get(&mut self) -> Option<u8> {
        let b = *self.data.get(self.read_pos)?;
        self.read_pos += 1;
        Some(b)
    }
}

impl Read for StringBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Write for StringBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
