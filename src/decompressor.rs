//! Staged decompresser, the counterpart of [`Compressor`](crate::compressor::Compressor).

use std::io::{BufRead, BufReader, Read, Write};
use std::mem;

use byteorder::{ReadBytesExt, LE};
use flate2::{Decompress, FlushDecompress, Status};
use sha1::{Digest, Sha1};

use crate::errors::*;
use crate::frame::*;
use crate::method::{Codec, Descriptor};
use crate::MAGIC_NUMBER;

const WRITE_CHUNK: usize = 1 << 15;
const DEFLATE_WINDOW: usize = 1 << 15;

enum State {
    Idle,
    Block(Descriptor),
    Comment(Descriptor),
    Data(SegmentDecoder),
    SegmentEnd(Descriptor),
}

struct SegmentDecoder {
    descriptor: Descriptor,
    inflate: Option<Decompress>,
    chunk: Vec<u8>,
    pos: usize,
    /// the zero-length terminator chunk has been read
    input_done: bool,
    /// the codec stream reported its own end
    finished: bool,
}

impl SegmentDecoder {
    fn new(descriptor: Descriptor) -> Self {
        let inflate = match descriptor.codec {
            Codec::Store => None,
            Codec::Deflate => Some(Decompress::new(false)),
        };
        Self {
            descriptor,
            inflate,
            chunk: Vec::new(),
            pos: 0,
            input_done: false,
            finished: false,
        }
    }

    fn pending(&self) -> usize {
        self.chunk.len() - self.pos
    }

    fn next_chunk<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<()> {
        let len = input.read_u32::<LE>()? as usize;
        self.pos = 0;
        self.chunk.clear();
        if len == 0 {
            self.input_done = true;
            return Ok(());
        }
        if len > MAX_CHUNK_SIZE {
            return Err(Error::format(format!("payload chunk of {} bytes is too large", len)));
        }
        self.chunk.resize(len, 0);
        input.read_exact(&mut self.chunk)?;
        Ok(())
    }

    /// Decode into `out`; `0` means the segment's data is exhausted.
    fn read<R: Read + ?Sized>(&mut self, input: &mut R, out: &mut [u8]) -> Result<usize> {
        debug_assert!(!out.is_empty());
        match self.descriptor.codec {
            Codec::Store => loop {
                if self.pending() > 0 {
                    let n = self.pending().min(out.len());
                    out[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                    self.pos += n;
                    return Ok(n);
                }
                if self.input_done {
                    return Ok(0);
                }
                self.next_chunk(input)?;
            },
            Codec::Deflate => self.inflate(input, out),
        }
    }

    fn inflate<R: Read + ?Sized>(&mut self, input: &mut R, out: &mut [u8]) -> Result<usize> {
        loop {
            if self.finished {
                return Ok(0);
            }
            if self.pending() == 0 && !self.input_done {
                self.next_chunk(input)?;
                continue;
            }
            let inflate = self
                .inflate
                .as_mut()
                .ok_or(Error::State("deflate state missing"))?;
            let (in_before, out_before) = (inflate.total_in(), inflate.total_out());
            let status = inflate
                .decompress(&self.chunk[self.pos..], out, FlushDecompress::None)
                .map_err(|e| Error::format(format!("corrupt deflate data: {}", e)))?;
            let consumed = (inflate.total_in() - in_before) as usize;
            let produced = (inflate.total_out() - out_before) as usize;
            self.pos += consumed;

            if status == Status::StreamEnd {
                self.finished = true;
                self.expect_terminator(input)?;
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.finished {
                return Ok(0);
            }
            if consumed == 0 {
                if self.input_done {
                    return Err(Error::format("segment data ends before the deflate stream"));
                }
                if self.pending() > 0 {
                    return Err(Error::format("deflate stream makes no progress"));
                }
            }
        }
    }

    fn expect_terminator<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<()> {
        if self.pending() == 0 && !self.input_done {
            self.next_chunk(input)?;
        }
        if self.pending() > 0 || !self.input_done {
            return Err(Error::format("trailing bytes after the end of segment data"));
        }
        Ok(())
    }
}

pub struct Decompresser<'a> {
    input: Option<BufReader<Box<dyn Read + 'a>>>,
    output: Option<Box<dyn Write + 'a>>,
    state: State,
    hasher: Sha1,
    digest: Option<[u8; DIGEST_LEN]>,
}

impl<'a> Default for Decompresser<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Decompresser<'a> {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            state: State::Idle,
            hasher: Sha1::new(),
            digest: None,
        }
    }

    pub fn set_input<R: Read + 'a>(&mut self, input: R) {
        let input: Box<dyn Read + 'a> = Box::new(input);
        self.input = Some(BufReader::new(input));
    }

    /// Decoded bytes go to `output`; without one they are discarded.
    pub fn set_output<W: Write + 'a>(&mut self, output: W) {
        self.output = Some(Box::new(output));
    }

    pub fn clear_output(&mut self) {
        self.output = None;
    }

    /// Skip forward to the next block header.
    ///
    /// Returns `None` at end of input, otherwise an estimate of the memory
    /// needed to decode the block.
    pub fn find_block(&mut self) -> Result<Option<f64>> {
        if !matches!(self.state, State::Idle) {
            return Err(Error::State("find_block called inside a block"));
        }
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;

        let mut matched = 0;
        'scan: loop {
            let buf = input.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            let mut consumed = 0;
            for &b in buf {
                consumed += 1;
                if b == MAGIC_NUMBER[matched] {
                    matched += 1;
                } else {
                    matched = usize::from(b == MAGIC_NUMBER[0]);
                }
                if matched == MAGIC_NUMBER.len() {
                    input.consume(consumed);
                    break 'scan;
                }
            }
            input.consume(consumed);
        }

        let len = input.read_u16::<LE>()? as usize;
        let mut body = vec![0_u8; len];
        input.read_exact(&mut body)?;
        let descriptor = Descriptor::from_bytes(&body)?;
        self.state = State::Block(descriptor);

        let memory = match descriptor.codec {
            Codec::Store => CHUNK_SIZE,
            Codec::Deflate => CHUNK_SIZE + DEFLATE_WINDOW,
        };
        Ok(Some(memory as f64))
    }

    /// Read the next segment header's filename into `sink`.
    ///
    /// Returns `false` (and leaves the block) when the block has no more
    /// segments.
    pub fn find_filename(&mut self, sink: Option<&mut dyn Write>) -> Result<bool> {
        let State::Block(descriptor) = self.state else {
            return Err(Error::State("find_filename needs an open block between segments"));
        };
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;
        match input.read_u8()? {
            SEGMENT_START => {
                let mut filename = Vec::new();
                input.read_until(0, &mut filename)?;
                if filename.pop() != Some(0) {
                    return Err(Error::format("unterminated filename"));
                }
                if let Some(sink) = sink {
                    sink.write_all(&filename)?;
                }
                self.state = State::Comment(descriptor);
                Ok(true)
            }
            BLOCK_END => {
                self.state = State::Idle;
                Ok(false)
            }
            other => Err(Error::format(format!(
                "expected a segment or the end of the block, found byte {}",
                other
            ))),
        }
    }

    pub fn read_comment(&mut self, sink: Option<&mut dyn Write>) -> Result<()> {
        let State::Comment(descriptor) = self.state else {
            return Err(Error::State("read_comment must follow find_filename"));
        };
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;
        let mut comment = Vec::new();
        input.read_until(0, &mut comment)?;
        if comment.pop() != Some(0) {
            return Err(Error::format("unterminated comment"));
        }
        if input.read_u8()? != 0 {
            return Err(Error::format("reserved segment header byte is not zero"));
        }
        if let Some(sink) = sink {
            sink.write_all(&comment)?;
        }
        self.hasher = Sha1::new();
        self.digest = None;
        self.state = State::Data(SegmentDecoder::new(descriptor));
        Ok(())
    }

    /// Decode up to `n` bytes of the segment, or all of it if `n < 0`.
    ///
    /// Returns `false` once the segment's data is exhausted.
    pub fn decompress(&mut self, n: i64) -> Result<bool> {
        let State::Data(decoder) = &mut self.state else {
            return Err(Error::State("decompress must follow read_comment"));
        };
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;

        let mut remaining = if n < 0 { u64::MAX } else { n as u64 };
        let mut buf = vec![0_u8; WRITE_CHUNK];
        while remaining > 0 {
            let want = remaining.min(WRITE_CHUNK as u64) as usize;
            let got = decoder.read(input, &mut buf[..want])?;
            if got == 0 {
                let descriptor = decoder.descriptor;
                let mut digest = [0_u8; DIGEST_LEN];
                digest.copy_from_slice(&mem::take(&mut self.hasher).finalize());
                self.digest = Some(digest);
                self.state = State::SegmentEnd(descriptor);
                return Ok(false);
            }
            self.hasher.update(&buf[..got]);
            if let Some(output) = self.output.as_mut() {
                output.write_all(&buf[..got])?;
            }
            remaining -= got as u64;
        }
        Ok(true)
    }

    /// Read the segment trailer: byte 0 is 253 followed by the stored SHA-1,
    /// or 254 followed by zeros. Undecoded data left in the segment is
    /// skipped.
    pub fn read_segment_end(&mut self) -> Result<[u8; SEGMENT_END_LEN]> {
        let descriptor = match &mut self.state {
            State::SegmentEnd(descriptor) => *descriptor,
            State::Data(decoder) => {
                let input = self.input.as_mut().ok_or(Error::State("no input set"))?;
                let mut scratch = vec![0_u8; WRITE_CHUNK];
                while decoder.read(input, &mut scratch)? > 0 {}
                self.digest = None;
                decoder.descriptor
            }
            _ => return Err(Error::State("read_segment_end needs an open segment")),
        };
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;
        let mut trailer = [0_u8; SEGMENT_END_LEN];
        match input.read_u8()? {
            SEGMENT_END_SHA1 => {
                trailer[0] = SEGMENT_END_SHA1;
                input.read_exact(&mut trailer[1..])?;
            }
            SEGMENT_END => trailer[0] = SEGMENT_END,
            other => {
                return Err(Error::format(format!(
                    "expected a segment trailer, found byte {}",
                    other
                )))
            }
        }
        self.state = State::Block(descriptor);
        Ok(trailer)
    }

    /// SHA-1 of the last segment decoded to its end.
    pub fn segment_digest(&self) -> Option<[u8; DIGEST_LEN]> {
        self.digest
    }

    /// Input bytes read ahead but not yet decoded.
    pub fn buffered(&self) -> usize {
        let read_ahead = self.input.as_ref().map_or(0, |input| input.buffer().len());
        let staged = match &self.state {
            State::Data(decoder) => decoder.pending(),
            _ => 0,
        };
        read_ahead + staged
    }
}
