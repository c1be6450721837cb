//! Staged compressor: the caller drives block and segment boundaries and
//! feeds input in as many steps as it likes.

use std::io::{BufWriter, Read, Write};
use std::mem;

use byteorder::{WriteBytesExt, LE};
use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::errors::*;
use crate::frame::*;
use crate::method::{Codec, Descriptor, Method};
use crate::{to_u16, ReadUpTo, MAGIC_NUMBER};

const READ_CHUNK: usize = 1 << 15;

enum State {
    Idle,
    Block(Descriptor),
    Segment(Segment),
}

enum SegmentEncoder {
    Store(Vec<u8>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl SegmentEncoder {
    fn new(descriptor: Descriptor) -> Self {
        match descriptor.codec {
            Codec::Store => Self::Store(Vec::new()),
            Codec::Deflate => Self::Deflate(DeflateEncoder::new(
                Vec::new(),
                Compression::new(descriptor.level),
            )),
        }
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Store(staged) => staged.extend_from_slice(data),
            Self::Deflate(encoder) => encoder.write_all(data)?,
        }
        Ok(())
    }

    fn staged(&self) -> usize {
        match self {
            Self::Store(staged) => staged.len(),
            Self::Deflate(encoder) => encoder.get_ref().len(),
        }
    }

    fn take_staged(&mut self) -> Vec<u8> {
        match self {
            Self::Store(staged) => mem::take(staged),
            Self::Deflate(encoder) => mem::take(encoder.get_mut()),
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        match self {
            Self::Store(staged) => Ok(staged),
            Self::Deflate(encoder) => Ok(encoder.finish()?),
        }
    }
}

/// Hashes and counts whatever is written to it.
#[derive(Default)]
struct HashSink {
    hasher: Sha1,
    size: u64,
}

impl Write for HashSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.hasher.update(buf);
        self.size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Decodes the emitted payload as it goes out, so the segment can be checked
/// against its input when it closes.
enum Verifier {
    Store(HashSink),
    Deflate(DeflateDecoder<HashSink>),
}

impl Verifier {
    fn new(codec: Codec) -> Self {
        match codec {
            Codec::Store => Self::Store(HashSink::default()),
            Codec::Deflate => Self::Deflate(DeflateDecoder::new(HashSink::default())),
        }
    }

    fn feed(&mut self, payload: &[u8]) -> Result<()> {
        match self {
            Self::Store(sink) => sink.write_all(payload)?,
            Self::Deflate(decoder) => decoder.write_all(payload)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<HashSink> {
        match self {
            Self::Store(sink) => Ok(sink),
            Self::Deflate(decoder) => Ok(decoder.finish()?),
        }
    }
}

struct Segment {
    descriptor: Descriptor,
    encoder: SegmentEncoder,
    hasher: Sha1,
    size: u64,
    emitted: u64,
    verifier: Option<Verifier>,
}

impl Segment {
    fn new(descriptor: Descriptor, verify: bool) -> Self {
        Self {
            descriptor,
            encoder: SegmentEncoder::new(descriptor),
            hasher: Sha1::new(),
            size: 0,
            emitted: 0,
            verifier: verify.then(|| Verifier::new(descriptor.codec)),
        }
    }

    fn feed<W: Write + ?Sized>(&mut self, data: &[u8], out: &mut W) -> Result<()> {
        self.hasher.update(data);
        self.size += data.len() as u64;
        self.encoder.feed(data)?;
        if self.encoder.staged() >= CHUNK_SIZE {
            let staged = self.encoder.take_staged();
            self.emit(&staged, out)?;
        }
        Ok(())
    }

    fn emit<W: Write + ?Sized>(&mut self, staged: &[u8], out: &mut W) -> Result<()> {
        for piece in staged.chunks(CHUNK_SIZE) {
            out.write_u32::<LE>(piece.len() as u32)?;
            out.write_all(piece)?;
        }
        if let Some(verifier) = &mut self.verifier {
            verifier.feed(staged)?;
        }
        self.emitted += staged.len() as u64;
        Ok(())
    }

    fn digest(&self) -> [u8; DIGEST_LEN] {
        let mut digest = [0_u8; DIGEST_LEN];
        digest.copy_from_slice(&self.hasher.clone().finalize());
        digest
    }

    /// Flush the codec, then write the payload terminator.
    ///
    /// With verification on, the decoded payload must match the input in
    /// size and SHA-1.
    fn finish<W: Write + ?Sized>(mut self, out: &mut W) -> Result<()> {
        let encoder = mem::replace(&mut self.encoder, SegmentEncoder::Store(Vec::new()));
        let rest = encoder.finish()?;
        self.emit(&rest, out)?;
        out.write_u32::<LE>(0)?;
        if let Some(verifier) = self.verifier.take() {
            let decoded = verifier.finish()?;
            if decoded.size != self.size || decoded.hasher.finalize() != self.hasher.finalize() {
                warn!("segment failed verification: {} bytes in, {} decoded", self.size, decoded.size);
                return Err(Error::Checksum);
            }
        }
        Ok(())
    }
}

pub struct Compressor<'a> {
    input: Option<Box<dyn Read + 'a>>,
    output: Option<BufWriter<Box<dyn Write + 'a>>>,
    state: State,
    verify: bool,
}

impl<'a> Default for Compressor<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Compressor<'a> {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            state: State::Idle,
            verify: false,
        }
    }

    pub fn set_input<R: Read + 'a>(&mut self, input: R) {
        self.input = Some(Box::new(input));
    }

    /// Replace the output; anything still buffered for the previous output
    /// is flushed to it first.
    pub fn set_output<W: Write + 'a>(&mut self, output: W) -> Result<()> {
        if let Some(mut previous) = self.output.take() {
            previous.flush()?;
        }
        self.output = Some(BufWriter::new(Box::new(output)));
        Ok(())
    }

    /// Decode every segment as it is written and fail [`end_segment`] with
    /// [`Error::Checksum`] if it does not reproduce the input. Applies to
    /// segments started afterwards.
    ///
    /// [`end_segment`]: Self::end_segment
    pub fn set_verify(&mut self, verify: bool) {
        self.verify = verify;
    }

    /// Write [`LOCATOR_TAG`] ahead of the next block.
    pub fn write_tag(&mut self) -> Result<()> {
        if !matches!(self.state, State::Idle) {
            return Err(Error::State("write_tag needs to be outside a block"));
        }
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;
        out.write_all(&LOCATOR_TAG)?;
        Ok(())
    }

    pub fn start_block_level(&mut self, level: i32) -> Result<()> {
        self.start_block(Descriptor::from_level(level)?)
    }

    pub fn start_block_method(&mut self, method: &str) -> Result<()> {
        self.start_block(Method::parse(method)?.descriptor)
    }

    /// Start a block from a raw descriptor: a little-endian `u16` length
    /// followed by that many descriptor bytes.
    pub fn start_block_descriptor(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() < 2 {
            return Err(Error::format("raw descriptor is missing its length prefix"));
        }
        let len = to_u16(raw) as usize;
        let body = raw
            .get(2..2 + len)
            .ok_or_else(|| Error::format("raw descriptor is shorter than its length prefix"))?;
        self.start_block(Descriptor::from_bytes(body)?)
    }

    pub fn start_block(&mut self, descriptor: Descriptor) -> Result<()> {
        if !matches!(self.state, State::Idle) {
            return Err(Error::State("a block is already open"));
        }
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;
        out.write_all(MAGIC_NUMBER)?;
        out.write_u16::<LE>(Descriptor::LEN as u16)?;
        out.write_all(&descriptor.to_bytes())?;
        self.state = State::Block(descriptor);
        Ok(())
    }

    pub fn start_segment(&mut self, filename: Option<&[u8]>, comment: Option<&[u8]>) -> Result<()> {
        let State::Block(descriptor) = self.state else {
            return Err(Error::State("start_segment needs an open block and no open segment"));
        };
        let filename = filename.unwrap_or_default();
        let comment = comment.unwrap_or_default();
        if filename.contains(&0) || comment.contains(&0) {
            return Err(Error::format("filename and comment must not contain NUL bytes"));
        }
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;
        out.write_u8(SEGMENT_START)?;
        out.write_all(filename)?;
        out.write_u8(0)?;
        out.write_all(comment)?;
        out.write_u8(0)?;
        out.write_u8(0)?;
        self.state = State::Segment(Segment::new(descriptor, self.verify));
        Ok(())
    }

    /// Compress up to `n` bytes of input, or everything left if `n < 0`.
    ///
    /// Returns `false` once the input is exhausted.
    pub fn compress(&mut self, n: i64) -> Result<bool> {
        let State::Segment(segment) = &mut self.state else {
            return Err(Error::State("compress needs an open segment"));
        };
        let input = self.input.as_mut().ok_or(Error::State("no input set"))?;
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;

        let mut remaining = if n < 0 { u64::MAX } else { n as u64 };
        let mut buf = Vec::with_capacity(READ_CHUNK);
        while remaining > 0 {
            let want = remaining.min(READ_CHUNK as u64) as usize;
            let got = input.read_up_to(want, &mut buf)?;
            if got > 0 {
                segment.feed(&buf, out)?;
                remaining -= got as u64;
            }
            if got < want {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Close the segment, recording `digest` in its trailer if given.
    pub fn end_segment(&mut self, digest: Option<&[u8; DIGEST_LEN]>) -> Result<()> {
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;
        let segment = match mem::replace(&mut self.state, State::Idle) {
            State::Segment(segment) => segment,
            other => {
                self.state = other;
                return Err(Error::State("end_segment needs an open segment"));
            }
        };
        let descriptor = segment.descriptor;
        segment.finish(out)?;
        match digest {
            Some(digest) => {
                out.write_u8(SEGMENT_END_SHA1)?;
                out.write_all(digest)?;
            }
            None => out.write_u8(SEGMENT_END)?,
        }
        self.state = State::Block(descriptor);
        Ok(())
    }

    /// Close the segment with the SHA-1 of its input when `with_sha1` is set.
    ///
    /// Returns the segment's input size and the digest that was written.
    pub fn end_segment_checksum(&mut self, with_sha1: bool) -> Result<(u64, Option<[u8; DIGEST_LEN]>)> {
        let State::Segment(segment) = &self.state else {
            return Err(Error::State("end_segment needs an open segment"));
        };
        let size = segment.size;
        let digest = with_sha1.then(|| segment.digest());
        self.end_segment(digest.as_ref())?;
        Ok((size, digest))
    }

    pub fn end_block(&mut self) -> Result<()> {
        if !matches!(self.state, State::Block(_)) {
            return Err(Error::State("end_block needs an open block with no open segment"));
        }
        let out = self.output.as_mut().ok_or(Error::State("no output set"))?;
        out.write_u8(BLOCK_END)?;
        out.flush()?;
        self.state = State::Idle;
        Ok(())
    }

    /// Input bytes consumed by the open segment.
    pub fn size(&self) -> u64 {
        match &self.state {
            State::Segment(segment) => segment.size,
            _ => 0,
        }
    }

    /// Payload bits produced so far for the open segment.
    pub fn encoded_bits(&self) -> f64 {
        match &self.state {
            State::Segment(segment) => {
                (segment.emitted + segment.encoder.staged() as u64) as f64 * 8.0
            }
            _ => 0.0,
        }
    }

    /// SHA-1 of the open segment's input so far.
    pub fn checksum(&self) -> Option<[u8; DIGEST_LEN]> {
        match &self.state {
            State::Segment(segment) => Some(segment.digest()),
            _ => None,
        }
    }
}
