//! The seam between stream plumbing and the engine that encodes blocks.

use std::io::{Read, Write};

use crate::block::BlockSplitter;
use crate::compressor::Compressor;
use crate::decompressor::Decompresser;
use crate::errors::*;
use crate::frame::SEGMENT_END_SHA1;
use crate::method::Method;

/// Per-call compression options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressParams<'a> {
    pub method: &'a str,
    /// Stored with the first block only.
    pub filename: Option<&'a [u8]>,
    /// Stored with the first block only.
    pub comment: Option<&'a [u8]>,
    /// Record a SHA-1 of each block's input.
    pub checksum: bool,
}

impl<'a> CompressParams<'a> {
    pub fn new(method: &'a str) -> Self {
        Self {
            method,
            filename: None,
            comment: None,
            checksum: false,
        }
    }

    pub fn filename(mut self, filename: &'a [u8]) -> Self {
        self.filename = Some(filename);
        self
    }

    pub fn comment(mut self, comment: &'a [u8]) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// The same options without filename and comment, as used for every
    /// block after the first.
    pub fn anonymous(&self) -> Self {
        Self {
            filename: None,
            comment: None,
            ..*self
        }
    }

    /// Options for the block at `index`.
    pub fn for_block(&self, index: usize) -> Self {
        if index == 0 {
            *self
        } else {
            self.anonymous()
        }
    }
}

/// A block compression engine.
///
/// Implementations must be shareable between worker threads; the parallel
/// pipeline calls [`Codec::compress_block`] concurrently on one instance.
pub trait Codec: Sync {
    /// Compress `block` as one self-contained unit.
    fn compress_block(&self, block: &[u8], out: &mut dyn Write, params: &CompressParams) -> Result<()>;

    /// Split `input` with [`block_size_for`](crate::block_size_for) and
    /// compress every block in order. Empty input produces no output.
    fn compress(&self, input: &mut dyn Read, out: &mut dyn Write, params: &CompressParams) -> Result<()> {
        let method = Method::parse(params.method)?;
        let splitter = BlockSplitter::new(input, method.block_size());
        for block in splitter {
            let block = block?;
            self.compress_block(&block.data, out, &params.for_block(block.index))?;
        }
        out.flush()?;
        Ok(())
    }

    fn decompress(&self, input: &mut dyn Read, out: &mut dyn Write) -> Result<()>;
}

/// The built-in engine: store or raw deflate, framed as described in
/// [`frame`](crate::frame).
#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

impl Codec for Engine {
    fn compress_block(&self, block: &[u8], out: &mut dyn Write, params: &CompressParams) -> Result<()> {
        let mut compressor = Compressor::new();
        compressor.set_input(block);
        compressor.set_output(out)?;
        compressor.start_block_method(params.method)?;
        compressor.start_segment(params.filename, params.comment)?;
        compressor.compress(-1)?;
        compressor.end_segment_checksum(params.checksum)?;
        compressor.end_block()
    }

    fn decompress(&self, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
        let mut decompresser = Decompresser::new();
        decompresser.set_input(input);
        decompresser.set_output(&mut *out);
        while decompresser.find_block()?.is_some() {
            while decompresser.find_filename(None)? {
                decompresser.read_comment(None)?;
                decompresser.decompress(-1)?;
                let trailer = decompresser.read_segment_end()?;
                if trailer[0] == SEGMENT_END_SHA1 {
                    let digest = decompresser.segment_digest();
                    if digest.as_ref().map(|d| &d[..]) != Some(&trailer[1..]) {
                        return Err(Error::Checksum);
                    }
                }
            }
        }
        drop(decompresser);
        out.flush()?;
        Ok(())
    }
}
