//! Compressor and decompressor that do a direct stream-to-stream process
//! with the built-in [`Engine`].

use std::io::{Read, Write};

use crate::codec::{Codec, CompressParams, Engine};
use crate::errors::*;
use crate::write::CountingWriter;

/// Compress `reader` to `writer`.
///
/// The input is cut into blocks of [`block_size_for(method)`](crate::block_size_for)
/// bytes, each compressed independently.
pub fn compress<R, W>(reader: &mut R, writer: &mut W, params: &CompressParams) -> Result<()>
where
    R: Read,
    W: Write,
{
    Engine.compress(reader, writer, params)
}

/// Decompress `reader` to `writer`.
pub fn decompress<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: Read,
    W: Write,
{
    Engine.decompress(reader, writer)
}

/// Number of bytes [`compress`] would write.
pub fn compress_size<R: Read>(reader: &mut R, params: &CompressParams) -> Result<u64> {
    let mut sink = CountingWriter::new();
    Engine.compress(reader, &mut sink, params)?;
    Ok(sink.count())
}

/// Number of bytes [`decompress`] would write.
pub fn decompress_size<R: Read>(reader: &mut R) -> Result<u64> {
    let mut sink = CountingWriter::new();
    Engine.decompress(reader, &mut sink)?;
    Ok(sink.count())
}

pub fn compress_to_vec(data: &[u8], params: &CompressParams) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    compress(&mut &data[..], &mut out, params)?;
    Ok(out)
}

pub fn decompress_to_vec(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress(&mut &data[..], &mut out)?;
    Ok(out)
}
