//! C-callable surface.
//!
//! Every function returns `0` on success, `-1` on failure and `1` where a
//! boolean answer is true, unless documented otherwise. Functions that hand
//! back a pointer return null on failure. On failure a message is left in the
//! per-thread error slot ([`zpk_last_error_ptr`]); it is cleared on entry to
//! every function except the `zpk_last_error_*` readers. Output parameters
//! are only written on success.
//!
//! Handles are created by `*_new` and must be released with the matching
//! `*_free`. Reader and writer handles given to a compressor or decompresser
//! must outlive every call that uses them.

use std::ffi::CStr;
use std::io;
use std::io::{Read, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::{ptr, slice};

use crate::buffer::StringBuffer;
use crate::codec::CompressParams;
use crate::compressor::Compressor;
use crate::crypto::{self, AesCtr, Sha1, Sha256};
use crate::decompressor::Decompresser;
use crate::errors::*;
use crate::frame::{DIGEST_LEN, SEGMENT_END_LEN};
use crate::last_error;
use crate::read::{CallbackReader, PullBufferFn, PullByteFn};
use crate::write::{CallbackWriter, PushBufferFn, PushByteFn};
use crate::{parallel, probe, stream, to_u16};

const OK: c_int = 0;
const FAIL: c_int = -1;
const TRUE: c_int = 1;

/// Run `f` with a cleared error slot, turning errors and panics into
/// `fail` plus a message.
fn guard<T>(fail: T, f: impl FnOnce() -> Result<T>) -> T {
    last_error::clear();
    let e = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => return v,
        Ok(Err(e)) => e,
        Err(payload) => Error::from_panic(payload),
    };
    last_error::set(&e.to_string());
    fail
}

fn status(f: impl FnOnce() -> Result<()>) -> c_int {
    guard(FAIL, || f().map(|()| OK))
}

fn boolean(f: impl FnOnce() -> Result<bool>) -> c_int {
    guard(FAIL, || f().map(|b| if b { TRUE } else { OK }))
}

fn new_handle<T>(f: impl FnOnce() -> Result<T>) -> *mut T {
    guard(ptr::null_mut(), || f().map(|v| Box::into_raw(Box::new(v))))
}

unsafe fn free_handle<T>(handle: *mut T) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

unsafe fn handle<'a, T>(handle: *mut T) -> Result<&'a mut T> {
    handle.as_mut().ok_or(Error::State("null handle"))
}

unsafe fn out_param<'a, T>(out: *mut T) -> Result<&'a mut T> {
    out.as_mut().ok_or(Error::State("null output pointer"))
}

unsafe fn c_str<'a>(s: *const c_char, what: &'static str) -> Result<&'a str> {
    if s.is_null() {
        return Err(Error::State(what));
    }
    CStr::from_ptr(s)
        .to_str()
        .map_err(|_| Error::format(format!("{} is not UTF-8", what)))
}

unsafe fn opt_c_bytes<'a>(s: *const c_char) -> Option<&'a [u8]> {
    (!s.is_null()).then(|| CStr::from_ptr(s).to_bytes())
}

unsafe fn bytes<'a>(p: *const u8, len: usize) -> Result<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if p.is_null() {
        return Err(Error::State("null buffer"));
    }
    Ok(slice::from_raw_parts(p, len))
}

unsafe fn bytes_mut<'a>(p: *mut u8, len: usize) -> Result<&'a mut [u8]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if p.is_null() {
        return Err(Error::State("null buffer"));
    }
    Ok(slice::from_raw_parts_mut(p, len))
}

fn length(n: impl TryInto<usize>) -> Result<usize> {
    n.try_into().map_err(|_| Error::State("negative length"))
}

unsafe fn params<'a>(
    method: *const c_char,
    filename: *const c_char,
    comment: *const c_char,
    checksum: c_int,
) -> Result<CompressParams<'a>> {
    Ok(CompressParams {
        method: c_str(method, "method")?,
        filename: opt_c_bytes(filename),
        comment: opt_c_bytes(comment),
        checksum: checksum != 0,
    })
}

/// A reader handle borrowed by a staged compressor or decompresser.
struct HandleReader(*mut CallbackReader);

impl Read for HandleReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        unsafe { (*self.0).read(buf) }
    }
}

struct HandleWriter(*mut CallbackWriter);

impl Write for HandleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        unsafe { (*self.0).write(buf) }
    }

    fn flush(&mut self) -> io::Result<()> {
        unsafe { (*self.0).flush() }
    }
}

// ---------------- error channel ----------------

#[no_mangle]
pub extern "C" fn zpk_clear_last_error() {
    last_error::clear();
}

/// # Safety
///
/// `msg` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn zpk_set_last_error(msg: *const c_char) {
    if msg.is_null() {
        last_error::set("");
    } else {
        last_error::set(&CStr::from_ptr(msg).to_string_lossy());
    }
}

/// NUL-terminated message, or null when none is set. Valid until the slot
/// is next cleared or set on this thread.
#[no_mangle]
pub extern "C" fn zpk_last_error_ptr() -> *const c_char {
    last_error::as_ptr()
}

#[no_mangle]
pub extern "C" fn zpk_last_error_len() -> usize {
    last_error::len()
}

/// Copy up to `cap` bytes of the message into `buf`, adding a NUL only if
/// there is room. Returns the number of message bytes copied.
///
/// # Safety
///
/// `buf` must be null or valid for `cap` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_last_error_copy(buf: *mut c_char, cap: usize) -> usize {
    let Ok(buf) = bytes_mut(buf as *mut u8, cap) else {
        return 0;
    };
    let n = last_error::copy_into(buf);
    if n < buf.len() {
        buf[n] = 0;
    }
    n
}

// ---------------- reader / writer ----------------

/// # Safety
///
/// See [`CallbackReader::new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_reader_new(
    ctx: *mut c_void,
    pull_byte: Option<PullByteFn>,
    pull_buffer: Option<PullBufferFn>,
) -> *mut CallbackReader {
    new_handle(|| CallbackReader::new(ctx, pull_byte, pull_buffer))
}

/// # Safety
///
/// `reader` must be null or come from [`zpk_reader_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_reader_free(reader: *mut CallbackReader) {
    last_error::clear();
    free_handle(reader);
}

/// # Safety
///
/// See [`CallbackWriter::new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_writer_new(
    ctx: *mut c_void,
    push_byte: Option<PushByteFn>,
    push_buffer: Option<PushBufferFn>,
) -> *mut CallbackWriter {
    new_handle(|| CallbackWriter::new(ctx, push_byte, push_buffer))
}

/// # Safety
///
/// `writer` must be null or come from [`zpk_writer_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_writer_flush(writer: *mut CallbackWriter) -> c_int {
    status(|| handle(writer)?.flush_buffer())
}

/// Flush and release the writer. Returns `-1` if the final flush failed;
/// the handle is released either way.
///
/// # Safety
///
/// `writer` must be null or come from [`zpk_writer_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_writer_free(writer: *mut CallbackWriter) -> c_int {
    status(|| {
        if writer.is_null() {
            return Ok(());
        }
        let mut writer = Box::from_raw(writer);
        writer.flush_buffer()
    })
}

// ---------------- streams ----------------

/// # Safety
///
/// Handles must be valid; string arguments must be null (filename, comment
/// only) or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn zpk_compress(
    reader: *mut CallbackReader,
    writer: *mut CallbackWriter,
    method: *const c_char,
    filename: *const c_char,
    comment: *const c_char,
    checksum: c_int,
) -> c_int {
    status(|| {
        let params = params(method, filename, comment, checksum)?;
        stream::compress(handle(reader)?, handle(writer)?, &params)
    })
}

/// # Safety
///
/// Handles must be valid.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompress(reader: *mut CallbackReader, writer: *mut CallbackWriter) -> c_int {
    status(|| stream::decompress(handle(reader)?, handle(writer)?))
}

/// # Safety
///
/// As for [`zpk_compress`]; `out_size` must be valid for a write.
#[no_mangle]
pub unsafe extern "C" fn zpk_compress_size(
    reader: *mut CallbackReader,
    method: *const c_char,
    filename: *const c_char,
    comment: *const c_char,
    checksum: c_int,
    out_size: *mut u64,
) -> c_int {
    status(|| {
        let out_size = out_param(out_size)?;
        let params = params(method, filename, comment, checksum)?;
        *out_size = stream::compress_size(handle(reader)?, &params)?;
        Ok(())
    })
}

/// Compressed size computed by `threads` workers. `threads <= 1` runs the
/// sequential path.
///
/// # Safety
///
/// As for [`zpk_compress_size`].
#[no_mangle]
pub unsafe extern "C" fn zpk_compress_size_parallel(
    reader: *mut CallbackReader,
    method: *const c_char,
    filename: *const c_char,
    comment: *const c_char,
    checksum: c_int,
    threads: c_int,
    out_size: *mut u64,
) -> c_int {
    status(|| {
        let out_size = out_param(out_size)?;
        let params = params(method, filename, comment, checksum)?;
        let threads = threads.max(1) as usize;
        *out_size = parallel::compress_size_parallel(handle(reader)?, &params, threads)?;
        Ok(())
    })
}

/// # Safety
///
/// `reader` must be valid; `out_size` must be valid for a write.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompress_size(reader: *mut CallbackReader, out_size: *mut u64) -> c_int {
    status(|| {
        let out_size = out_param(out_size)?;
        *out_size = stream::decompress_size(handle(reader)?)?;
        Ok(())
    })
}

/// Archive size of the file at `path`, scraped from the summary tool.
///
/// # Safety
///
/// `path` and `method` must be NUL-terminated; `out_size` must be valid for
/// a write.
#[no_mangle]
pub unsafe extern "C" fn zpk_archive_size_file(
    path: *const c_char,
    method: *const c_char,
    threads: c_int,
    out_size: *mut u64,
) -> c_int {
    status(|| {
        let out_size = out_param(out_size)?;
        let path = c_str(path, "path")?;
        let method = c_str(method, "method")?;
        *out_size = probe::archive_size_file(path, method, threads)?;
        Ok(())
    })
}

// ---------------- string buffer ----------------

#[no_mangle]
pub extern "C" fn zpk_string_buffer_new(initial: usize) -> *mut StringBuffer {
    new_handle(|| Ok(StringBuffer::new(initial)))
}

/// # Safety
///
/// `sb` must be null or come from [`zpk_string_buffer_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_free(sb: *mut StringBuffer) {
    last_error::clear();
    free_handle(sb);
}

/// # Safety
///
/// `sb` must be null or a live buffer handle.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_size(sb: *const StringBuffer) -> usize {
    sb.as_ref().map_or(0, StringBuffer::size)
}

/// # Safety
///
/// `sb` must be null or a live buffer handle.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_remaining(sb: *const StringBuffer) -> usize {
    sb.as_ref().map_or(0, StringBuffer::remaining)
}

/// Start of the contents, or null when empty. Invalidated by any call that
/// changes the buffer.
///
/// # Safety
///
/// `sb` must be null or a live buffer handle.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_data(sb: *const StringBuffer) -> *const u8 {
    match sb.as_ref() {
        Some(sb) if sb.size() > 0 => sb.data().as_ptr(),
        _ => ptr::null(),
    }
}

/// Append `n` bytes.
///
/// # Safety
///
/// `sb` must be a live buffer handle and `buf` valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_write(sb: *mut StringBuffer, buf: *const u8, n: usize) -> c_int {
    status(|| {
        let data = bytes(buf, n)?;
        handle(sb)?.write_all(data)?;
        Ok(())
    })
}

/// # Safety
///
/// `sb` must be null or a live buffer handle.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_reset(sb: *mut StringBuffer) {
    if let Some(sb) = sb.as_mut() {
        sb.reset();
    }
}

/// # Safety
///
/// `sb` must be null or a live buffer handle.
#[no_mangle]
pub unsafe extern "C" fn zpk_string_buffer_resize(sb: *mut StringBuffer, n: usize) {
    if let Some(sb) = sb.as_mut() {
        sb.resize(n);
    }
}

// ---------------- compressor ----------------

#[no_mangle]
pub extern "C" fn zpk_compressor_new() -> *mut Compressor<'static> {
    new_handle(|| Ok(Compressor::new()))
}

/// # Safety
///
/// `c` must be null or come from [`zpk_compressor_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_free(c: *mut Compressor<'static>) {
    last_error::clear();
    free_handle(c);
}

/// # Safety
///
/// `c` must be a live compressor; `reader` must outlive its use by `c`.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_set_input(c: *mut Compressor<'static>, reader: *mut CallbackReader) -> c_int {
    status(|| {
        let c = handle(c)?;
        handle(reader)?;
        c.set_input(HandleReader(reader));
        Ok(())
    })
}

/// # Safety
///
/// `c` must be a live compressor; `writer` must outlive its use by `c`.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_set_output(c: *mut Compressor<'static>, writer: *mut CallbackWriter) -> c_int {
    status(|| {
        let c = handle(c)?;
        handle(writer)?;
        c.set_output(HandleWriter(writer))
    })
}

/// # Safety
///
/// `c` must be a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_start_block_level(c: *mut Compressor<'static>, level: c_int) -> c_int {
    status(|| handle(c)?.start_block_level(level))
}

/// # Safety
///
/// `c` must be a live compressor; `method` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_start_block_method(
    c: *mut Compressor<'static>,
    method: *const c_char,
) -> c_int {
    status(|| {
        let method = c_str(method, "method")?;
        handle(c)?.start_block_method(method)
    })
}

/// Start a block from a raw descriptor: a little-endian `u16` length and
/// that many bytes.
///
/// # Safety
///
/// `c` must be a live compressor; `raw` must be readable for the length it
/// declares plus two.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_start_block_descriptor(c: *mut Compressor<'static>, raw: *const u8) -> c_int {
    status(|| {
        let len = to_u16(bytes(raw, 2)?) as usize;
        let raw = bytes(raw, 2 + len)?;
        handle(c)?.start_block_descriptor(raw)
    })
}

/// # Safety
///
/// `c` must be a live compressor; `filename` and `comment` null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_start_segment(
    c: *mut Compressor<'static>,
    filename: *const c_char,
    comment: *const c_char,
) -> c_int {
    status(|| handle(c)?.start_segment(opt_c_bytes(filename), opt_c_bytes(comment)))
}

/// Compress up to `n` bytes (all if negative). Returns `1` while more input
/// may follow, `0` at end of input.
///
/// # Safety
///
/// `c` must be a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_compress(c: *mut Compressor<'static>, n: i64) -> c_int {
    boolean(|| handle(c)?.compress(n))
}

/// # Safety
///
/// `c` must be a live compressor; `sha1` null or valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_end_segment(c: *mut Compressor<'static>, sha1: *const u8) -> c_int {
    status(|| {
        let digest = (sha1 as *const [u8; DIGEST_LEN]).as_ref();
        handle(c)?.end_segment(digest)
    })
}

/// End the segment, storing the SHA-1 of its input if `with_sha1` is set.
/// Returns `1` when a digest was written (and copied to `out_sha1` if
/// non-null), `0` otherwise. The input size goes to `out_size` if non-null.
///
/// # Safety
///
/// `c` must be a live compressor; out pointers null or writable.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_end_segment_checksum(
    c: *mut Compressor<'static>,
    out_size: *mut i64,
    with_sha1: c_int,
    out_sha1: *mut u8,
) -> c_int {
    boolean(|| {
        let (size, digest) = handle(c)?.end_segment_checksum(with_sha1 != 0)?;
        if let Some(out_size) = out_size.as_mut() {
            *out_size = size as i64;
        }
        if let (Some(digest), Some(out)) = (digest, (out_sha1 as *mut [u8; DIGEST_LEN]).as_mut()) {
            *out = digest;
        }
        Ok(digest.is_some())
    })
}

/// # Safety
///
/// `c` must be null or a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_get_size(c: *const Compressor<'static>) -> i64 {
    c.as_ref().map_or(0, |c| c.size() as i64)
}

/// # Safety
///
/// `c` must be null or a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_get_bits(c: *const Compressor<'static>) -> f64 {
    c.as_ref().map_or(0.0, Compressor::encoded_bits)
}

/// Returns `1` and fills `out_sha1` while a segment is open, `0` otherwise.
///
/// # Safety
///
/// `c` must be a live compressor; `out_sha1` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_get_checksum(c: *mut Compressor<'static>, out_sha1: *mut u8) -> c_int {
    boolean(|| {
        let out = out_param(out_sha1 as *mut [u8; DIGEST_LEN])?;
        match handle(c)?.checksum() {
            Some(digest) => {
                *out = digest;
                Ok(true)
            }
            None => Ok(false),
        }
    })
}

/// # Safety
///
/// `c` must be a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_end_block(c: *mut Compressor<'static>) -> c_int {
    status(|| handle(c)?.end_block())
}

/// # Safety
///
/// `c` must be a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_write_tag(c: *mut Compressor<'static>) -> c_int {
    status(|| handle(c)?.write_tag())
}

/// Non-zero `verify` turns on decode-and-compare for segments started
/// afterwards.
///
/// # Safety
///
/// `c` must be a live compressor.
#[no_mangle]
pub unsafe extern "C" fn zpk_compressor_set_verify(c: *mut Compressor<'static>, verify: c_int) -> c_int {
    status(|| {
        handle(c)?.set_verify(verify != 0);
        Ok(())
    })
}

// ---------------- decompresser ----------------

#[no_mangle]
pub extern "C" fn zpk_decompresser_new() -> *mut Decompresser<'static> {
    new_handle(|| Ok(Decompresser::new()))
}

/// # Safety
///
/// `d` must be null or come from [`zpk_decompresser_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_free(d: *mut Decompresser<'static>) {
    last_error::clear();
    free_handle(d);
}

/// # Safety
///
/// `d` must be a live decompresser; `reader` must outlive its use by `d`.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_set_input(
    d: *mut Decompresser<'static>,
    reader: *mut CallbackReader,
) -> c_int {
    status(|| {
        let d = handle(d)?;
        handle(reader)?;
        d.set_input(HandleReader(reader));
        Ok(())
    })
}

/// A null `writer` discards decoded data.
///
/// # Safety
///
/// `d` must be a live decompresser; `writer` null or outliving its use by `d`.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_set_output(
    d: *mut Decompresser<'static>,
    writer: *mut CallbackWriter,
) -> c_int {
    status(|| {
        let d = handle(d)?;
        if writer.is_null() {
            d.clear_output();
        } else {
            d.set_output(HandleWriter(writer));
        }
        Ok(())
    })
}

/// Returns `1` when a block was found (its memory estimate goes to
/// `out_mem` if non-null), `0` at end of input.
///
/// # Safety
///
/// `d` must be a live decompresser; `out_mem` null or writable.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_find_block(d: *mut Decompresser<'static>, out_mem: *mut f64) -> c_int {
    boolean(|| match handle(d)?.find_block()? {
        Some(mem) => {
            if let Some(out) = out_mem.as_mut() {
                *out = mem;
            }
            Ok(true)
        }
        None => Ok(false),
    })
}

/// Returns `1` when a segment follows (its filename is pushed to `writer` if
/// non-null), `0` at the end of the block.
///
/// # Safety
///
/// `d` must be a live decompresser; `writer` null or a live writer.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_find_filename(
    d: *mut Decompresser<'static>,
    writer: *mut CallbackWriter,
) -> c_int {
    boolean(|| {
        let d = handle(d)?;
        let mut sink = writer.as_mut();
        let found = d.find_filename(sink.as_mut().map(|w| &mut **w as &mut dyn Write))?;
        if let Some(w) = sink {
            w.flush_buffer()?;
        }
        Ok(found)
    })
}

/// # Safety
///
/// `d` must be a live decompresser; `writer` null or a live writer.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_read_comment(
    d: *mut Decompresser<'static>,
    writer: *mut CallbackWriter,
) -> c_int {
    status(|| {
        let d = handle(d)?;
        let mut sink = writer.as_mut();
        d.read_comment(sink.as_mut().map(|w| &mut **w as &mut dyn Write))?;
        if let Some(w) = sink {
            w.flush_buffer()?;
        }
        Ok(())
    })
}

/// Decode up to `n` bytes (all if negative). Returns `1` while more data
/// remains in the segment, `0` once it is exhausted.
///
/// # Safety
///
/// `d` must be a live decompresser.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_decompress(d: *mut Decompresser<'static>, n: i64) -> c_int {
    boolean(|| handle(d)?.decompress(n))
}

/// Copies the 21-byte trailer record to `out` if non-null.
///
/// # Safety
///
/// `d` must be a live decompresser; `out` null or valid for 21 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_read_segment_end(d: *mut Decompresser<'static>, out: *mut u8) -> c_int {
    status(|| {
        let trailer = handle(d)?.read_segment_end()?;
        if let Some(out) = (out as *mut [u8; SEGMENT_END_LEN]).as_mut() {
            *out = trailer;
        }
        Ok(())
    })
}

/// # Safety
///
/// `d` must be null or a live decompresser.
#[no_mangle]
pub unsafe extern "C" fn zpk_decompresser_buffered(d: *const Decompresser<'static>) -> usize {
    d.as_ref().map_or(0, Decompresser::buffered)
}

// ---------------- hashes ----------------

#[no_mangle]
pub extern "C" fn zpk_sha1_new() -> *mut Sha1 {
    new_handle(|| Ok(Sha1::new()))
}

/// # Safety
///
/// `s` must be null or come from [`zpk_sha1_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_free(s: *mut Sha1) {
    free_handle(s);
}

/// Hash the low 8 bits of `c`.
///
/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_put(s: *mut Sha1, c: c_int) {
    if let Some(s) = s.as_mut() {
        s.put(c as u8);
    }
}

/// # Safety
///
/// `s` must be null or a live hasher; `buf` valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_write(s: *mut Sha1, buf: *const u8, n: i64) -> c_int {
    status(|| {
        let data = bytes(buf, length(n)?)?;
        handle(s)?.write(data);
        Ok(())
    })
}

/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_usize(s: *const Sha1) -> u64 {
    s.as_ref().map_or(0, Sha1::len)
}

/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_size(s: *const Sha1) -> f64 {
    s.as_ref().map_or(0.0, Sha1::size)
}

/// Write the 20-byte digest and reset the hasher.
///
/// # Safety
///
/// `s` must be a live hasher; `out` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha1_result(s: *mut Sha1, out: *mut u8) -> c_int {
    status(|| {
        let out = out_param(out as *mut [u8; 20])?;
        out.copy_from_slice(&handle(s)?.result());
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn zpk_sha256_new() -> *mut Sha256 {
    new_handle(|| Ok(Sha256::new()))
}

/// # Safety
///
/// `s` must be null or come from [`zpk_sha256_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_free(s: *mut Sha256) {
    free_handle(s);
}

/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_put(s: *mut Sha256, c: c_int) {
    if let Some(s) = s.as_mut() {
        s.put(c as u8);
    }
}

/// # Safety
///
/// `s` must be null or a live hasher; `buf` valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_write(s: *mut Sha256, buf: *const u8, n: i64) -> c_int {
    status(|| {
        let data = bytes(buf, length(n)?)?;
        handle(s)?.write(data);
        Ok(())
    })
}

/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_usize(s: *const Sha256) -> u64 {
    s.as_ref().map_or(0, Sha256::len)
}

/// # Safety
///
/// `s` must be null or a live hasher.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_size(s: *const Sha256) -> f64 {
    s.as_ref().map_or(0.0, Sha256::size)
}

/// Write the 32-byte digest and reset the hasher.
///
/// # Safety
///
/// `s` must be a live hasher; `out` valid for 32 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_sha256_result(s: *mut Sha256, out: *mut u8) -> c_int {
    status(|| {
        let out = out_param(out as *mut [u8; 32])?;
        out.copy_from_slice(&handle(s)?.result());
        Ok(())
    })
}

// ---------------- AES / key stretching / random ----------------

/// `iv` is null or 8 bytes.
///
/// # Safety
///
/// `key` must be valid for `key_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_aes_ctr_new(key: *const u8, key_len: c_int, iv: *const u8) -> *mut AesCtr {
    new_handle(|| {
        let key = bytes(key, length(key_len)?)?;
        AesCtr::new(key, (iv as *const [u8; 8]).as_ref())
    })
}

/// # Safety
///
/// `a` must be null or come from [`zpk_aes_ctr_new`].
#[no_mangle]
pub unsafe extern "C" fn zpk_aes_ctr_free(a: *mut AesCtr) {
    free_handle(a);
}

/// XOR `n` bytes of `buf` with the keystream at byte `offset`.
///
/// # Safety
///
/// `a` must be a live cipher; `buf` valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_aes_ctr_encrypt_slice(a: *mut AesCtr, buf: *mut u8, n: c_int, offset: u64) -> c_int {
    status(|| {
        let a = handle(a)?;
        a.encrypt(bytes_mut(buf, length(n)?)?, offset)
    })
}

/// # Safety
///
/// `a` must be a live cipher; `out` valid for 16 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_aes_ctr_encrypt_block(
    a: *mut AesCtr,
    s0: u32,
    s1: u32,
    s2: u32,
    s3: u32,
    out: *mut u8,
) -> c_int {
    status(|| {
        let out = out_param(out as *mut [u8; 16])?;
        *out = handle(a)?.encrypt_block(s0, s1, s2, s3);
        Ok(())
    })
}

/// # Safety
///
/// All three pointers must be valid for 32 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_stretch_key(out: *mut u8, key: *const u8, salt: *const u8) -> c_int {
    status(|| {
        let out = out_param(out as *mut [u8; 32])?;
        let key = (key as *const [u8; 32]).as_ref().ok_or(Error::State("null key"))?;
        let salt = (salt as *const [u8; 32]).as_ref().ok_or(Error::State("null salt"))?;
        *out = crypto::stretch_key(key, salt)?;
        Ok(())
    })
}

/// # Safety
///
/// `buf` must be valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_random(buf: *mut u8, n: c_int) -> c_int {
    status(|| crypto::random(bytes_mut(buf, length(n)?)?))
}

/// Little-endian `u16` from `p[0]` and `p[1]`.
///
/// # Safety
///
/// `p` must be null or valid for 2 bytes.
#[no_mangle]
pub unsafe extern "C" fn zpk_to_u16(p: *const u8) -> u16 {
    bytes(p, 2).map_or(0, to_u16)
}
