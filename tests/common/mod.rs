//! In-memory sources and sinks exposed through C callbacks.

#![allow(dead_code)]

use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use zpack::read::{CallbackReader, PullBufferFn, PullByteFn};
use zpack::write::{CallbackWriter, PushBufferFn, PushByteFn};
use zpack::CALLBACK_ERROR;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Byte,
    Buffer,
    Both,
}

pub const SHAPES: [Shape; 3] = [Shape::Byte, Shape::Buffer, Shape::Both];

impl Shape {
    fn byte(self) -> bool {
        self != Shape::Buffer
    }

    fn buffer(self) -> bool {
        self != Shape::Byte
    }
}

#[derive(Default)]
pub struct Source {
    pub data: Vec<u8>,
    pub pos: usize,
    pub byte_calls: usize,
    pub buffer_calls: usize,
    /// report failure once this many bytes have been handed out
    pub fail_at: Option<usize>,
    /// claim one byte more than was asked for, or a byte value past 255
    pub overreport: bool,
}

impl Source {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    fn failing(&self) -> bool {
        self.fail_at.map_or(false, |n| self.pos >= n)
    }

    /// # Safety
    ///
    /// `self` must outlive the returned reader and stay in place.
    pub unsafe fn reader(&mut self, shape: Shape) -> CallbackReader {
        CallbackReader::new(
            self as *mut Self as *mut c_void,
            shape.byte().then_some(pull_byte as PullByteFn),
            shape.buffer().then_some(pull_buffer as PullBufferFn),
        )
        .unwrap()
    }
}

pub unsafe extern "C" fn pull_byte(ctx: *mut c_void) -> c_int {
    let s = &mut *(ctx as *mut Source);
    s.byte_calls += 1;
    if s.failing() {
        return CALLBACK_ERROR;
    }
    if s.overreport {
        return 256;
    }
    match s.data.get(s.pos) {
        Some(&b) => {
            s.pos += 1;
            b as c_int
        }
        None => -1,
    }
}

pub unsafe extern "C" fn pull_buffer(ctx: *mut c_void, buf: *mut c_char, n: c_int) -> c_int {
    let s = &mut *(ctx as *mut Source);
    s.buffer_calls += 1;
    if s.failing() {
        return CALLBACK_ERROR;
    }
    if s.overreport {
        return n + 1;
    }
    let mut len = (n as usize).min(s.data.len() - s.pos);
    if let Some(fail_at) = s.fail_at {
        len = len.min(fail_at - s.pos);
    }
    ptr::copy_nonoverlapping(s.data.as_ptr().add(s.pos), buf as *mut u8, len);
    s.pos += len;
    len as c_int
}

#[derive(Default)]
pub struct Sink {
    pub data: Vec<u8>,
    pub byte_calls: usize,
    /// length of every buffer push, in order
    pub buffer_calls: Vec<usize>,
    /// refuse everything once this many bytes were accepted
    pub fail_at: Option<usize>,
}

impl Sink {
    fn failing(&self) -> bool {
        self.fail_at.map_or(false, |n| self.data.len() >= n)
    }

    /// # Safety
    ///
    /// `self` must outlive the returned writer and stay in place.
    pub unsafe fn writer(&mut self, shape: Shape) -> CallbackWriter {
        CallbackWriter::new(
            self as *mut Self as *mut c_void,
            shape.byte().then_some(push_byte as PushByteFn),
            shape.buffer().then_some(push_buffer as PushBufferFn),
        )
        .unwrap()
    }
}

pub unsafe extern "C" fn push_byte(ctx: *mut c_void, b: c_int) -> c_int {
    let s = &mut *(ctx as *mut Sink);
    s.byte_calls += 1;
    if s.failing() {
        return CALLBACK_ERROR;
    }
    s.data.push(b as u8);
    0
}

pub unsafe extern "C" fn push_buffer(ctx: *mut c_void, buf: *const c_char, n: c_int) -> c_int {
    let s = &mut *(ctx as *mut Sink);
    s.buffer_calls.push(n as usize);
    if s.failing() {
        return CALLBACK_ERROR;
    }
    let bytes = std::slice::from_raw_parts(buf as *const u8, n as usize);
    s.data.extend_from_slice(bytes);
    n
}

/// Half noise, half text.
pub fn sample(len: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, RngCore, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0_u8; len];
    rng.fill_bytes(&mut data[..len / 2]);
    for x in &mut data[len / 2..] {
        *x = rng.gen_range(b'a'..=b'h');
    }
    data
}
