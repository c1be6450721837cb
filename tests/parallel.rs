mod common;

use std::io::{Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;

use common::{sample, Shape, Source};
use zpack::stream::compress_size;
use zpack::{block_size_for, compress_size_parallel, compress_size_parallel_with};
use zpack::{Codec, CompressParams, Engine, Error, Result};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn parallel_matches_sequential() {
    init_logging();
    let inputs = [
        Vec::new(),
        vec![0_u8; 1],
        sample(1_044_480, 2),
        sample(1_044_481, 3),
        sample(3_500_000, 4),
    ];
    let params = [
        CompressParams::new("00"),
        CompressParams::new("10").checksum(true),
        CompressParams::new("x0.7").filename(b"f.bin").comment(b"first block only"),
        CompressParams::new("3"),
    ];
    for data in &inputs {
        for params in &params {
            let expected = compress_size(&mut &data[..], params).unwrap();
            for threads in [0, 1, 2, 4, 8] {
                let size = compress_size_parallel(&data[..], params, threads).unwrap();
                assert_eq!(size, expected, "{} bytes, {:?}, {} threads", data.len(), params.method, threads);
            }
        }
    }
}

#[test]
fn parallel_over_callback_reader() {
    let data = sample(2_500_000, 5);
    let params = CompressParams::new("10");
    let expected = compress_size(&mut &data[..], &params).unwrap();
    for shape in [Shape::Byte, Shape::Buffer] {
        let mut source = Source::new(data.clone());
        let reader = unsafe { source.reader(shape) };
        assert_eq!(compress_size_parallel(reader, &params, 4).unwrap(), expected);
    }
}

/// Fails on any block whose first byte is `self.0`.
struct FailOn(u8);

impl Codec for FailOn {
    fn compress_block(&self, block: &[u8], out: &mut dyn Write, params: &CompressParams) -> Result<()> {
        if block.first() == Some(&self.0) {
            return Err(Error::Format(format!("injected failure in block {}", self.0)));
        }
        Engine.compress_block(block, out, params)
    }

    fn decompress(&self, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
        Engine.decompress(input, out)
    }
}

struct PanicOn(u8);

impl Codec for PanicOn {
    fn compress_block(&self, block: &[u8], out: &mut dyn Write, params: &CompressParams) -> Result<()> {
        if block.first() == Some(&self.0) {
            panic!("worker exploded");
        }
        Engine.compress_block(block, out, params)
    }

    fn decompress(&self, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
        Engine.decompress(input, out)
    }
}

/// Five blocks, block `i` filled with byte `i`.
fn five_blocks(method: &str) -> Vec<u8> {
    let block_size = block_size_for(method);
    (0..5_u8)
        .flat_map(|i| std::iter::repeat(i).take(block_size))
        .collect()
}

#[test]
fn first_failure_is_reported() {
    init_logging();
    let data = five_blocks("00");
    let params = CompressParams::new("00");
    for threads in [1, 2, 4, 8] {
        let e = compress_size_parallel_with(&FailOn(2), &data[..], &params, threads).unwrap_err();
        assert!(
            matches!(e, Error::Format(ref msg) if msg == "injected failure in block 2"),
            "{} threads: {}",
            threads,
            e
        );
    }
    // the same codec succeeds when nothing matches
    let ok = compress_size_parallel_with(&FailOn(9), &data[..], &params, 4).unwrap();
    assert_eq!(ok, compress_size(&mut &data[..], &params).unwrap());
}

#[test]
fn worker_panic_becomes_an_error() {
    let data = five_blocks("00");
    let params = CompressParams::new("00");
    let e = compress_size_parallel_with(&PanicOn(3), &data[..], &params, 4).unwrap_err();
    assert!(matches!(e, Error::Panic(ref msg) if msg == "worker exploded"), "{}", e);
}

#[test]
fn reader_failure_stops_the_pipeline() {
    let data = five_blocks("00");
    for threads in [1, 4] {
        let mut source = Source::new(data.clone());
        source.fail_at = Some(data.len() / 2);
        let reader = unsafe { source.reader(Shape::Buffer) };
        let e = compress_size_parallel(reader, &CompressParams::new("00"), threads).unwrap_err();
        assert!(matches!(e, Error::ReaderCallback), "{}", e);
    }
}

/// Yields zeros and panics once `self.0` bytes have been read.
struct PanickingReader(usize);

impl Read for PanickingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.0 == 0 {
            panic!("reader exploded");
        }
        let n = buf.len().min(self.0);
        buf[..n].fill(0);
        self.0 -= n;
        Ok(n)
    }
}

#[test]
fn reader_panic_becomes_an_error() {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = compress_size_parallel(PanickingReader(3_000_000), &CompressParams::new("00"), 4);
        let _ = tx.send(result);
    });
    let result = rx
        .recv_timeout(Duration::from_secs(60))
        .expect("pipeline did not finish after the reader panicked");
    let e = result.unwrap_err();
    assert!(matches!(e, Error::Panic(ref msg) if msg == "reader exploded"), "{}", e);
}

#[test]
fn repeated_runs_are_stable() {
    let data = sample(10 << 20, 6);
    let params = CompressParams::new("00");
    let expected = compress_size(&mut &data[..], &params).unwrap();
    let mismatches = (0..100)
        .into_par_iter()
        .map(|_| compress_size_parallel(&data[..], &params, 8).unwrap())
        .filter(|size| *size != expected)
        .count();
    assert_eq!(mismatches, 0);
}
