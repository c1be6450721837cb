mod common;

use std::io::{Read, Write};

use proptest::prelude::*;

use common::{sample, Shape, Sink, Source, SHAPES};
use zpack::read::CallbackReader;
use zpack::write::{CallbackWriter, WRITE_BUFFER_SIZE};
use zpack::{CompressParams, Error};

#[test]
fn writer_concatenates_in_order() {
    for shape in SHAPES {
        for size in [1, WRITE_BUFFER_SIZE, 100_000] {
            let data = sample(size, size as u64);
            let mut sink = Sink::default();
            {
                let mut writer = unsafe { sink.writer(shape) };
                writer.put_byte(0xAA).unwrap();
                writer.write_bytes(&data).unwrap();
                writer.put_byte(0xBB).unwrap();
            }
            let mut expected = vec![0xAA];
            expected.extend_from_slice(&data);
            expected.push(0xBB);
            assert_eq!(sink.data, expected, "{:?} {}", shape, size);
        }
    }
}

#[test]
fn full_buffer_is_one_push() {
    let mut sink = Sink::default();
    let mut writer = unsafe { sink.writer(Shape::Buffer) };
    for i in 0..WRITE_BUFFER_SIZE {
        writer.put_byte(i as u8).unwrap();
    }
    assert_eq!(writer.buffered(), 0);
    writer.put_byte(1).unwrap();
    writer.flush_buffer().unwrap();
    writer.flush_buffer().unwrap();
    drop(writer);
    assert_eq!(sink.buffer_calls, vec![WRITE_BUFFER_SIZE, 1]);
    assert_eq!(sink.data.len(), WRITE_BUFFER_SIZE + 1);
}

#[test]
fn write_bytes_is_a_single_direct_push() {
    let mut sink = Sink::default();
    {
        let mut writer = unsafe { sink.writer(Shape::Both) };
        writer.put_byte(7).unwrap();
        writer.write_bytes(&[1; 100_000]).unwrap();
    }
    assert_eq!(sink.buffer_calls, vec![1, 100_000]);
    assert_eq!(sink.byte_calls, 0);
}

#[test]
fn byte_only_writer_pushes_every_byte() {
    let mut sink = Sink::default();
    {
        let mut writer = unsafe { sink.writer(Shape::Byte) };
        writer.write_all(b"hello").unwrap();
    }
    assert_eq!(sink.byte_calls, 5);
    assert_eq!(sink.data, b"hello");
}

#[test]
fn writer_failure_is_terminal() {
    let mut sink = Sink {
        fail_at: Some(3),
        ..Default::default()
    };
    {
        let mut writer = unsafe { sink.writer(Shape::Buffer) };
        writer.write_bytes(b"abc").unwrap();
        assert!(matches!(writer.write_bytes(b"def"), Err(Error::WriterCallback)));
        assert!(matches!(writer.put_byte(1), Err(Error::WriterCallback)));
        assert!(matches!(writer.flush_buffer(), Err(Error::WriterCallback)));
        let e: Error = writer.write(b"x").unwrap_err().into();
        assert!(matches!(e, Error::WriterCallback));
    }
    // no more pushes after the failing one, not even on drop
    assert_eq!(sink.buffer_calls, vec![3, 3]);
    assert_eq!(sink.data, b"abc");
}

#[test]
fn no_callbacks_is_an_error() {
    let r = unsafe { CallbackReader::new(std::ptr::null_mut(), None, None) };
    assert!(matches!(r, Err(Error::NoCallback)));
    let w = unsafe { CallbackWriter::new(std::ptr::null_mut(), None, None) };
    assert!(matches!(w, Err(Error::NoCallback)));
}

#[test]
fn read_into_pulls_bytes_one_at_a_time() {
    let mut source = Source::new((0..25).collect());
    let mut buf = [0_u8; 10];
    {
        let mut reader = unsafe { source.reader(Shape::Byte) };
        assert_eq!(reader.read_into(&mut buf).unwrap(), 10);
        assert_eq!(reader.read_into(&mut buf).unwrap(), 10);
        assert_eq!(reader.read_into(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[20, 21, 22, 23, 24]);
        assert_eq!(reader.read_into(&mut buf).unwrap(), 0);
    }
    // 25 bytes, one end-of-stream pull ending the third read, one for the fourth
    assert_eq!(source.byte_calls, 27);
    assert_eq!(source.buffer_calls, 0);
}

#[test]
fn read_into_with_buffer_callback_is_one_call() {
    let mut source = Source::new((0..25).collect());
    let mut buf = [0_u8; 10];
    {
        let mut reader = unsafe { source.reader(Shape::Both) };
        assert_eq!(reader.read_into(&mut buf).unwrap(), 10);
        assert_eq!(reader.next_byte().unwrap(), Some(10));
        assert_eq!(reader.read_into(&mut buf).unwrap(), 10);
        assert_eq!(reader.read_into(&mut buf).unwrap(), 4);
        assert_eq!(reader.read_into(&mut buf).unwrap(), 0);
        assert_eq!(reader.next_byte().unwrap(), None);
    }
    assert_eq!(source.buffer_calls, 4);
    assert_eq!(source.byte_calls, 2);
}

#[test]
fn buffer_only_reader_serves_single_bytes() {
    let mut source = Source::new(vec![9, 8]);
    let mut reader = unsafe { source.reader(Shape::Buffer) };
    assert_eq!(reader.next_byte().unwrap(), Some(9));
    assert_eq!(reader.next_byte().unwrap(), Some(8));
    assert_eq!(reader.next_byte().unwrap(), None);
}

#[test]
fn reader_sentinel_and_overreport_fail() {
    for shape in SHAPES {
        let mut source = Source::new(vec![1; 100]);
        source.fail_at = Some(40);
        let mut reader = unsafe { source.reader(shape) };
        let mut all = Vec::new();
        let e: Error = reader.read_to_end(&mut all).unwrap_err().into();
        assert!(matches!(e, Error::ReaderCallback), "{:?}", shape);
        // a byte-pulled read that fails part way keeps none of its bytes
        if shape == Shape::Byte {
            assert!(all.len() <= 40);
        } else {
            assert_eq!(all.len(), 40);
        }
    }

    let mut source = Source::new(vec![1; 100]);
    source.overreport = true;
    let mut reader = unsafe { source.reader(Shape::Buffer) };
    assert!(matches!(reader.read_into(&mut [0; 8]), Err(Error::ReaderCallback)));
}

#[test]
fn out_of_range_byte_fails() {
    let mut source = Source::new(vec![1; 10]);
    source.overreport = true;
    let mut reader = unsafe { source.reader(Shape::Byte) };
    assert!(matches!(reader.next_byte(), Err(Error::ReaderCallback)));
    assert!(matches!(reader.read_into(&mut [0; 4]), Err(Error::ReaderCallback)));
    assert_eq!(source.pos, 0);
}

#[test]
fn round_trip_through_every_callback_shape() {
    let data = sample(300_000, 1);
    let params = CompressParams::new("2").checksum(true);
    for in_shape in SHAPES {
        for out_shape in SHAPES {
            let mut source = Source::new(data.clone());
            let mut packed = Sink::default();
            unsafe {
                let mut reader = source.reader(in_shape);
                let mut writer = packed.writer(out_shape);
                zpack::compress(&mut reader, &mut writer, &params).unwrap();
            }

            let mut source = Source::new(packed.data);
            let mut unpacked = Sink::default();
            unsafe {
                let mut reader = source.reader(out_shape);
                let mut writer = unpacked.writer(in_shape);
                zpack::decompress(&mut reader, &mut writer).unwrap();
            }
            assert!(unpacked.data == data, "{:?} -> {:?}", in_shape, out_shape);
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Byte(u8),
    Bytes(Vec<u8>),
    Flush,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Byte),
        prop::collection::vec(any::<u8>(), 0..40_000).prop_map(Op::Bytes),
        Just(Op::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn interleaved_writes_concatenate(ops in prop::collection::vec(op(), 0..12)) {
        for shape in SHAPES {
            let mut expected = Vec::new();
            let mut sink = Sink::default();
            {
                let mut writer = unsafe { sink.writer(shape) };
                for op in &ops {
                    match op {
                        Op::Byte(b) => {
                            writer.put_byte(*b).unwrap();
                            expected.push(*b);
                        }
                        Op::Bytes(bytes) => {
                            writer.write_bytes(bytes).unwrap();
                            expected.extend_from_slice(bytes);
                        }
                        Op::Flush => writer.flush_buffer().unwrap(),
                    }
                }
            }
            prop_assert_eq!(&sink.data, &expected);
        }
    }
}
