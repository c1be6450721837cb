//! Parallel compressed-size measurement.
//!
//! The calling thread reads blocks and queues them; `threads` scoped workers
//! compress each block on its own into a counting sink. Block boundaries and
//! the per-block procedure are the same as in [`Codec::compress`], so the
//! total equals the sequential result for any worker count.
//!
//! Only the first failure is kept. Once it is set the producer stops reading
//! and the workers drain out without touching the remaining queue.

use std::collections::VecDeque;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use bytesize::ByteSize;
use tracing::{debug, warn};

use crate::block::{Block, BlockSplitter};
use crate::codec::{Codec, CompressParams, Engine};
use crate::errors::*;
use crate::method::Method;
use crate::write::CountingWriter;

#[derive(Default)]
struct PipelineState {
    queue: VecDeque<Block>,
    /// the producer has queued its last block
    done: bool,
    failure: Option<Error>,
    /// compressed size per block index
    sizes: Vec<u64>,
}

impl PipelineState {
    fn fail(&mut self, e: Error) {
        if self.failure.is_none() {
            warn!("parallel compression failed: {}", e);
            self.failure = Some(e);
        }
    }

    fn record(&mut self, index: usize, size: u64) {
        if self.sizes.len() <= index {
            self.sizes.resize(index + 1, 0);
        }
        self.sizes[index] = size;
    }
}

struct Shared {
    state: Mutex<PipelineState>,
    wakeup: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks the queue as finished when dropped, so the workers drain out even
/// if spawning or producing unwinds.
struct Finish<'a>(&'a Shared);

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        self.0.lock().done = true;
        self.0.wakeup.notify_all();
    }
}

/// Compressed size of `reader` using the built-in [`Engine`] on `threads`
/// workers.
pub fn compress_size_parallel<R: Read>(reader: R, params: &CompressParams, threads: usize) -> Result<u64> {
    compress_size_parallel_with(&Engine, reader, params, threads)
}

/// Like [`compress_size_parallel`] with any [`Codec`].
///
/// With `threads <= 1` this is a single sequential [`Codec::compress`] into a
/// counting sink.
pub fn compress_size_parallel_with<C, R>(
    codec: &C,
    mut reader: R,
    params: &CompressParams,
    threads: usize,
) -> Result<u64>
where
    C: Codec + ?Sized,
    R: Read,
{
    let method = Method::parse(params.method)?;
    if threads <= 1 {
        let mut sink = CountingWriter::new();
        codec.compress(&mut reader, &mut sink, params)?;
        return Ok(sink.count());
    }

    let block_size = method.block_size();
    debug!(
        "size pipeline: {} workers, block size {}",
        threads,
        ByteSize(block_size as u64).to_string_as(true)
    );

    let shared = Shared {
        state: Mutex::new(PipelineState::default()),
        wakeup: Condvar::new(),
    };
    thread::scope(|scope| {
        let _finish = Finish(&shared);
        for i in 0..threads {
            let spawned = thread::Builder::new()
                .name(format!("zpack-size-{}", i))
                .spawn_scoped(scope, || work(codec, params, &shared));
            if let Err(e) = spawned {
                shared.lock().fail(Error::Io(e));
                break;
            }
        }
        let produced = panic::catch_unwind(AssertUnwindSafe(|| produce(&mut reader, block_size, &shared)));
        if let Err(payload) = produced {
            shared.lock().fail(Error::from_panic(payload));
        }
    });

    let state = shared.state.into_inner().unwrap_or_else(PoisonError::into_inner);
    if let Some(e) = state.failure {
        return Err(e);
    }
    let total: u64 = state.sizes.iter().sum();
    debug!(
        "size pipeline: {} blocks, {} bytes compressed",
        state.sizes.len(),
        total
    );
    Ok(total)
}

fn produce<R: Read>(reader: &mut R, block_size: usize, shared: &Shared) {
    let mut splitter = BlockSplitter::new(reader, block_size);
    loop {
        if shared.lock().failure.is_some() {
            break;
        }
        match splitter.next() {
            Some(Ok(block)) => {
                debug!("queueing block {} ({} bytes)", block.index, block.data.len());
                shared.lock().queue.push_back(block);
                shared.wakeup.notify_one();
            }
            Some(Err(e)) => {
                shared.lock().fail(e.into());
                break;
            }
            None => break,
        }
    }
}

fn work<C: Codec + ?Sized>(codec: &C, params: &CompressParams, shared: &Shared) {
    loop {
        let block = {
            let mut state = shared.lock();
            loop {
                if state.failure.is_some() {
                    return;
                }
                if let Some(block) = state.queue.pop_front() {
                    break block;
                }
                if state.done {
                    return;
                }
                state = shared.wakeup.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| block_size_of(codec, params, &block)));
        let mut state = shared.lock();
        match result {
            Ok(Ok(size)) => state.record(block.index, size),
            Ok(Err(e)) => {
                state.fail(e);
                shared.wakeup.notify_all();
            }
            Err(payload) => {
                state.fail(Error::from_panic(payload));
                shared.wakeup.notify_all();
            }
        }
    }
}

fn block_size_of<C: Codec + ?Sized>(codec: &C, params: &CompressParams, block: &Block) -> Result<u64> {
    let mut sink = CountingWriter::new();
    codec.compress_block(&block.data, &mut sink, &params.for_block(block.index))?;
    Ok(sink.count())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_input_is_zero() {
        let params = CompressParams::new("1");
        assert_eq!(compress_size_parallel(&b""[..], &params, 4).unwrap(), 0);
        assert_eq!(compress_size_parallel(&b""[..], &params, 1).unwrap(), 0);
    }

    #[test]
    fn bad_method_fails_before_reading() {
        let params = CompressParams::new("q");
        let e = compress_size_parallel(&b"data"[..], &params, 4).unwrap_err();
        assert!(matches!(e, Error::Method(_)));
    }
}
