use std::io;
use std::io::Read;

use crate::ReadUpTo;

/// An independently compressible piece of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position in source order, starting at 0.
    pub index: usize,
    pub data: Vec<u8>,
}

/// Cuts a stream into [`Block`]s of exactly `block_size` bytes; only the
/// last one may be shorter.
pub struct BlockSplitter<R> {
    reader: R,
    block_size: usize,
    next_index: usize,
    done: bool,
}

impl<R: Read> BlockSplitter<R> {
    pub fn new(reader: R, block_size: usize) -> Self {
        assert!(block_size > 0);
        Self {
            reader,
            block_size,
            next_index: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for BlockSplitter<R> {
    type Item = io::Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut data = Vec::new();
        match self.reader.read_up_to(self.block_size, &mut data) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Block { index, data }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
