//! Wire layout of a compressed block.
//!
//! ```text
//! block   := MAGIC_NUMBER descr segment* BLOCK_END
//! descr   := u16 len, descriptor body
//! segment := SEGMENT_START filename 0 comment 0 0 payload end
//! payload := (u32 n, n bytes)* u32 0
//! end     := SEGMENT_END_SHA1 digest[20] | SEGMENT_END
//! ```
//!
//! All integers are little-endian.

/// Optional marker written ahead of a block so a scanner can find it inside
/// foreign data. Decoders skip it like any other bytes before the magic.
pub const LOCATOR_TAG: [u8; 13] = [
    0x37, 0x6B, 0x53, 0x74, 0xA0, 0x31, 0x83, 0xD3, 0x8C, 0xB2, 0x28, 0xB0, 0xD3,
];

pub const SEGMENT_START: u8 = 1;
pub const SEGMENT_END_SHA1: u8 = 253;
pub const SEGMENT_END: u8 = 254;
pub const BLOCK_END: u8 = 255;

pub const DIGEST_LEN: usize = 20;

/// Size of the record returned for a segment trailer: type byte + digest.
pub const SEGMENT_END_LEN: usize = 1 + DIGEST_LEN;

/// Payload chunks are emitted once this many codec bytes are staged.
pub const CHUNK_SIZE: usize = 1 << 16;

/// Upper bound accepted for a single payload chunk when decoding.
pub const MAX_CHUNK_SIZE: usize = 1 << 26;
