//! Hashes, AES in counter mode, key stretching and OS randomness.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher, StreamCipherSeek};
use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr64BE;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::digest::{Digest, FixedOutputReset, Output};

use crate::errors::*;

/// Incremental hash that also counts its input.
#[derive(Clone, Default)]
pub struct Hasher<D> {
    inner: D,
    len: u64,
}

pub type Sha1 = Hasher<sha1::Sha1>;
pub type Sha256 = Hasher<sha2::Sha256>;

impl<D: Digest + FixedOutputReset> Hasher<D> {
    pub fn new() -> Self {
        Self {
            inner: D::new(),
            len: 0,
        }
    }

    pub fn put(&mut self, b: u8) {
        self.write(&[b]);
    }

    pub fn write(&mut self, buf: &[u8]) {
        Digest::update(&mut self.inner, buf);
        self.len += buf.len() as u64;
    }

    /// Bytes hashed since the last [`result`](Self::result).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size(&self) -> f64 {
        self.len as f64
    }

    /// The digest of everything written so far; the hasher starts over.
    pub fn result(&mut self) -> Output<D> {
        self.len = 0;
        self.inner.finalize_reset()
    }
}

#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// AES in counter mode: keystream block `i` is `AES(iv || i)` with `i` a
/// big-endian `u64`, so any byte offset can be encrypted independently.
/// Applying it twice at the same offset restores the input.
#[derive(Clone)]
pub struct AesCtr {
    key: Vec<u8>,
    iv: [u8; 8],
    cipher: BlockCipher,
}

impl AesCtr {
    /// `key` must be 16, 24 or 32 bytes; a missing `iv` is all zeros.
    pub fn new(key: &[u8], iv: Option<&[u8; 8]>) -> Result<Self> {
        let bad_key = |_| Error::Crypto(format!("invalid AES key length {}", key.len()));
        let cipher = match key.len() {
            16 => BlockCipher::Aes128(Aes128::new_from_slice(key).map_err(bad_key)?),
            24 => BlockCipher::Aes192(Aes192::new_from_slice(key).map_err(bad_key)?),
            32 => BlockCipher::Aes256(Aes256::new_from_slice(key).map_err(bad_key)?),
            n => return Err(Error::Crypto(format!("invalid AES key length {}", n))),
        };
        Ok(Self {
            key: key.to_vec(),
            iv: iv.copied().unwrap_or_default(),
            cipher,
        })
    }

    /// XOR `buf` with the keystream starting at byte `offset`.
    pub fn encrypt(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut nonce = [0_u8; 16];
        nonce[..8].copy_from_slice(&self.iv);
        let bad_key = |_| Error::Crypto("invalid AES key length".into());
        match self.cipher {
            BlockCipher::Aes128(_) => {
                let cipher = Ctr64BE::<Aes128>::new_from_slices(&self.key, &nonce).map_err(bad_key)?;
                apply_keystream(cipher, buf, offset)
            }
            BlockCipher::Aes192(_) => {
                let cipher = Ctr64BE::<Aes192>::new_from_slices(&self.key, &nonce).map_err(bad_key)?;
                apply_keystream(cipher, buf, offset)
            }
            BlockCipher::Aes256(_) => {
                let cipher = Ctr64BE::<Aes256>::new_from_slices(&self.key, &nonce).map_err(bad_key)?;
                apply_keystream(cipher, buf, offset)
            }
        }
    }

    /// Encrypt one block made of four big-endian words.
    pub fn encrypt_block(&self, s0: u32, s1: u32, s2: u32, s3: u32) -> [u8; 16] {
        let mut block = aes::Block::default();
        for (chunk, word) in block.chunks_exact_mut(4).zip([s0, s1, s2, s3]) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        match &self.cipher {
            BlockCipher::Aes128(c) => c.encrypt_block(&mut block),
            BlockCipher::Aes192(c) => c.encrypt_block(&mut block),
            BlockCipher::Aes256(c) => c.encrypt_block(&mut block),
        }
        let mut out = [0_u8; 16];
        out.copy_from_slice(&block);
        out
    }
}

fn apply_keystream<S: StreamCipher + StreamCipherSeek>(mut cipher: S, buf: &mut [u8], offset: u64) -> Result<()> {
    cipher
        .try_seek(offset)
        .map_err(|e| Error::Crypto(format!("keystream offset {}: {}", offset, e)))?;
    cipher
        .try_apply_keystream(buf)
        .map_err(|e| Error::Crypto(format!("keystream exhausted: {}", e)))
}

/// scrypt with N = 16384, r = 8, p = 1.
pub fn stretch_key(key: &[u8; 32], salt: &[u8; 32]) -> Result<[u8; 32]> {
    let params = scrypt::Params::new(14, 8, 1, 32).map_err(|e| Error::Crypto(e.to_string()))?;
    let mut out = [0_u8; 32];
    scrypt::scrypt(key, salt, &params, &mut out).map_err(|e| Error::Crypto(e.to_string()))?;
    Ok(out)
}

/// Fill `buf` from the operating system's generator.
pub fn random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Crypto(format!("random source failed: {}", e)))
}
