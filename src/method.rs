//! Method specifiers.
//!
//! | Value      | Meaning                                   |
//! |------------|-------------------------------------------|
//! | `"0"`      | store, no compression                     |
//! | `"1"`-`"5"`| deflate presets, fastest to smallest      |
//! | `"x4.9"`   | deflate, block exponent 4, level 9        |
//! | `"s6"`     | store, block exponent 6                   |
//!
//! The second and third characters of any specifier are the block size
//! exponent, see [`block_size_for`].

use crate::errors::*;

/// Exponent used when the specifier does not carry one.
pub const DEFAULT_BLOCK_EXPONENT: u32 = 4;
pub const MAX_BLOCK_EXPONENT: u32 = 11;

/// deflate level for each numeric preset
const PRESET_LEVELS: [u32; 6] = [0, 1, 4, 6, 8, 9];
const DEFAULT_EXPLICIT_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Codec {
    Store = 0,
    Deflate = 1,
}

impl Codec {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Store),
            1 => Some(Self::Deflate),
            _ => None,
        }
    }
}

/// How a single block is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub codec: Codec,
    pub level: u32,
}

impl Descriptor {
    /// Encoded length of the descriptor body, without its `u16` prefix.
    pub const LEN: usize = 2;

    pub fn from_level(level: i32) -> Result<Self> {
        match level {
            0 => Ok(Self {
                codec: Codec::Store,
                level: 0,
            }),
            1..=5 => Ok(Self {
                codec: Codec::Deflate,
                level: PRESET_LEVELS[level as usize],
            }),
            _ => Err(Error::Method(format!(
                "compression level must be 0..=5, got {}",
                level
            ))),
        }
    }

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        [self.codec as u8, self.level as u8]
    }

    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        if body.len() != Self::LEN {
            return Err(Error::format(format!(
                "block descriptor must be {} bytes, got {}",
                Self::LEN,
                body.len()
            )));
        }
        let codec = Codec::from_u8(body[0])
            .ok_or_else(|| Error::format(format!("unknown codec id {}", body[0])))?;
        let level = body[1] as u32;
        if level > 9 || (codec == Codec::Store && level != 0) {
            return Err(Error::format(format!("bad level {} for {:?}", level, codec)));
        }
        Ok(Self { codec, level })
    }
}

/// A parsed method specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    pub descriptor: Descriptor,
    pub block_exponent: u32,
}

impl Method {
    pub fn parse(method: &str) -> Result<Self> {
        let bytes = method.as_bytes();
        let Some(&kind) = bytes.first() else {
            return Err(Error::Method("empty method".into()));
        };
        let descriptor = match kind {
            b'0'..=b'9' => Descriptor::from_level((kind - b'0') as i32)
                .map_err(|_| Error::Method(format!("unsupported preset '{}'", method)))?,
            b's' => Descriptor {
                codec: Codec::Store,
                level: 0,
            },
            b'x' => {
                let level = match method.split_once('.') {
                    Some((_, arg)) if !arg.is_empty() => arg
                        .parse::<u32>()
                        .ok()
                        .filter(|l| *l <= 9)
                        .ok_or_else(|| Error::Method(format!("bad deflate level in '{}'", method)))?,
                    _ => DEFAULT_EXPLICIT_LEVEL,
                };
                Descriptor {
                    codec: Codec::Deflate,
                    level,
                }
            }
            _ => {
                return Err(Error::Method(format!(
                    "'{}' must start with a digit, 'x' or 's'",
                    method
                )))
            }
        };
        Ok(Self {
            descriptor,
            block_exponent: block_exponent(method),
        })
    }

    pub fn block_size(&self) -> usize {
        size_from_exponent(self.block_exponent)
    }
}

fn block_exponent(method: &str) -> u32 {
    let digit = |i: usize| {
        method
            .as_bytes()
            .get(i)
            .filter(|c| c.is_ascii_digit())
            .map(|c| (c - b'0') as u32)
    };
    if method.is_empty() {
        return DEFAULT_BLOCK_EXPONENT;
    }
    match digit(1) {
        Some(hi) => {
            let e = match digit(2) {
                Some(lo) => hi * 10 + lo,
                None => hi,
            };
            e.min(MAX_BLOCK_EXPONENT)
        }
        None => DEFAULT_BLOCK_EXPONENT,
    }
}

fn size_from_exponent(e: u32) -> usize {
    let size = (0x100000_i64 << e) - 4096;
    if size > 0 {
        size as usize
    } else {
        1 << 20
    }
}

/// Block size implied by a method specifier.
///
/// Both the sequential and the parallel paths frame their input with this,
/// so it decides where every block boundary falls.
///
/// ```
/// assert_eq!(zpack::block_size_for("1"), 16773120);
/// assert_eq!(zpack::block_size_for("14"), 16773120);
/// assert_eq!(zpack::block_size_for(""), 16773120);
/// assert_eq!(zpack::block_size_for("10"), 1044480);
/// ```
pub fn block_size_for(method: &str) -> usize {
    size_from_exponent(block_exponent(method))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn presets_and_explicit_methods() {
        let m = Method::parse("3").unwrap();
        assert_eq!(m.descriptor, Descriptor { codec: Codec::Deflate, level: 6 });
        assert_eq!(m.block_exponent, DEFAULT_BLOCK_EXPONENT);

        let m = Method::parse("0").unwrap();
        assert_eq!(m.descriptor.codec, Codec::Store);

        let m = Method::parse("x2.9").unwrap();
        assert_eq!(m.descriptor, Descriptor { codec: Codec::Deflate, level: 9 });
        assert_eq!(m.block_exponent, 2);
        assert_eq!(m.block_size(), block_size_for("x2.9"));

        assert_eq!(Method::parse("x").unwrap().descriptor.level, DEFAULT_EXPLICIT_LEVEL);
        assert_eq!(Method::parse("s07").unwrap().block_exponent, 7);
    }

    #[test]
    fn descriptor_bytes() {
        let d = Descriptor::from_level(5).unwrap();
        assert_eq!(Descriptor::from_bytes(&d.to_bytes()).unwrap(), d);
        assert!(Descriptor::from_bytes(&[0, 3]).is_err());
        assert!(Descriptor::from_bytes(&[2, 0]).is_err());
        assert!(Descriptor::from_bytes(&[1]).is_err());
    }
}
