//! Order-preserving key encoding.
//!
//! Every encoded key starts with a type tag so a segment written for one key
//! type is rejected when read back as another. Integers are big-endian with the
//! sign bit flipped. Strings escape `0x00` as `0x00 0xFF` and end with
//! `0x00 0x00`, so a prefix sorts before its extensions.

use super::{EncodingError, Key};
use crate::error::Result;

const TAG_SIGNED: u8 = 0x02;
const TAG_UNSIGNED: u8 = 0x03;
const TAG_STRING: u8 = 0x04;

const SIGN_BIT: u64 = 1 << 63;

pub fn encode_signed(i: i64) -> Vec<u8> {
    tagged_u64(TAG_SIGNED, (i as u64) ^ SIGN_BIT)
}

pub fn decode_signed(bytes: &[u8]) -> Result<i64> {
    let raw = fixed_width(bytes, TAG_SIGNED, "signed integer")?;
    Ok((raw ^ SIGN_BIT) as i64)
}

pub fn encode_unsigned(u: u64) -> Vec<u8> {
    tagged_u64(TAG_UNSIGNED, u)
}

pub fn decode_unsigned(bytes: &[u8]) -> Result<u64> {
    fixed_width(bytes, TAG_UNSIGNED, "unsigned integer")
}

fn tagged_u64(tag: u8, raw: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(tag);
    out.extend_from_slice(&raw.to_be_bytes());
    out
}

fn fixed_width(bytes: &[u8], tag: u8, what: &str) -> Result<u64> {
    match bytes.split_first() {
        None => Err(EncodingError::TruncatedData.into()),
        Some((&t, _)) if t != tag => {
            Err(EncodingError::InvalidFormat(format!("Not a {} type", what)).into())
        }
        Some((_, rest)) => {
            let buf: [u8; 8] = rest.try_into().map_err(|_| {
                EncodingError::InvalidFormat(format!("{} must be 9 bytes total", what))
            })?;
            Ok(u64::from_be_bytes(buf))
        }
    }
}

pub fn encode_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 3);
    out.push(TAG_STRING);
    for &byte in s.as_bytes() {
        match byte {
            0x00 => out.extend_from_slice(&[0x00, 0xFF]),
            other => out.push(other),
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

pub fn decode_string(bytes: &[u8]) -> Result<String> {
    let raw = unescape(bytes)?;
    String::from_utf8(raw).map_err(|_| EncodingError::InvalidUtf8.into())
}

fn unescape(bytes: &[u8]) -> Result<Vec<u8>> {
    let encoded = match bytes.split_first() {
        None => return Err(EncodingError::TruncatedData.into()),
        Some((&TAG_STRING, rest)) => rest,
        Some(_) => return Err(EncodingError::InvalidFormat("Not a string type".into()).into()),
    };

    let mut result = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        if encoded[i] != 0x00 {
            result.push(encoded[i]);
            i += 1;
            continue;
        }
        match encoded.get(i + 1) {
            Some(0xFF) => {
                result.push(0x00);
                i += 2;
            }
            Some(0x00) if i + 2 == encoded.len() => return Ok(result),
            Some(0x00) => {
                return Err(
                    EncodingError::InvalidFormat("Trailing bytes after terminator".into()).into(),
                )
            }
            Some(_) => {
                return Err(EncodingError::InvalidFormat("Invalid null byte escape".into()).into())
            }
            None => return Err(EncodingError::TruncatedData.into()),
        }
    }

    Err(EncodingError::TruncatedData.into())
}

impl Key for i64 {
    fn encode(&self) -> Vec<u8> {
        encode_signed(*self)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        decode_signed(bytes)
    }
}

impl Key for i32 {
    fn encode(&self) -> Vec<u8> {
        encode_signed(i64::from(*self))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let wide = decode_signed(bytes)?;
        i32::try_from(wide).map_err(|_| {
            EncodingError::InvalidFormat(format!("{} does not fit in i32", wide)).into()
        })
    }
}

impl Key for u64 {
    fn encode(&self) -> Vec<u8> {
        encode_unsigned(*self)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        decode_unsigned(bytes)
    }
}

impl Key for String {
    fn encode(&self) -> Vec<u8> {
        encode_string(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        decode_string(bytes)
    }
}
