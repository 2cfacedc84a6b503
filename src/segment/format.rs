//! On-disk layout of a segment file.
//!
//! ```text
//! +--------------------------------------------------+
//! | magic:8 | version:u32 | leaf_cap:u32 |           |
//! | inner_cap:u32 | reserved:u32 | entry_count:u64   |  header, 32 bytes
//! +--------------------------------------------------+
//! | key_len:u32 | key | value_len:u32 | value        |  entry_count times,
//! | ...                                              |  ascending keys
//! +--------------------------------------------------+
//! | crc32:u32                                        |  over header + entries
//! +--------------------------------------------------+
//! ```
//!
//! All integers are big-endian.

use crate::encoding::{Key, Value};
use crate::error::{Error, Result};
use crate::tree::Tree;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_32_ISCSI};

pub const HEADER_SIZE: usize = 32;
const FOOTER_SIZE: usize = 4;
const MAGIC: &[u8; 8] = b"LIDXSEG\0";
const VERSION: u32 = 1;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub leaf_capacity: u32,
    pub inner_capacity: u32,
    pub entry_count: u64,
}

impl SegmentHeader {
    pub fn new(leaf_capacity: u32, inner_capacity: u32, entry_count: u64) -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            leaf_capacity,
            inner_capacity,
            entry_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != *MAGIC {
            return Err(Error::Corruption("invalid segment magic number".to_string()));
        }
        if self.version != VERSION {
            return Err(Error::Corruption(format!(
                "unsupported segment version: {}",
                self.version
            )));
        }
        if self.leaf_capacity == 0 || self.inner_capacity <= 2 {
            return Err(Error::Corruption(format!(
                "invalid tree capacities {}/{}",
                self.leaf_capacity, self.inner_capacity
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.magic);
        BigEndian::write_u32(&mut buf[8..12], self.version);
        BigEndian::write_u32(&mut buf[12..16], self.leaf_capacity);
        BigEndian::write_u32(&mut buf[16..20], self.inner_capacity);
        // 20..24 reserved
        BigEndian::write_u64(&mut buf[24..32], self.entry_count);
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[0..8]);

        let header = Self {
            magic,
            version: BigEndian::read_u32(&buf[8..12]),
            leaf_capacity: BigEndian::read_u32(&buf[12..16]),
            inner_capacity: BigEndian::read_u32(&buf[16..20]),
            entry_count: BigEndian::read_u64(&buf[24..32]),
        };
        header.validate()?;
        Ok(header)
    }
}

/// Serializes a tree's entries in key order.
pub fn encode<K, V>(tree: &Tree<K, V>) -> Result<Vec<u8>>
where
    K: Key + Ord + Clone,
    V: Value,
{
    let header = SegmentHeader::new(
        to_u32(tree.leaf_capacity(), "leaf capacity")?,
        to_u32(tree.inner_capacity(), "inner capacity")?,
        tree.len() as u64,
    );

    let mut buf = Vec::with_capacity(HEADER_SIZE + tree.len() * 32 + FOOTER_SIZE);
    buf.extend_from_slice(&header.encode());
    for (key, value) in tree.iter() {
        write_chunk(&mut buf, &Key::encode(key))?;
        write_chunk(&mut buf, &Value::encode(value)?)?;
    }

    let checksum = CRC32.checksum(&buf);
    buf.write_u32::<BigEndian>(checksum)?;
    Ok(buf)
}

/// Parses and verifies a segment file, rebuilding its tree.
pub fn decode<K, V>(bytes: &[u8]) -> Result<Tree<K, V>>
where
    K: Key + Ord + Clone,
    V: Value,
{
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(Error::Corruption(format!(
            "segment too short: {} bytes",
            bytes.len()
        )));
    }

    let (content, footer) = bytes.split_at(bytes.len() - FOOTER_SIZE);
    let stored = BigEndian::read_u32(footer);
    let actual = CRC32.checksum(content);
    if stored != actual {
        return Err(Error::Corruption(format!(
            "segment checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored, actual
        )));
    }

    let (head, mut body) = content.split_at(HEADER_SIZE);
    let mut header_buf = [0u8; HEADER_SIZE];
    header_buf.copy_from_slice(head);
    let header = SegmentHeader::decode(&header_buf)?;

    let mut entries: Vec<(K, V)> = Vec::new();
    for i in 0..header.entry_count {
        let key = <K as Key>::decode(read_chunk(&mut body)?)
            .map_err(|e| Error::Corruption(format!("entry {}: bad key: {}", i, e)))?;
        let value = <V as Value>::decode(read_chunk(&mut body)?)
            .map_err(|e| Error::Corruption(format!("entry {}: bad value: {}", i, e)))?;

        if let Some((prev, _)) = entries.last() {
            if *prev >= key {
                return Err(Error::Corruption(format!("entry {}: keys out of order", i)));
            }
        }
        entries.push((key, value));
    }

    if !body.is_empty() {
        return Err(Error::Corruption(format!(
            "{} trailing bytes after {} entries",
            body.len(),
            header.entry_count
        )));
    }

    Tree::bulk_load(
        entries,
        header.leaf_capacity as usize,
        header.inner_capacity as usize,
    )
}

fn to_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::InvalidOperation(format!("{} {} exceeds u32", what, n)))
}

fn write_chunk(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    buf.write_u32::<BigEndian>(to_u32(bytes.len(), "entry length")?)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_chunk<'a>(body: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = body
        .read_u32::<BigEndian>()
        .map_err(|_| Error::Corruption("truncated entry length".to_string()))? as usize;
    if body.len() < len {
        return Err(Error::Corruption(format!(
            "entry of {} bytes exceeds remaining {}",
            len,
            body.len()
        )));
    }
    let (chunk, rest) = body.split_at(len);
    *body = rest;
    Ok(chunk)
}
