//! Run binary format: footer and data records.
//!
//! ## Footer (40 bytes)
//!
//! ```text
//! [level: u32][created_at: u64][entry_count: u64][bloom_offset: u64][index_offset: u64][magic: u32]
//! ```
//!
//! ## Record
//!
//! ```text
//! [crc32: u32][key_len: u32][key][present: u8][val_len: u32][val]
//! ```
//!
//! `val_len` and `val` are omitted when `present == 0`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::Entry;

/// Magic number identifying run files (ASCII "RUN1").
pub const RUN_MAGIC: u32 = 0x5255_4E31;

/// Footer size: 4 (`level`) + 8 (`created_at`) + 8 (`entry_count`)
/// + 8 (`bloom_offset`) + 8 (`index_offset`) + 4 (`magic`).
pub const FOOTER_BYTES: u64 = 4 + 8 + 8 + 8 + 8 + 4;

/// Upper bound on a key we are willing to allocate for while reading.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Upper bound on a value we are willing to allocate for while reading.
pub const MAX_VALUE_BYTES: usize = 16 * 1024 * 1024;

/// Parsed run footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub level: u32,
    pub created_at: u64,
    pub entry_count: u64,
    pub bloom_offset: u64,
    pub index_offset: u64,
}

impl Footer {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.level)?;
        w.write_u64::<LittleEndian>(self.created_at)?;
        w.write_u64::<LittleEndian>(self.entry_count)?;
        w.write_u64::<LittleEndian>(self.bloom_offset)?;
        w.write_u64::<LittleEndian>(self.index_offset)?;
        w.write_u32::<LittleEndian>(RUN_MAGIC)?;
        Ok(())
    }

    /// Reads the footer from the end of `r` and checks its offsets against
    /// the file size.
    pub fn read_from<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let filesize = r.seek(SeekFrom::End(0))?;
        if filesize < FOOTER_BYTES {
            bail!("file too small for a run footer ({} bytes)", filesize);
        }

        r.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
        let footer = Footer {
            level: r.read_u32::<LittleEndian>()?,
            created_at: r.read_u64::<LittleEndian>()?,
            entry_count: r.read_u64::<LittleEndian>()?,
            bloom_offset: r.read_u64::<LittleEndian>()?,
            index_offset: r.read_u64::<LittleEndian>()?,
        };
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != RUN_MAGIC {
            bail!("unknown run magic: {:#x}", magic);
        }

        let footer_start = filesize - FOOTER_BYTES;
        if footer.bloom_offset > footer.index_offset || footer.index_offset > footer_start {
            bail!(
                "corrupt footer: bloom_offset {} index_offset {} footer_start {}",
                footer.bloom_offset,
                footer.index_offset,
                footer_start
            );
        }
        Ok(footer)
    }
}

/// Encodes the checksummed part of a record into `buf` (cleared first).
pub(crate) fn encode_record_body(buf: &mut Vec<u8>, key: &str, entry: &Entry) -> io::Result<()> {
    buf.clear();
    buf.write_u32::<LittleEndian>(key.len() as u32)?;
    buf.extend_from_slice(key.as_bytes());
    match entry {
        Entry::Value(v) => {
            buf.write_u8(1)?;
            buf.write_u32::<LittleEndian>(v.len() as u32)?;
            buf.extend_from_slice(v.as_bytes());
        }
        Entry::Tombstone => buf.write_u8(0)?,
    }
    Ok(())
}

pub(crate) fn checksum(body: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(body);
    hasher.finalize()
}

/// Reads one record at the reader's current position and verifies its CRC.
pub(crate) fn read_record<R: Read>(r: &mut R) -> Result<(String, Entry)> {
    let stored_crc = r.read_u32::<LittleEndian>()?;

    let key_len = r.read_u32::<LittleEndian>()? as usize;
    if key_len > MAX_KEY_BYTES {
        bail!("corrupt data: key_len {} exceeds maximum {}", key_len, MAX_KEY_BYTES);
    }
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;

    let present = r.read_u8()?;
    let value = match present {
        0 => None,
        1 => {
            let val_len = r.read_u32::<LittleEndian>()? as usize;
            if val_len > MAX_VALUE_BYTES {
                bail!("corrupt data: val_len {} exceeds maximum {}", val_len, MAX_VALUE_BYTES);
            }
            let mut val = vec![0u8; val_len];
            r.read_exact(&mut val)?;
            Some(val)
        }
        other => bail!("corrupt data: present flag {}", other),
    };

    let mut hasher = Crc32::new();
    hasher.update(&(key_len as u32).to_le_bytes());
    hasher.update(&key);
    hasher.update(&[present]);
    if let Some(v) = &value {
        hasher.update(&(v.len() as u32).to_le_bytes());
        hasher.update(v);
    }
    let actual_crc = hasher.finalize();
    if actual_crc != stored_crc {
        bail!(
            "CRC32 mismatch: expected {:#010x}, got {:#010x} (data corruption)",
            stored_crc,
            actual_crc
        );
    }

    let key = String::from_utf8(key)?;
    let entry = match value {
        Some(v) => Entry::Value(String::from_utf8(v)?),
        None => Entry::Tombstone,
    };
    Ok((key, entry))
}
