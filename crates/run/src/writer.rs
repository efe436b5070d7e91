use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::Entry;

use crate::format::{checksum, encode_record_body, Footer};
use crate::metadata::TMP_EXTENSION;

/// Bloom filter false positive rate for every run.
const BLOOM_FPR: f64 = 0.01;

/// Writes run files.
///
/// All work happens in [`write`](RunWriter::write). Data goes to
/// `<name>.dat.tmp` first, is fsynced, then renamed over the final path, so
/// a reader either sees the whole run or no run at all.
pub struct RunWriter;

impl RunWriter {
    /// Writes `entries` (strictly ascending keys) to `path`.
    ///
    /// `expected_count` sizes the bloom filter; over-estimating is safe.
    /// Returns the number of records written. When `entries` turns out to
    /// be empty no file is created and `Ok(0)` is returned.
    ///
    /// # Errors
    ///
    /// Fails on any I/O error, on an error yielded by `entries`, or if the
    /// keys are not strictly ascending. The temporary file is removed in
    /// every failure case.
    pub fn write<I>(
        path: &Path,
        level: usize,
        created_at: u64,
        expected_count: usize,
        entries: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<(String, Entry)>>,
    {
        let tmp_path = path.with_extension(TMP_EXTENSION);
        let result = Self::write_tmp(&tmp_path, level, created_at, expected_count, entries);
        match result {
            Ok(0) => {
                let _ = fs::remove_file(&tmp_path);
                Ok(0)
            }
            Ok(count) => {
                fs::rename(&tmp_path, path).with_context(|| {
                    format!("renaming {} into place", tmp_path.display())
                })?;
                sync_parent_dir(path);
                Ok(count)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn write_tmp<I>(
        tmp_path: &Path,
        level: usize,
        created_at: u64,
        expected_count: usize,
        entries: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Result<(String, Entry)>>,
    {
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut file = BufWriter::new(raw_file);

        let mut bloom = BloomFilter::new(expected_count.max(1), BLOOM_FPR);
        let mut index: Vec<(String, u64)> = Vec::with_capacity(expected_count);
        let mut record_buf: Vec<u8> = Vec::with_capacity(256);

        for item in entries {
            let (key, entry) = item?;
            if let Some((prev, _)) = index.last() {
                if key.as_str() <= prev.as_str() {
                    bail!("run keys out of order: {:?} after {:?}", key, prev);
                }
            }

            encode_record_body(&mut record_buf, &key, &entry)?;
            let offset = file.stream_position()?;
            file.write_u32::<LittleEndian>(checksum(&record_buf))?;
            file.write_all(&record_buf)?;

            bloom.insert(key.as_bytes());
            index.push((key, offset));
        }

        if index.is_empty() {
            return Ok(0);
        }

        let bloom_offset = file.stream_position()?;
        bloom.write_to(&mut file)?;

        let index_offset = file.stream_position()?;
        for (key, data_offset) in &index {
            file.write_u32::<LittleEndian>(key.len() as u32)?;
            file.write_all(key.as_bytes())?;
            file.write_u64::<LittleEndian>(*data_offset)?;
        }

        Footer {
            level: level as u32,
            created_at,
            entry_count: index.len() as u64,
            bloom_offset,
            index_offset,
        }
        .write_to(&mut file)?;

        file.flush()?;
        file.into_inner()?.sync_all()?;
        Ok(index.len())
    }
}

/// Makes the rename durable on filesystems that journal directory entries
/// separately. Best effort.
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
