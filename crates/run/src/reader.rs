use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};
use memtable::Entry;
use parking_lot::Mutex;

use crate::format::{read_record, Footer, FOOTER_BYTES, MAX_KEY_BYTES};
use crate::metadata::{parse_run_file_name, RunMetadata};

/// `key_len` plus `data_offset`, for an empty key.
const INDEX_ENTRY_MIN_BYTES: u64 = 4 + 8;

/// An open run.
///
/// [`open`](RunReader::open) loads the footer, the bloom filter and the
/// whole index (key to data offset) into memory. Data records stay on disk
/// and are read through one persistent handle, locked per read, so `get`
/// and [`RunIter`] work through `&self`.
///
/// The handle stays valid after the file is unlinked, which lets readers
/// that took a registry snapshot finish even if compaction retires the run.
pub struct RunReader {
    meta: RunMetadata,
    index: Vec<(String, u64)>,
    bloom: BloomFilter,
    file: Mutex<BufReader<File>>,
}

impl RunReader {
    /// Opens a run file. The file name must follow
    /// [`run_file_name`](crate::run_file_name); the footer must be intact.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no file name", path.display()))?;
        let (name_level, id) = parse_run_file_name(&file_name)
            .with_context(|| format!("{} is not a run file name", file_name))?;

        let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let filesize = f.metadata()?.len();
        let footer = Footer::read_from(&mut f)
            .with_context(|| format!("reading footer of {}", file_name))?;
        if footer.level as usize != name_level {
            bail!(
                "{}: footer says level {}, file name says level {}",
                file_name,
                footer.level,
                name_level
            );
        }

        f.seek(SeekFrom::Start(footer.bloom_offset))?;
        let bloom = BloomFilter::read_from(&mut f)?;

        f.seek(SeekFrom::Start(footer.index_offset))?;
        let index_end = filesize - FOOTER_BYTES;
        let max_entries = (index_end - footer.index_offset) / INDEX_ENTRY_MIN_BYTES;
        if footer.entry_count > max_entries {
            bail!(
                "{}: footer claims {} entries, index section fits at most {}",
                file_name,
                footer.entry_count,
                max_entries
            );
        }
        let mut index = Vec::with_capacity(footer.entry_count as usize);
        {
            let mut r = BufReader::new(&mut f);
            let mut pos = footer.index_offset;
            while pos < index_end {
                let key_len = r.read_u32::<LittleEndian>()? as usize;
                if key_len > MAX_KEY_BYTES {
                    bail!("corrupt index: key_len {} exceeds maximum {}", key_len, MAX_KEY_BYTES);
                }
                let mut key = vec![0u8; key_len];
                r.read_exact(&mut key)?;
                let data_offset = r.read_u64::<LittleEndian>()?;
                pos += 4 + key_len as u64 + 8;
                index.push((String::from_utf8(key)?, data_offset));
            }
        }
        if index.len() as u64 != footer.entry_count || index.is_empty() {
            bail!(
                "{}: index holds {} entries, footer says {}",
                file_name,
                index.len(),
                footer.entry_count
            );
        }

        let meta = RunMetadata {
            id,
            level: name_level,
            file_name,
            path: path.to_path_buf(),
            created_at: footer.created_at,
            entry_count: footer.entry_count,
            size_bytes: filesize,
            min_key: index[0].0.clone(),
            max_key: index[index.len() - 1].0.clone(),
        };

        Ok(Self {
            meta,
            index,
            bloom,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Point lookup. `Ok(Some(Entry::Tombstone))` means the run records a
    /// delete; `Ok(None)` means the key is not in this run.
    ///
    /// The min/max bounds and the bloom filter are consulted before any
    /// disk access.
    pub fn get(&self, key: &str) -> Result<Option<Entry>> {
        if !self.meta.may_contain_key(key) || !self.bloom.may_contain(key.as_bytes()) {
            return Ok(None);
        }
        let pos = match self.index.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            Ok(pos) => pos,
            Err(_) => return Ok(None),
        };
        let (stored_key, entry) = self.read_at(pos)?;
        if stored_key != key {
            bail!(
                "{}: index pointed to key {:?} while looking up {:?}",
                self.meta.file_name,
                stored_key,
                key
            );
        }
        Ok(Some(entry))
    }

    /// Reads the record for index slot `pos`.
    fn read_at(&self, pos: usize) -> Result<(String, Entry)> {
        let offset = self.index[pos].1;
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        read_record(&mut *f).with_context(|| format!("{} at offset {}", self.meta.file_name, offset))
    }

    /// Every entry in ascending key order. Each call starts from the
    /// beginning.
    #[must_use]
    pub fn iter(&self) -> RunIter<'_> {
        RunIter {
            reader: self,
            pos: 0,
            end: self.index.len(),
        }
    }

    /// Entries with `start <= key < end`; an empty `end` is unbounded.
    #[must_use]
    pub fn range(&self, start: &str, end: &str) -> RunIter<'_> {
        let from = self.index.partition_point(|(k, _)| k.as_str() < start);
        let to = if end.is_empty() {
            self.index.len()
        } else {
            self.index.partition_point(|(k, _)| k.as_str() < end).max(from)
        };
        RunIter {
            reader: self,
            pos: from,
            end: to,
        }
    }

    /// Materializes every entry.
    pub fn read_all(&self) -> Result<Vec<(String, Entry)>> {
        self.iter().collect()
    }

    #[must_use]
    pub fn metadata(&self) -> &RunMetadata {
        &self.meta
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    #[must_use]
    pub fn level(&self) -> usize {
        self.meta.level
    }

    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.meta.created_at
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.meta.file_name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.meta.size_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Always `false` for an opened run; the writer never produces empty
    /// files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keys in ascending order, straight from the in-memory index.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(|(k, _)| k.as_str())
    }
}

impl std::fmt::Debug for RunReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReader")
            .field("file_name", &self.meta.file_name)
            .field("level", &self.meta.level)
            .field("created_at", &self.meta.created_at)
            .field("entries", &self.index.len())
            .finish()
    }
}

/// Lazy cursor over a run's records.
///
/// Reads one record per `next`, seeking the shared handle each time, so
/// several iterators over the same run can be interleaved.
pub struct RunIter<'a> {
    reader: &'a RunReader,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for RunIter<'a> {
    type Item = Result<(String, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let item = self.reader.read_at(self.pos);
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.pos;
        (left, Some(left))
    }
}
