//! # Bloom Filter
//!
//! Probabilistic membership test embedded in every run file. A negative
//! answer is exact, a positive answer may be a false positive.
//!
//! ## Usage
//!
//! During a point lookup the run checks its min/max bounds, then the bloom
//! filter, and only then touches its index and the data section. On a
//! miss-heavy workload most runs are skipped without any disk read.
//!
//! ## Hashing
//!
//! One 128-bit xxh3 hash per key, split into two 64-bit halves `h1`, `h2`.
//! Probe `i` sets bit `(h1 + i * h2) mod num_bits` (Kirsch-Mitzenmacher
//! double hashing), so `k` probes cost a single hash.
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01);
//! bf.insert(b"user:alice");
//! assert!(bf.may_contain(b"user:alice"));
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use xxhash_rust::xxh3::xxh3_128;

/// Serialized filters larger than this are treated as corruption.
const MAX_BLOOM_WORDS: usize = 16 * 1024 * 1024;

/// Bit vector packed into `u64` words plus the probe count.
pub struct BloomFilter {
    words: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Sizes a filter for `expected_items` keys at `false_positive_rate`.
    ///
    /// `bits_per_key = -1.44 * log2(p)` and `k = bits_per_key * ln 2`, so a
    /// 1% rate costs about 10 bits and 7 probes per key.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let bits_per_key = -1.44 * false_positive_rate.log2();
        let num_bits = ((expected_items as f64) * bits_per_key).ceil() as u64;
        let num_bits = num_bits.max(64);
        let num_hashes = ((bits_per_key * std::f64::consts::LN_2).ceil() as u32).clamp(1, 30);

        let num_words = num_bits.div_ceil(64) as usize;
        Self {
            words: vec![0u64; num_words],
            num_bits,
            num_hashes,
        }
    }

    /// Adds a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = split_hash(key);
        for i in 0..self.num_hashes {
            let bit = self.probe(h1, h2, i);
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// `false` means the key was never inserted.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = split_hash(key);
        (0..self.num_hashes).all(|i| {
            let bit = self.probe(h1, h2, i);
            self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0
        })
    }

    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Encoded length: `num_bits(u64) + num_hashes(u32) + word_count(u32) + words`.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 4 + 4 + self.words.len() * 8
    }

    /// Writes the filter, all integers little-endian:
    ///
    /// ```text
    /// [num_bits: u64][num_hashes: u32][word_count: u32][words: u64 * word_count]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.num_bits)?;
        w.write_u32::<LittleEndian>(self.num_hashes)?;
        w.write_u32::<LittleEndian>(self.words.len() as u32)?;
        for word in &self.words {
            w.write_u64::<LittleEndian>(*word)?;
        }
        Ok(())
    }

    /// Reads a filter written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let num_bits = r.read_u64::<LittleEndian>()?;
        let num_hashes = r.read_u32::<LittleEndian>()?;
        let word_count = r.read_u32::<LittleEndian>()? as usize;

        if word_count > MAX_BLOOM_WORDS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} words", word_count),
            ));
        }
        if num_bits == 0 || num_bits > (word_count as u64) * 64 || num_hashes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter header is inconsistent",
            ));
        }

        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(r.read_u64::<LittleEndian>()?);
        }

        Ok(Self {
            words,
            num_bits,
            num_hashes,
        })
    }

    fn probe(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("bytes", &(self.words.len() * 8))
            .finish()
    }
}

fn split_hash(key: &[u8]) -> (u64, u64) {
    let h = xxh3_128(key);
    // An even h2 would only ever reach half the bit positions.
    ((h >> 64) as u64, (h as u64) | 1)
}
