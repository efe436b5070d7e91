//! # Run - immutable sorted file
//!
//! A run is the on-disk form of a flushed memtable or of a compaction
//! output. It is written once, through a temporary file and a rename, and is
//! never modified afterwards; compaction replaces runs, it does not edit them.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA SECTION (records in ascending key order)                 │
//! │                                                               │
//! │ crc32 (u32) | key_len (u32) | key | present (u8)              │
//! │ [val_len (u32) | val]                                         │
//! │                                                               │
//! │ The CRC32 covers everything after itself in the record.       │
//! │ present = 0 marks a tombstone and carries no value.           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM SECTION (serialized BloomFilter)                        │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX SECTION                                                 │
//! │                                                               │
//! │ key_len (u32) | key | data_offset (u64), one per record       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 40 bytes)                                 │
//! │                                                               │
//! │ level (u32) | created_at (u64) | entry_count (u64)            │
//! │ bloom_offset (u64) | index_offset (u64) | magic (u32) "RUN1"  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.
//!
//! ## Naming
//!
//! Runs live flat in the data directory as `run_L<level>_<id>.dat`, where
//! `id` is unique and grows monotonically. The name is parsed once into a
//! [`RunMetadata`] when a run is opened.
//!
//! ## Recency
//!
//! `created_at` orders runs by the age of their data. A flush stamps its
//! own id; a compaction output inherits the newest `created_at` of its
//! inputs. The [`RunRegistry`] always lists runs newest first.

mod format;
mod merge;
mod metadata;
mod reader;
mod registry;
mod writer;

pub use format::{Footer, FOOTER_BYTES, MAX_KEY_BYTES, MAX_VALUE_BYTES, RUN_MAGIC};
pub use merge::{EntrySource, MergeIterator};
pub use metadata::{parse_run_file_name, run_file_name, RunMetadata, RUN_EXTENSION, TMP_EXTENSION};
pub use reader::{RunIter, RunReader};
pub use registry::RunRegistry;
pub use writer::RunWriter;

#[cfg(test)]
mod tests;
