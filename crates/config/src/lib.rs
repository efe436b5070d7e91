//! # Config - engine and compaction settings
//!
//! Every tunable of the storage core lives here as plain, immutable data that
//! is handed to the components at construction time. Nothing in the workspace
//! reads process-wide constants for level caps or size targets.
//!
//! ```text
//! EngineConfig
//!   ├── data_dir                      one directory per engine instance
//!   ├── memtable_variant              picked once, boxed behind a trait
//!   ├── max_memtable_size_bytes       flush threshold
//!   ├── enable_background_compaction
//!   ├── compaction_check_interval     periodic background check
//!   └── compaction: CompactionConfig  level caps and byte targets
//! ```
//!
//! ## Environment
//!
//! ```text
//! LSMKV_DATA_DIR               data directory           (default: "lsm_data")
//! LSMKV_MEMTABLE               memtable variant name    (default: "btree")
//! LSMKV_FLUSH_KB               flush threshold in KiB   (default: 1024)
//! LSMKV_BACKGROUND_COMPACTION  "true" / "false"         (default: "true")
//! LSMKV_L0_MAX_RUNS            level-0 run cap          (default: 4)
//! LSMKV_CHECK_INTERVAL_MS      periodic check interval  (default: 5000)
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default memtable flush threshold (1 MiB).
pub const DEFAULT_MAX_MEMTABLE_SIZE: usize = 1024 * 1024;

/// Default byte target for level 1 (10 MiB). Deeper levels grow geometrically.
pub const DEFAULT_BASE_LEVEL_BYTES: u64 = 10 * 1024 * 1024;

/// Errors raised while building or validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The memtable variant name did not match any known implementation.
    #[error("unknown memtable variant '{0}'")]
    UnknownMemtableVariant(String),

    /// A numeric setting was outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    /// An environment variable could not be parsed.
    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

/// Which in-memory index backs the active memtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemtableVariant {
    /// Balanced tree, ordered.
    #[default]
    BTree,
    /// Sorted array with binary-search insert, ordered.
    SortedVec,
    /// Hash map plus insertion-order list, unordered.
    HashLinked,
    /// Arena skip list, ordered.
    SkipList,
    /// Hash map for point lookups plus a sorted key index, ordered.
    HashSkipList,
    /// Character trie, ordered, efficient prefix queries.
    Trie,
    /// Plain append vector with linear lookup, unordered.
    Vector,
}

impl MemtableVariant {
    /// All variants, in declaration order.
    pub const ALL: [MemtableVariant; 7] = [
        MemtableVariant::BTree,
        MemtableVariant::SortedVec,
        MemtableVariant::HashLinked,
        MemtableVariant::SkipList,
        MemtableVariant::HashSkipList,
        MemtableVariant::Trie,
        MemtableVariant::Vector,
    ];

    /// Canonical name, accepted back by [`FromStr`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MemtableVariant::BTree => "btree",
            MemtableVariant::SortedVec => "sorted_array",
            MemtableVariant::HashLinked => "hash_map",
            MemtableVariant::SkipList => "skiplist",
            MemtableVariant::HashSkipList => "hash_skiplist",
            MemtableVariant::Trie => "trie",
            MemtableVariant::Vector => "vector",
        }
    }

    /// Returns `true` if the variant keeps its keys in sorted order and can
    /// answer range and prefix queries directly.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !matches!(self, MemtableVariant::HashLinked | MemtableVariant::Vector)
    }
}

impl fmt::Display for MemtableVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MemtableVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btree" => Ok(MemtableVariant::BTree),
            "sorted_array" | "sorted_vec" => Ok(MemtableVariant::SortedVec),
            "hash_map" | "hash_linked" => Ok(MemtableVariant::HashLinked),
            "skiplist" | "enhanced_skiplist" => Ok(MemtableVariant::SkipList),
            "hash_skiplist" => Ok(MemtableVariant::HashSkipList),
            "trie" | "prefix" => Ok(MemtableVariant::Trie),
            "vector" | "linked_list" => Ok(MemtableVariant::Vector),
            _ => Err(ConfigError::UnknownMemtableVariant(s.to_string())),
        }
    }
}

/// Level caps and byte targets consumed by the compaction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Run-count cap for level 0. Level 0 is governed by count only.
    pub level0_max_runs: usize,
    /// Run-count cap for every level >= 1.
    pub level_max_runs: usize,
    /// Cumulative byte target for level 1.
    pub base_level_bytes: u64,
    /// Growth factor of the byte target from one level to the next.
    pub level_size_multiplier: u64,
    /// Number of levels, including level 0. The last level never compacts
    /// further down.
    pub max_levels: usize,
    /// A level-0 size-tiered merge whose inputs total at least this many
    /// bytes on disk is written at level 1 instead of level 0.
    pub level0_promote_bytes: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            level0_max_runs: 4,
            level_max_runs: 10,
            base_level_bytes: DEFAULT_BASE_LEVEL_BYTES,
            level_size_multiplier: 10,
            max_levels: 7,
            level0_promote_bytes: DEFAULT_BASE_LEVEL_BYTES,
        }
    }
}

impl CompactionConfig {
    /// Byte target for `level`. Level 0 has no byte target (`None`).
    #[must_use]
    pub fn target_bytes(&self, level: usize) -> Option<u64> {
        if level == 0 {
            return None;
        }
        let exp = (level - 1) as u32;
        Some(
            self.base_level_bytes
                .saturating_mul(self.level_size_multiplier.saturating_pow(exp)),
        )
    }

    /// Run-count cap for `level`.
    #[must_use]
    pub fn max_runs(&self, level: usize) -> usize {
        if level == 0 {
            self.level0_max_runs
        } else {
            self.level_max_runs
        }
    }

    /// Checks every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level0_max_runs == 0 {
            return Err(invalid("level0_max_runs", "must be at least 1"));
        }
        if self.level_max_runs == 0 {
            return Err(invalid("level_max_runs", "must be at least 1"));
        }
        if self.base_level_bytes == 0 {
            return Err(invalid("base_level_bytes", "must be positive"));
        }
        if self.level_size_multiplier < 2 {
            return Err(invalid("level_size_multiplier", "must be at least 2"));
        }
        if self.max_levels < 2 {
            return Err(invalid("max_levels", "must be at least 2"));
        }
        Ok(())
    }
}

/// Top-level configuration of one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding every run file of this engine.
    pub data_dir: PathBuf,
    /// Memtable implementation, selected once at open.
    pub memtable_variant: MemtableVariant,
    /// Byte size (keys + values) at which the memtable is flushed.
    pub max_memtable_size_bytes: usize,
    /// Run compaction on a background worker. When off, callers compact
    /// explicitly.
    pub enable_background_compaction: bool,
    /// How often the background worker re-checks the run set on its own.
    pub compaction_check_interval: Duration,
    /// Level layout for the compaction strategy.
    pub compaction: CompactionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("lsm_data"),
            memtable_variant: MemtableVariant::default(),
            max_memtable_size_bytes: DEFAULT_MAX_MEMTABLE_SIZE,
            enable_background_compaction: true,
            compaction_check_interval: Duration::from_secs(5),
            compaction: CompactionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Write-heavy preset: hash skip list, 2 MiB memtable, 2 s checks.
    pub fn high_throughput(data_dir: impl Into<PathBuf>) -> Self {
        Self::builder()
            .data_dir(data_dir)
            .memtable_variant(MemtableVariant::HashSkipList)
            .max_memtable_size_bytes(2 * 1024 * 1024)
            .compaction_check_interval(Duration::from_secs(2))
            .build()
    }

    /// Small-footprint preset: vector memtable, 256 KiB, 10 s checks.
    pub fn memory_efficient(data_dir: impl Into<PathBuf>) -> Self {
        Self::builder()
            .data_dir(data_dir)
            .memtable_variant(MemtableVariant::Vector)
            .max_memtable_size_bytes(256 * 1024)
            .compaction_check_interval(Duration::from_secs(10))
            .build()
    }

    /// Reads the configuration from `LSMKV_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup,
    /// so tests do not have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(dir) = lookup("LSMKV_DATA_DIR") {
            builder = builder.data_dir(dir);
        }
        if let Some(name) = lookup("LSMKV_MEMTABLE") {
            builder = builder.memtable_variant(name.parse()?);
        }
        if let Some(kb) = lookup("LSMKV_FLUSH_KB") {
            let kb: usize = parse_env("LSMKV_FLUSH_KB", &kb)?;
            builder = builder.max_memtable_size_bytes(kb.saturating_mul(1024));
        }
        if let Some(flag) = lookup("LSMKV_BACKGROUND_COMPACTION") {
            builder = builder
                .enable_background_compaction(parse_env("LSMKV_BACKGROUND_COMPACTION", &flag)?);
        }
        if let Some(runs) = lookup("LSMKV_L0_MAX_RUNS") {
            builder = builder.level0_max_runs(parse_env("LSMKV_L0_MAX_RUNS", &runs)?);
        }
        if let Some(ms) = lookup("LSMKV_CHECK_INTERVAL_MS") {
            let ms: u64 = parse_env("LSMKV_CHECK_INTERVAL_MS", &ms)?;
            builder = builder.compaction_check_interval(Duration::from_millis(ms));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Rejects thresholds that would make the engine unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memtable_size_bytes == 0 {
            return Err(invalid("max_memtable_size_bytes", "must be positive"));
        }
        if self.compaction_check_interval.is_zero() {
            return Err(invalid("compaction_check_interval", "must be non-zero"));
        }
        self.compaction.validate()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the data directory.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the memtable variant.
    pub fn memtable_variant(mut self, variant: MemtableVariant) -> Self {
        self.config.memtable_variant = variant;
        self
    }

    /// Set the memtable flush threshold (in bytes).
    pub fn max_memtable_size_bytes(mut self, size: usize) -> Self {
        self.config.max_memtable_size_bytes = size;
        self
    }

    /// Enable or disable the background compaction worker.
    pub fn enable_background_compaction(mut self, enabled: bool) -> Self {
        self.config.enable_background_compaction = enabled;
        self
    }

    /// Set the periodic background check interval.
    pub fn compaction_check_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_check_interval = interval;
        self
    }

    /// Set the level-0 run cap.
    pub fn level0_max_runs(mut self, runs: usize) -> Self {
        self.config.compaction.level0_max_runs = runs;
        self
    }

    /// Replace the whole compaction layout.
    pub fn compaction(mut self, compaction: CompactionConfig) -> Self {
        self.config.compaction = compaction;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
