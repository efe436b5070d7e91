//! # lsmkv - interactive shell for the LSM engine
//!
//! Reads commands from stdin, runs them against an [`LsmEngine`] and prints
//! results to stdout. Logs go to stderr, so piping a script through stdin
//! gives clean output.
//!
//! ## Commands
//!
//! ```text
//! PUT key value       Insert or update (SET is an alias)
//! GET key             Look up a key (prints the value or "(nil)")
//! DEL key             Delete a key (writes a tombstone)
//! SCAN [start] [end]  Range scan, start inclusive, end exclusive
//! PREFIX p            Every live key starting with p
//! FLUSH               Write the memtable out as a level-0 run
//! COMPACT             Compact on this thread until nothing is left to do
//! STATS               Memtable, level and worker counters
//! EXIT / QUIT         Flush and shut down
//! ```
//!
//! ## Configuration
//!
//! Every flag falls back to an environment variable, then to a default:
//!
//! ```text
//! --data-dir           LSMKV_DATA_DIR               (default: "lsm_data")
//! --memtable           LSMKV_MEMTABLE               (default: "btree")
//! --flush-kb           LSMKV_FLUSH_KB               (default: 1024)
//! --l0-max-runs        LSMKV_L0_MAX_RUNS            (default: 4)
//! --check-interval-ms  LSMKV_CHECK_INTERVAL_MS      (default: 5000)
//! --background         LSMKV_BACKGROUND_COMPACTION  (default: true)
//! ```
//!
//! Log verbosity comes from `RUST_LOG` (default `warn`).
//!
//! ## Example
//!
//! ```text
//! $ lsmkv --data-dir /tmp/db
//! lsmkv started (dir=/tmp/db, memtable=btree, flush=1024KiB, runs=0, background=true)
//! > PUT user:alice Alice Johnson
//! OK
//! > GET user:alice
//! Alice Johnson
//! > EXIT
//! bye
//! ```

mod repl;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use config::{CompactionConfig, EngineConfig, MemtableVariant};
use engine::LsmEngine;
use tracing_subscriber::{fmt, EnvFilter};

/// Interactive shell for the LSM key-value engine
#[derive(Parser, Debug)]
#[command(name = "lsmkv")]
#[command(about = "Interactive shell for the LSM key-value engine")]
#[command(version)]
struct Args {
    /// Directory holding the run files
    #[arg(short, long, env = "LSMKV_DATA_DIR", default_value = "lsm_data")]
    data_dir: PathBuf,

    /// Memtable implementation (btree, sorted_vec, hash_linked, skiplist,
    /// hash_skiplist, trie, vector)
    #[arg(short, long, env = "LSMKV_MEMTABLE", default_value = "btree")]
    memtable: MemtableVariant,

    /// Memtable flush threshold in KiB
    #[arg(short, long, env = "LSMKV_FLUSH_KB", default_value_t = 1024)]
    flush_kb: usize,

    /// Level-0 run count that triggers compaction
    #[arg(long, env = "LSMKV_L0_MAX_RUNS", default_value_t = 4)]
    l0_max_runs: usize,

    /// How often the background worker re-checks the runs, in milliseconds
    #[arg(long, env = "LSMKV_CHECK_INTERVAL_MS", default_value_t = 5000)]
    check_interval_ms: u64,

    /// Compact on a background thread (otherwise only on COMPACT)
    #[arg(long, env = "LSMKV_BACKGROUND_COMPACTION", default_value_t = true, action = ArgAction::Set)]
    background: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig::builder()
            .data_dir(self.data_dir.clone())
            .memtable_variant(self.memtable)
            .max_memtable_size_bytes(self.flush_kb.saturating_mul(1024))
            .enable_background_compaction(self.background)
            .compaction_check_interval(Duration::from_millis(self.check_interval_ms))
            .compaction(CompactionConfig {
                level0_max_runs: self.l0_max_runs,
                ..CompactionConfig::default()
            })
            .build()
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let args = Args::parse();
    let mut engine = LsmEngine::open(args.engine_config())?;

    println!(
        "lsmkv started (dir={}, memtable={}, flush={}KiB, runs={}, background={})",
        args.data_dir.display(),
        args.memtable,
        args.flush_kb,
        engine.run_count(),
        args.background
    );
    println!("Commands: PUT key value | GET key | DEL key | SCAN [start] [end] | PREFIX p");
    println!("          FLUSH | COMPACT | STATS | EXIT");

    let stdin = io::stdin();
    let stdout = io::stdout();
    repl::run(&mut engine, stdin.lock(), stdout.lock())?;
    io::stdout().flush()?;

    engine.close()
}
