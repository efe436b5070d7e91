use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use memtable::Entry;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::metadata::{parse_run_file_name, run_file_name};
use crate::{RunReader, RunWriter};

/// The set of live runs in one data directory.
///
/// Runs are kept newest first (`created_at` descending, ties broken by the
/// higher id). Readers take a [`snapshot`](RunRegistry::snapshot), a cheap
/// clone of `Arc`s, and never see a half-applied compaction: outputs are
/// added and inputs removed under one write lock in
/// [`replace`](RunRegistry::replace).
pub struct RunRegistry {
    data_dir: PathBuf,
    runs: RwLock<Vec<Arc<RunReader>>>,
    next_id: AtomicU64,
}

impl RunRegistry {
    /// Opens (creating if needed) `data_dir` and registers every run found
    /// there. Leftover `*.dat.tmp` files from interrupted writes are deleted.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let mut runs = Vec::new();
        let mut max_id = 0u64;
        for dirent in fs::read_dir(&data_dir)? {
            let path = dirent?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".dat.tmp") {
                warn!(file = name, "removing unfinished run");
                let _ = fs::remove_file(&path);
                continue;
            }
            let Some((_, id)) = parse_run_file_name(name) else {
                continue;
            };
            let reader = RunReader::open(&path).with_context(|| format!("opening run {}", name))?;
            max_id = max_id.max(id);
            runs.push(Arc::new(reader));
        }
        sort_newest_first(&mut runs);

        info!(
            dir = %data_dir.display(),
            runs = runs.len(),
            next_id = max_id + 1,
            "run registry opened"
        );

        Ok(Self {
            data_dir,
            runs: RwLock::new(runs),
            next_id: AtomicU64::new(max_id + 1),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reserves a fresh run id.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Writes `entries` as a new, unregistered run. The run gets a fresh id;
    /// `created_at` defaults to that id. Returns `None` when `entries` is
    /// empty.
    pub fn build_run<I>(
        &self,
        level: usize,
        created_at: Option<u64>,
        expected_count: usize,
        entries: I,
    ) -> Result<Option<Arc<RunReader>>>
    where
        I: IntoIterator<Item = Result<(String, Entry)>>,
    {
        let id = self.allocate_id();
        let path = self.data_dir.join(run_file_name(level, id));
        let created_at = created_at.unwrap_or(id);

        let written = RunWriter::write(&path, level, created_at, expected_count, entries)?;
        if written == 0 {
            return Ok(None);
        }
        let reader = RunReader::open(&path)?;
        debug!(
            file = reader.file_name(),
            level,
            created_at,
            entries = written,
            bytes = reader.size_bytes(),
            "run written"
        );
        Ok(Some(Arc::new(reader)))
    }

    /// Writes a sorted memtable snapshot as a new level-0 run and registers
    /// it. Nothing is registered if the write fails.
    pub fn flush(&self, entries: Vec<(String, Entry)>) -> Result<Arc<RunReader>> {
        if entries.is_empty() {
            bail!("refusing to write an empty run");
        }
        let count = entries.len();
        let run = self
            .build_run(0, None, count, entries.into_iter().map(Ok))?
            .context("flush produced no run")?;
        self.add(Arc::clone(&run));
        Ok(run)
    }

    pub fn add(&self, run: Arc<RunReader>) {
        let mut runs = self.runs.write();
        runs.push(run);
        sort_newest_first(&mut runs);
    }

    /// Atomically swaps `inputs` (by file name) for `outputs`, then deletes
    /// the input files. Fails without changing anything if any input is no
    /// longer registered.
    pub fn replace(&self, inputs: &[String], outputs: Vec<Arc<RunReader>>) -> Result<()> {
        let removed: Vec<Arc<RunReader>> = {
            let mut runs = self.runs.write();
            let wanted: HashSet<&str> = inputs.iter().map(String::as_str).collect();
            let present = runs.iter().filter(|r| wanted.contains(r.file_name())).count();
            if present != wanted.len() {
                bail!(
                    "only {} of {} compaction inputs are still registered",
                    present,
                    wanted.len()
                );
            }
            let (gone, kept): (Vec<_>, Vec<_>) = runs
                .drain(..)
                .partition(|r| wanted.contains(r.file_name()));
            *runs = kept;
            runs.extend(outputs);
            sort_newest_first(&mut runs);
            gone
        };

        for run in &removed {
            if let Err(e) = fs::remove_file(run.path()) {
                warn!(file = run.file_name(), error = %e, "could not delete retired run");
            }
        }
        Ok(())
    }

    /// Newest-first copy of the current run list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<RunReader>> {
        self.runs.read().clone()
    }

    /// Looks up runs by file name, in newest-first order. Returns the first
    /// name that is not registered as the error.
    pub fn resolve(&self, names: &[String]) -> std::result::Result<Vec<Arc<RunReader>>, String> {
        let runs = self.runs.read();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            match runs.iter().find(|r| r.file_name() == name) {
                Some(run) => out.push(Arc::clone(run)),
                None => return Err(name.clone()),
            }
        }
        sort_newest_first(&mut out);
        Ok(out)
    }

    /// File names of every registered run, newest first.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.runs
            .read()
            .iter()
            .map(|r| r.file_name().to_string())
            .collect()
    }

    /// Newest entry for `key` across all runs. Takes a snapshot first.
    pub fn get(&self, key: &str) -> Result<Option<Entry>> {
        for run in self.snapshot() {
            if let Some(entry) = run.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }

    /// Sum of run file sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.runs.read().iter().map(|r| r.size_bytes()).sum()
    }
}

impl std::fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRegistry")
            .field("data_dir", &self.data_dir)
            .field("runs", &self.len())
            .finish()
    }
}

fn sort_newest_first(runs: &mut [Arc<RunReader>]) {
    runs.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

