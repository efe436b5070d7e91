use std::path::{Path, PathBuf};

/// Extension of a finished run file.
pub const RUN_EXTENSION: &str = "dat";
/// Extension of a run that is still being written.
pub const TMP_EXTENSION: &str = "dat.tmp";

/// `run_L<level>_<id>.dat`. Ids are zero-padded so names sort by id.
#[must_use]
pub fn run_file_name(level: usize, id: u64) -> String {
    format!("run_L{}_{:08}.{}", level, id, RUN_EXTENSION)
}

/// Parses `(level, id)` out of a run file name. Accepts a bare name or a
/// path; returns `None` for anything that is not a run file.
#[must_use]
pub fn parse_run_file_name(name: &str) -> Option<(usize, u64)> {
    let name = Path::new(name).file_name()?.to_str()?;
    let stem = name.strip_suffix(".dat")?;
    let rest = stem.strip_prefix("run_L")?;
    let (level, id) = rest.split_once('_')?;
    if level.is_empty() || id.is_empty() {
        return None;
    }
    if !level.bytes().all(|b| b.is_ascii_digit()) || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((level.parse().ok()?, id.parse().ok()?))
}

/// Everything known about a run without reading its data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    /// Unique id taken from the file name.
    pub id: u64,
    pub level: usize,
    pub file_name: String,
    pub path: PathBuf,
    /// Recency stamp; higher means newer data.
    pub created_at: u64,
    pub entry_count: u64,
    /// File length on disk.
    pub size_bytes: u64,
    pub min_key: String,
    pub max_key: String,
}

impl RunMetadata {
    /// `true` if `key` falls inside `[min_key, max_key]`.
    #[must_use]
    pub fn may_contain_key(&self, key: &str) -> bool {
        key >= self.min_key.as_str() && key <= self.max_key.as_str()
    }

    /// `true` if `[min_key, max_key]` intersects `[start, end)`. An empty
    /// `end` is unbounded.
    #[must_use]
    pub fn overlaps(&self, start: &str, end: &str) -> bool {
        self.max_key.as_str() >= start && (end.is_empty() || self.min_key.as_str() < end)
    }
}
