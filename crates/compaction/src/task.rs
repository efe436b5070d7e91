use std::fmt;

/// How a task merges its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompactionKind {
    /// Merge a whole level into the next one.
    Level,
    /// Merge every run of one level into a single bigger run.
    Size,
}

impl CompactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompactionKind::Level => "level",
            CompactionKind::Size => "size",
        }
    }
}

impl fmt::Display for CompactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionTask {
    /// Level the inputs live on.
    pub level: usize,
    /// Input run file names, newest first.
    pub input_files: Vec<String>,
    /// Output run file names. Empty until the task has been executed.
    pub output_files: Vec<String>,
    pub strategy: CompactionKind,
    /// Higher wins when several levels qualify.
    pub priority: usize,
}

impl fmt::Display for CompactionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compaction of {} run(s) at level {} (priority {})",
            self.strategy,
            self.input_files.len(),
            self.level,
            self.priority
        )?;
        if !self.output_files.is_empty() {
            write!(f, " -> {}", self.output_files.join(", "))?;
        }
        Ok(())
    }
}
