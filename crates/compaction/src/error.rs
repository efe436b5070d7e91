use thiserror::Error;

/// Compaction failures callers may want to tell apart.
///
/// These travel inside `anyhow::Error`; recover them with
/// `err.downcast_ref::<CompactionError>()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompactionError {
    /// The merge saw the cancellation flag and stopped. Inputs are intact.
    #[error("compaction cancelled")]
    Cancelled,

    /// A task input is no longer registered, usually because another
    /// compaction already consumed it.
    #[error("compaction input {0} is not a registered run")]
    MissingRun(String),
}
