//! # Compaction
//!
//! Decides when runs should be merged and performs the merge, either on the
//! caller's thread or on a background worker.
//!
//! - [`CompactionStrategy`] looks at how many runs, and how many bytes, each
//!   level holds and plans at most one [`CompactionTask`] at a time. It also
//!   executes tasks against a [`run::RunRegistry`].
//! - [`CompactionWorker`] owns a single background thread that executes
//!   submitted jobs and wakes up periodically to check on its own.
//!
//! ## Policy
//!
//! Level 0 is governed by run count alone: its runs overlap, so bytes say
//! little about read cost. Once `level0_max_runs` is reached every level-0
//! run is merged (a *size-tiered* merge). The output stays at level 0
//! unless the inputs add up to `level0_promote_bytes`, in which case it is
//! written to level 1.
//!
//! Levels 1 and deeper have a byte target that grows by
//! `level_size_multiplier` per level. A level is planned for a *level*
//! merge into the next level once it reaches its byte target, or when its
//! run count gets within one of `level_max_runs`. The deepest level merges
//! into itself.
//!
//! The candidate with the most runs wins; ties go to the shallower level.

mod error;
mod strategy;
mod task;
mod worker;

pub use error::CompactionError;
pub use strategy::{CompactionStrategy, LevelSummary, CANCEL_CHECK_INTERVAL};
pub use task::{CompactionKind, CompactionTask};
pub use worker::{CompactionWorker, WorkerStatus};

#[cfg(test)]
mod tests;
