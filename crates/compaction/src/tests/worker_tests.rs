use std::time::Duration;

use anyhow::Result;

use super::*;
use crate::*;

const LONG: Duration = Duration::from_secs(3600);

fn worker(fx: &Fixture, interval: Duration) -> CompactionWorker {
    CompactionWorker::new(Arc::clone(&fx.strategy), interval)
}

fn four_runs(registry: &RunRegistry) -> Result<()> {
    flush(registry, &[("k", Some("1")), ("a", Some("a"))])?;
    flush(registry, &[("k", Some("2")), ("b", None)])?;
    flush(registry, &[("k", Some("3")), ("b", Some("b"))])?;
    flush(registry, &[("k", Some("4")), ("c", Some("c"))])?;
    Ok(())
}

// -------------------- lifecycle --------------------

#[test]
fn start_and_stop_are_idempotent() -> Result<()> {
    let fx = fixture(test_config())?;
    let w = worker(&fx, LONG);
    assert!(!w.is_running());

    w.start()?;
    w.start()?;
    assert!(w.is_running());
    assert!(w.status().running);

    w.stop();
    w.stop();
    assert!(!w.is_running());

    w.start()?;
    assert!(w.is_running());
    Ok(())
}

#[test]
fn stop_without_start_is_harmless() -> Result<()> {
    let fx = fixture(test_config())?;
    let w = worker(&fx, LONG);
    w.stop();
    w.abort();
    assert!(!w.is_running());
    Ok(())
}

#[test]
fn submit_to_stopped_worker_is_a_no_op() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, LONG);

    assert!(!w.submit(fx.registry.file_names()));
    assert_eq!(fx.registry.len(), 4);
    assert_eq!(w.status().submitted, 0);
    Ok(())
}

#[test]
fn abort_stops_and_resets_cancellation() -> Result<()> {
    let fx = fixture(test_config())?;
    let w = worker(&fx, LONG);
    w.start()?;
    w.abort();
    assert!(!w.is_running());
    assert!(!fx.strategy.is_cancel_requested());
    Ok(())
}

// -------------------- planning helpers --------------------

#[test]
fn check_uses_level_tags_from_names() -> Result<()> {
    let fx = fixture(test_config())?;
    let w = worker(&fx, LONG);
    let names: Vec<String> = (1..=5).map(|id| run::run_file_name(0, id)).collect();
    assert!(w.check_compaction_needed(&names));
    assert!(!w.check_compaction_needed(&names[..3]));

    let deep: Vec<String> = (1..=5).map(|id| run::run_file_name(2, id)).collect();
    assert!(!w.check_compaction_needed(&deep));
    Ok(())
}

#[test]
fn plan_describes_the_pending_task() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    flush(&fx.registry, &[("z", Some("z"))])?;
    let w = worker(&fx, LONG);

    let task = w.get_compaction_plan(&fx.registry.file_names()).expect("a plan");
    assert_eq!(task.strategy, CompactionKind::Size);
    assert_eq!(task.level, 0);
    assert_eq!(task.to_string(), "size compaction of 5 run(s) at level 0 (priority 5)");

    let few = fx.registry.file_names()[..2].to_vec();
    assert!(w.get_compaction_plan(&few).is_none());
    Ok(())
}

// -------------------- execution --------------------

#[test]
fn sync_execution_merges_and_records_status() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, LONG);

    let outputs = w.execute_compaction_sync(&fx.registry.file_names())?;
    assert_eq!(outputs, fx.registry.file_names());
    assert_eq!(fx.registry.get("k")?, Some(val("4")));
    assert_eq!(fx.registry.get("b")?, Some(val("b")));

    let status = w.status();
    assert_eq!(status.completed, 1);
    let last = status.last_task.expect("last task");
    assert_eq!(last.output_files, outputs);
    assert_eq!(last.input_files.len(), 4);
    Ok(())
}

#[test]
fn sync_execution_below_threshold_does_nothing() -> Result<()> {
    let fx = fixture(test_config())?;
    flush(&fx.registry, &[("a", Some("1"))])?;
    let w = worker(&fx, LONG);
    assert!(w.execute_compaction_sync(&fx.registry.file_names())?.is_empty());
    assert_eq!(fx.registry.len(), 1);
    assert_eq!(w.status().completed, 0);
    Ok(())
}

#[test]
fn unregistered_names_are_ignored() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, LONG);

    let mut names = fx.registry.file_names();
    names.truncate(3);
    names.push(run::run_file_name(0, 999));
    assert!(w.execute_compaction_sync(&names)?.is_empty());
    assert_eq!(fx.registry.len(), 4);
    Ok(())
}

#[test]
fn submitted_job_runs_in_background() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, LONG);
    w.start()?;

    assert!(w.submit(fx.registry.file_names()));
    assert!(wait_until(Duration::from_secs(10), || w.status().completed == 1));
    assert_eq!(fx.registry.len(), 1);
    assert_eq!(fx.registry.get("k")?, Some(val("4")));
    assert_eq!(w.status().submitted, 1);
    w.stop();
    Ok(())
}

#[test]
fn background_and_sync_paths_agree() -> Result<()> {
    let sync_fx = fixture(test_config())?;
    let bg_fx = fixture(test_config())?;
    four_runs(&sync_fx.registry)?;
    four_runs(&bg_fx.registry)?;

    let sync_worker = worker(&sync_fx, LONG);
    let sync_out = sync_worker.execute_compaction_sync(&sync_fx.registry.file_names())?;

    let bg_worker = worker(&bg_fx, LONG);
    bg_worker.start()?;
    bg_worker.submit(bg_fx.registry.file_names());
    assert!(wait_until(Duration::from_secs(10), || bg_worker.status().completed == 1));
    bg_worker.stop();
    let bg_out = bg_worker.status().last_task.expect("task").output_files;

    assert_eq!(sync_out.len(), bg_out.len());
    assert_eq!(contents(&sync_fx.registry)?, contents(&bg_fx.registry)?);
    let levels = |fx: &Fixture| -> Vec<usize> {
        fx.registry.snapshot().iter().map(|r| r.level()).collect()
    };
    assert_eq!(levels(&sync_fx), levels(&bg_fx));
    Ok(())
}

#[test]
fn periodic_check_compacts_without_submit() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, Duration::from_millis(20));
    w.start()?;

    assert!(wait_until(Duration::from_secs(10), || {
        fx.strategy.reorganization_count() == 1
    }));
    assert_eq!(fx.registry.len(), 1);
    w.stop();
    Ok(())
}

#[test]
fn failed_job_is_recorded_and_inputs_survive() -> Result<()> {
    let fx = fixture(test_config())?;
    four_runs(&fx.registry)?;
    let w = worker(&fx, LONG);
    let names = fx.registry.file_names();

    fx.strategy.request_cancel();
    assert!(w.execute_compaction_sync(&names).is_err());
    fx.strategy.clear_cancel();

    let status = w.status();
    assert_eq!(status.failed, 1);
    assert!(status.last_error.unwrap_or_default().contains("cancelled"));
    assert_eq!(fx.registry.file_names(), names);

    // Retrying the same job succeeds.
    assert_eq!(w.execute_compaction_sync(&names)?.len(), 1);
    Ok(())
}

#[test]
fn drop_stops_the_thread() -> Result<()> {
    let fx = fixture(test_config())?;
    {
        let w = worker(&fx, LONG);
        w.start()?;
    }
    // The strategy is only shared with the fixture again.
    assert!(wait_until(Duration::from_secs(5), || Arc::strong_count(&fx.strategy) == 1));
    Ok(())
}
