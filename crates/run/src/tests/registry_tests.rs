use std::fs;
use std::sync::Arc;

use anyhow::Result;
use memtable::Entry;
use tempfile::tempdir;

use super::{run_path, val, write_run};
use crate::*;

fn entries(pairs: &[(&str, &str)]) -> Vec<(String, Entry)> {
    pairs.iter().map(|(k, v)| (k.to_string(), val(v))).collect()
}

#[test]
fn open_creates_missing_directory() -> Result<()> {
    let dir = tempdir()?;
    let data = dir.path().join("nested").join("data");
    let registry = RunRegistry::open(&data)?;
    assert!(data.is_dir());
    assert!(registry.is_empty());
    assert_eq!(registry.allocate_id(), 1);
    Ok(())
}

#[test]
fn flush_registers_a_level_zero_run() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let run = registry.flush(entries(&[("a", "1"), ("b", "2")]))?;

    assert_eq!(run.level(), 0);
    assert_eq!(run.created_at(), run.id());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.file_names(), vec![run.file_name().to_string()]);
    assert_eq!(registry.get("b")?, Some(val("2")));
    Ok(())
}

#[test]
fn flush_of_nothing_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    assert!(registry.flush(Vec::new()).is_err());
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn newest_run_wins_lookups() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    registry.flush(entries(&[("k", "first")]))?;
    registry.flush(entries(&[("k", "second")]))?;
    registry.flush(vec![("k".to_string(), Entry::Tombstone)])?;
    registry.flush(entries(&[("other", "x")]))?;

    assert_eq!(registry.get("k")?, Some(Entry::Tombstone));
    let created: Vec<u64> = registry.snapshot().iter().map(|r| r.created_at()).collect();
    assert!(created.windows(2).all(|w| w[0] > w[1]), "{:?}", created);
    Ok(())
}

#[test]
fn reopen_discovers_runs_and_resumes_ids() -> Result<()> {
    let dir = tempdir()?;
    {
        let registry = RunRegistry::open(dir.path())?;
        registry.flush(entries(&[("a", "1")]))?;
        registry.flush(entries(&[("a", "2")]))?;
    }
    fs::write(dir.path().join("run_L0_00000099.dat.tmp"), b"half written")?;
    fs::write(dir.path().join("README"), b"not a run")?;

    let registry = RunRegistry::open(dir.path())?;
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("a")?, Some(val("2")));
    assert_eq!(registry.allocate_id(), 3);
    assert!(!dir.path().join("run_L0_00000099.dat.tmp").exists());
    assert!(dir.path().join("README").exists());
    Ok(())
}

#[test]
fn corrupt_run_fails_open() -> Result<()> {
    let dir = tempdir()?;
    fs::write(run_path(dir.path(), 0, 1), b"garbage that is not a run file at all!!!!!!")?;
    assert!(RunRegistry::open(dir.path()).is_err());
    Ok(())
}

#[test]
fn build_run_does_not_register() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let run = registry
        .build_run(1, Some(42), 1, vec![Ok(("a".to_string(), val("1")))])?
        .expect("one entry written");
    assert_eq!(run.level(), 1);
    assert_eq!(run.created_at(), 42);
    assert!(registry.is_empty());

    let none = registry.build_run(1, None, 0, Vec::<Result<(String, Entry)>>::new())?;
    assert!(none.is_none());
    Ok(())
}

#[test]
fn replace_swaps_inputs_for_outputs() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let a = registry.flush(entries(&[("a", "1")]))?;
    let b = registry.flush(entries(&[("b", "2")]))?;
    let keep = registry.flush(entries(&[("c", "3")]))?;

    let merged = registry
        .build_run(1, Some(b.created_at()), 2, vec![
            Ok(("a".to_string(), val("1"))),
            Ok(("b".to_string(), val("2"))),
        ])?
        .expect("merged run");
    let inputs = vec![a.file_name().to_string(), b.file_name().to_string()];
    registry.replace(&inputs, vec![Arc::clone(&merged)])?;

    let names = registry.file_names();
    assert_eq!(names, vec![keep.file_name().to_string(), merged.file_name().to_string()]);
    assert!(!a.path().exists());
    assert!(!b.path().exists());
    assert_eq!(registry.get("a")?, Some(val("1")));
    Ok(())
}

#[test]
fn replace_with_missing_input_changes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let a = registry.flush(entries(&[("a", "1")]))?;
    let before = registry.file_names();

    let inputs = vec![a.file_name().to_string(), "run_L0_00000777.dat".to_string()];
    assert!(registry.replace(&inputs, Vec::new()).is_err());
    assert_eq!(registry.file_names(), before);
    assert!(a.path().exists());
    Ok(())
}

#[test]
fn snapshot_is_isolated_from_later_swaps() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let a = registry.flush(entries(&[("a", "1")]))?;
    let snapshot = registry.snapshot();

    registry.replace(&[a.file_name().to_string()], Vec::new())?;
    assert!(registry.is_empty());
    assert_eq!(snapshot.len(), 1);
    if cfg!(unix) {
        assert_eq!(snapshot[0].get("a")?, Some(val("1")));
    }
    Ok(())
}

#[test]
fn resolve_reports_the_missing_name() -> Result<()> {
    let dir = tempdir()?;
    let registry = RunRegistry::open(dir.path())?;
    let a = registry.flush(entries(&[("a", "1")]))?;
    let found = registry.resolve(&[a.file_name().to_string()]);
    assert_eq!(found.map(|v| v.len()), Ok(1));

    let missing = registry.resolve(&["run_L0_00000009.dat".to_string()]);
    assert_eq!(missing.map(|v| v.len()), Err("run_L0_00000009.dat".to_string()));
    Ok(())
}

#[test]
fn discovered_runs_keep_their_level() -> Result<()> {
    let dir = tempdir()?;
    write_run(dir.path(), 2, 5, &[("deep", Some("x"))])?;
    let registry = RunRegistry::open(dir.path())?;
    let snap = registry.snapshot();
    assert_eq!(snap[0].level(), 2);
    assert_eq!(registry.allocate_id(), 6);
    Ok(())
}
