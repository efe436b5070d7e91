use std::io::{BufRead, Write};

use anyhow::Result;
use engine::LsmEngine;

/// What one input line asks the shell to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    /// Print this and wait for the next command.
    Text(String),
    Exit,
}

/// Reads commands from `input` until EOF or `EXIT`, writing one reply per
/// command to `out`.
pub(crate) fn run<R: BufRead, W: Write>(engine: &mut LsmEngine, input: R, mut out: W) -> Result<()> {
    prompt(&mut out)?;
    for line in input.lines() {
        match execute(engine, &line?) {
            Some(Reply::Exit) => {
                writeln!(out, "bye")?;
                return Ok(());
            }
            Some(Reply::Text(text)) => writeln!(out, "{}", text)?,
            None => {}
        }
        prompt(&mut out)?;
    }
    Ok(())
}

fn prompt<W: Write>(out: &mut W) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

/// Runs one command line. Blank lines yield `None`. Engine errors become
/// `ERR ...` replies; they never end the session.
pub(crate) fn execute(engine: &mut LsmEngine, line: &str) -> Option<Reply> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;

    let text = match cmd.to_uppercase().as_str() {
        "PUT" | "SET" => {
            let Some(key) = parts.next() else {
                return Some(usage("PUT key value"));
            };
            let value = parts.collect::<Vec<&str>>().join(" ");
            if value.is_empty() {
                return Some(usage("PUT key value"));
            }
            match engine.put(key, value) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR put failed: {:#}", e),
            }
        }
        "GET" => {
            let Some(key) = parts.next() else {
                return Some(usage("GET key"));
            };
            match engine.get(key) {
                Ok(Some(value)) => value,
                Ok(None) => "(nil)".to_string(),
                Err(e) => format!("ERR read failed: {:#}", e),
            }
        }
        "DEL" | "DELETE" => {
            let Some(key) = parts.next() else {
                return Some(usage("DEL key"));
            };
            match engine.delete(key) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR delete failed: {:#}", e),
            }
        }
        "SCAN" => {
            let start = parts.next().unwrap_or("");
            let end = parts.next().unwrap_or("");
            match engine.scan(start, end) {
                Ok(rows) => format_rows(&rows),
                Err(e) => format!("ERR scan failed: {:#}", e),
            }
        }
        "PREFIX" => {
            let Some(prefix) = parts.next() else {
                return Some(usage("PREFIX p"));
            };
            match engine.scan_prefix(prefix) {
                Ok(rows) => format_rows(&rows),
                Err(e) => format!("ERR scan failed: {:#}", e),
            }
        }
        "FLUSH" => match engine.flush() {
            Ok(Some(file)) => format!("OK ({})", file),
            Ok(None) => "OK (memtable empty)".to_string(),
            Err(e) => format!("ERR flush failed: {:#}", e),
        },
        "COMPACT" => match engine.compact() {
            Ok(tasks) => format!(
                "OK ({} task(s), L0={}, runs={})",
                tasks,
                engine.level_run_count(0),
                engine.run_count()
            ),
            Err(e) => format!("ERR compact failed: {:#}", e),
        },
        "STATS" => engine.stats().to_string(),
        "EXIT" | "QUIT" => return Some(Reply::Exit),
        other => format!("unknown command: {}", other),
    };
    Some(Reply::Text(text))
}

fn usage(form: &str) -> Reply {
    Reply::Text(format!("ERR usage: {}", form))
}

fn format_rows(rows: &[(String, String)]) -> String {
    if rows.is_empty() {
        return "(empty)".to_string();
    }
    let mut text: String = rows
        .iter()
        .map(|(k, v)| format!("{} -> {}\n", k, v))
        .collect();
    text.push_str(&format!("({} entries)", rows.len()));
    text
}
