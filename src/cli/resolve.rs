// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Resolve command - fill in dynamic dependencies from a store file

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use tracing::warn;

use super::OutputFormat;
use crate::errors::TrflowError;
use crate::graph::Request;
use crate::resolver::resolve_task;
use crate::store::InjectableStore;

/// Run the resolve command
///
/// Tasks are resolved in graph order. A failure on an optional task is
/// reported and skipped; a failure on a required one stops the run.
pub fn run(
    graph_path: PathBuf,
    store_path: PathBuf,
    task: Option<usize>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let mut request = Request::from_file(&graph_path)?;
    let store = InjectableStore::from_file(&store_path)?;
    let snapshot = store.snapshot();

    let count = request.ordered_tasks.len();
    let indices: Vec<usize> = match task {
        Some(index) if index < count => vec![index],
        Some(index) => return Err(TrflowError::TaskOutOfRange { index, count }.into()),
        None => (0..count).collect(),
    };

    let mut skipped = 0;
    for idx in indices {
        let task = &mut request.ordered_tasks[idx];
        let label = task.label();

        match resolve_task(task, snapshot) {
            Ok(()) => {
                if verbose {
                    eprintln!("  {} {}", "✓".green(), label);
                }
            }
            Err(e) => {
                eprintln!("  {} {}: {}", "✗".red(), label, e);
                if let Some(suggestion) = e.recovery() {
                    eprintln!();
                    eprint!("{}", suggestion);
                }
                if task.required {
                    return Err(e.into());
                }
                warn!(task = %label, "optional task left unresolved");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        eprintln!("  {} {} optional task(s) left unresolved", "⚠".yellow(), skipped);
    }

    println!("{}", format.render(&request)?);

    Ok(())
}
