// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Build command - compile a test request into a task graph

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::OutputFormat;
use crate::errors::TrflowError;
use crate::graph::{TestRequest, TestRequestConstructor};

/// Run the build command
pub fn run(request_path: PathBuf, format: OutputFormat, output: Option<PathBuf>, verbose: bool) -> Result<()> {
    let test_request = TestRequest::from_file(&request_path)?;
    let request = TestRequestConstructor::new(&test_request).build();
    let rendered = format.render(&request)?;

    let Some(path) = output else {
        println!("{}", rendered);
        return Ok(());
    };

    std::fs::write(&path, rendered).map_err(|e| TrflowError::FileWriteError {
        path: path.clone(),
        error: e.to_string(),
    })?;

    println!(
        "  {} Wrote {} tasks to {}",
        "✓".green(),
        request.ordered_tasks.len(),
        path.display()
    );

    if verbose {
        for (idx, task) in request.ordered_tasks.iter().enumerate() {
            let required = if task.required { "" } else { " (optional)" };
            println!("    {}. {}{}", idx + 1, task.label(), required.dimmed());
        }
    }

    Ok(())
}
