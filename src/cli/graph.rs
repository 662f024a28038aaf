// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Graph command - show task dependencies

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{load_graph, GraphFormat};
use crate::graph::DependencyDag;

/// Run the graph command
pub fn run(path: PathBuf, format: GraphFormat, compiled: bool, verbose: bool) -> Result<()> {
    let request = load_graph(&path, compiled)?;
    let dag = DependencyDag::build(&request);

    let output = match format {
        GraphFormat::Text => dag.to_text()?,
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    };

    println!("{}", output);

    // Summary goes to stderr so the rendering can be piped as is. The text
    // rendering already lists external inputs.
    if verbose {
        let external: Vec<&str> = dag.external_keys().collect();
        if !external.is_empty() && format != GraphFormat::Text {
            eprintln!("external inputs: {}", external.join(", ").dimmed());
        }
        for forward in dag.forward_references() {
            eprintln!(
                "{} task {} reads '{}' from later task {}",
                "⚠".yellow(),
                forward.consumer,
                forward.store_key,
                forward.producer
            );
        }
    }

    Ok(())
}
