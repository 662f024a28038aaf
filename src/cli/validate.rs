// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Validate command - check a compiled task graph

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_graph;
use crate::graph::{DependencyDag, GraphValidator};
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub fn run(path: PathBuf, compiled: bool, verbose: bool) -> Result<()> {
    println!("{}", "Validating task graph...".bold());
    println!();

    let request = match load_graph(&path, compiled) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("  {} Failed to load {}", "✗".red(), path.display());
            eprintln!();
            return Err(e.into());
        }
    };

    print_success(&format!("Loaded {} tasks", request.ordered_tasks.len()));

    let validation = GraphValidator::validate(&request);

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().bold().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if validation.has_warnings() {
        print_section(&"Warnings".yellow().bold().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        let dag = DependencyDag::build(&request);
        print_section("Graph summary");
        for (idx, task) in request.ordered_tasks.iter().enumerate() {
            let deps: Vec<&str> = dag
                .dependencies(idx)
                .into_iter()
                .filter_map(|d| dag.name(d))
                .collect();
            let deps = if deps.is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", deps.join(", "))
            };
            println!("    - {}{}", task.label(), deps.dimmed());
        }
        let external: Vec<&str> = dag.external_keys().collect();
        if !external.is_empty() {
            println!("    external inputs: {}", external.join(", ").dimmed());
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Graph validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Graph is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Graph is valid!".green().bold());
    }
    Ok(())
}
