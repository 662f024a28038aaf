// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! trflow - test-run task graph builder
//!
//! Compile test requests into ordered task graphs and resolve their dynamic
//! dependencies.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trflow::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let default_filter = if cli.verbose { "trflow=debug" } else { "trflow=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if !trflow::utils::should_use_colors() {
        colored::control::set_override(false);
    }

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Build {
            request,
            format,
            output,
        } => trflow::cli::build::run(request, format, output, cli.verbose),
        Commands::Graph {
            request,
            format,
            compiled,
        } => trflow::cli::graph::run(request, format, compiled, cli.verbose),
        Commands::Validate { request, compiled } => {
            trflow::cli::validate::run(request, compiled, cli.verbose)
        }
        Commands::Resolve {
            graph,
            store,
            task,
            format,
        } => trflow::cli::resolve::run(graph, store, task, format, cli.verbose),
    }
}
