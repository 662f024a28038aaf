// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for trflow.

pub mod build;
pub mod graph;
pub mod resolve;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::errors::TrflowResult;
use crate::graph::{Request, TestRequest, TestRequestConstructor};

/// Test-run task graph builder
///
/// Compile declarative test requests into ordered task graphs and resolve
/// their dynamic dependencies.
#[derive(Parser, Debug)]
#[clap(
    name = "trflow",
    version,
    about = "Compile test requests into ordered task graphs with late-bound dependencies",
    long_about = None,
    after_help = "Examples:\n\
        trflow build request.yaml                       Print the compiled graph as JSON\n\
        trflow graph request.yaml --format mermaid      Show task dependencies\n\
        trflow validate request.yaml                    Check the compiled graph\n\
        trflow resolve graph.json --store store.json    Fill in dynamic dependencies\n\n\
        See 'trflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a test request into a task graph
    Build {
        /// Test request file (YAML, or JSON by extension)
        request: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "json")]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Show task dependencies as a graph
    Graph {
        /// Test request file
        request: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,

        /// Input is an already compiled graph
        #[clap(long)]
        compiled: bool,
    },

    /// Validate a compiled task graph
    Validate {
        /// Test request file
        request: PathBuf,

        /// Input is an already compiled graph
        #[clap(long)]
        compiled: bool,
    },

    /// Resolve dynamic dependencies against a store file
    Resolve {
        /// Compiled graph file
        graph: PathBuf,

        /// JSON object of store entries
        #[clap(short, long)]
        store: PathBuf,

        /// Resolve only this task
        #[clap(short, long)]
        task: Option<usize>,

        /// Output format
        #[clap(short, long, default_value = "json")]
        format: OutputFormat,
    },
}

/// Serialization format for compiled graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Render a graph in this format
    pub fn render(&self, request: &Request) -> TrflowResult<String> {
        match self {
            Self::Json => request.to_json(),
            Self::Yaml => request.to_yaml(),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Load a compiled graph, or compile one from a test request
pub fn load_graph(path: &Path, compiled: bool) -> TrflowResult<Request> {
    if compiled {
        Request::from_file(path)
    } else {
        let test_request = TestRequest::from_file(path)?;
        Ok(TestRequestConstructor::new(&test_request).build())
    }
}
