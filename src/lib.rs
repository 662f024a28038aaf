// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! # trflow - Test-run task graph builder
//!
//! `trflow` compiles a declarative test request into an ordered graph of
//! tasks (DUT bring-up, provisioning, test execution, result publishing) and
//! late-binds the values those tasks exchange at run time.
//!
//! ## Features
//!
//! - **Graph construction** - One pass from a test request to ordered tasks
//! - **Identifier scheme** - Canonical store keys for devices, tasks and RPC outputs
//! - **Injectable store** - Live and fixed values behind an explicit snapshot
//! - **Dependency resolution** - Dot-path reads and writes over serialized messages
//!
//! ## Quick Start
//!
//! ```bash
//! # Compile a request
//! trflow build request.yaml > graph.json
//!
//! # Inspect the dependencies between tasks
//! trflow graph request.yaml --format mermaid
//!
//! # Fill in dynamic dependencies from published values
//! trflow resolve graph.json --store store.json
//! ```

pub mod cli;
pub mod errors;
pub mod graph;
pub mod ids;
pub mod resolver;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use errors::{TrflowError, TrflowResult};
pub use graph::{DependencyDag, GraphValidator, Request, RequestConstructor, TestRequest, TestRequestConstructor};
pub use ids::{DeviceIdentifier, TaskIdentifier};
pub use resolver::{inject, inject_dependencies, resolve_task};
pub use store::{shared, InjectableStore, Shared, Snapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
