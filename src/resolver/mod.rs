// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Dependency resolution
//!
//! Late-binds values from the injectable store into a compiled graph. Reads
//! go through the same dot-path primitive as [`Snapshot::get`]; writes edit
//! the receiver's serialized tree and decode it back.

mod inject;
pub mod path;

pub use inject::{inject, inject_dependencies};

use tracing::debug;

use crate::errors::TrflowResult;
use crate::graph::{Task, TaskPayload};
use crate::store::Snapshot;

/// Resolve every dependency a task declares
///
/// Container deps are injected into their container spec, in container
/// order, then payload deps into the payload itself. Stops at the first
/// failure.
pub fn resolve_task(task: &mut Task, snapshot: &Snapshot) -> TrflowResult<()> {
    for container in &mut task.ordered_container_requests {
        debug!(container = %container.dynamic_identifier, "resolving container dependencies");
        inject_dependencies(&mut container.container, snapshot, &container.dynamic_deps)?;
    }

    let Some(payload) = task.payload.as_mut() else {
        return Ok(());
    };

    // Deps are cloned since a whole-message injection may rewrite them.
    let deps = payload.dynamic_deps().to_vec();
    match payload {
        TaskPayload::Provision(provision) => inject_dependencies(provision, snapshot, &deps),
        TaskPayload::Test(test) => inject_dependencies(test, snapshot, &deps),
        TaskPayload::Publish(publish) => inject_dependencies(publish, snapshot, &deps),
    }
}
