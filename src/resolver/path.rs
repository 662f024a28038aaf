// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Dot-path traversal over value trees
//!
//! A segment addresses a mapping key, or a sequence index when the current
//! node is a sequence. Store lookups and the resolver's receiver walk share
//! these functions.

use serde_json::Value;

/// A path segment that could not be followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMiss {
    pub segment: String,
}

impl PathMiss {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
        }
    }
}

/// Split a dotted path into segments. The empty path has no segments.
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').collect()
}

fn index(segment: &str) -> Option<usize> {
    segment.parse::<usize>().ok()
}

/// Follow one segment from `node`
pub fn step<'a>(node: &'a Value, segment: &str) -> Result<&'a Value, PathMiss> {
    match node {
        Value::Object(map) => map.get(segment).ok_or_else(|| PathMiss::new(segment)),
        Value::Array(items) => index(segment)
            .and_then(|i| items.get(i))
            .ok_or_else(|| PathMiss::new(segment)),
        _ => Err(PathMiss::new(segment)),
    }
}

/// Mutable counterpart of [`step`]
pub fn step_mut<'a>(node: &'a mut Value, segment: &str) -> Result<&'a mut Value, PathMiss> {
    match node {
        Value::Object(map) => map.get_mut(segment).ok_or_else(|| PathMiss::new(segment)),
        Value::Array(items) => match index(segment) {
            Some(i) => items.get_mut(i).ok_or_else(|| PathMiss::new(segment)),
            None => Err(PathMiss::new(segment)),
        },
        _ => Err(PathMiss::new(segment)),
    }
}

/// Resolve a dotted path against `root`
pub fn lookup<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathMiss> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, segment| step(node, segment))
}

/// Resolve already-split segments against `root`, mutably
pub fn lookup_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Result<&'a mut Value, PathMiss> {
    segments
        .iter()
        .try_fold(root, |node, segment| step_mut(node, segment))
}
