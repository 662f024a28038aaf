// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Error types
//!
//! Graph construction never fails; everything here comes from loading
//! request files or from resolving dynamic dependencies at run time.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for trflow operations
pub type TrflowResult<T> = Result<T, TrflowError>;

/// Main error type for trflow
#[derive(Error, Debug, Diagnostic)]
pub enum TrflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Resolution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Store key '{key}' could not be resolved at segment '{segment}'")]
    #[diagnostic(
        code(trflow::store_key_not_found),
        help("Check that the producing task ran and that the store snapshot was refreshed afterwards")
    )]
    StoreKeyNotFound { key: String, segment: String },

    #[error("Injection point '{point}' could not be resolved at segment '{segment}'")]
    #[diagnostic(
        code(trflow::injection_point_not_found),
        help("Injection points are dot-paths into the receiving message using its JSON field names")
    )]
    InjectionPointNotFound { point: String, segment: String },

    #[error("Value injected at '{point}' does not fit the receiving message: {message}")]
    #[diagnostic(code(trflow::shape_mismatch))]
    ShapeMismatch { point: String, message: String },

    #[error("Failed to snapshot store entry '{key}': {message}")]
    #[diagnostic(code(trflow::snapshot_failed))]
    SnapshotFailed { key: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task {index} is out of range; the graph has {count} tasks")]
    #[diagnostic(code(trflow::task_out_of_range))]
    TaskOutOfRange { index: usize, count: usize },

    #[error("Circular dependency between tasks: {}", tasks.join(" → "))]
    #[diagnostic(
        code(trflow::circular_dependency),
        help("A task may only depend on values published by tasks ordered before it")
    )]
    CircularDependency { tasks: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Request file not found: {path}")]
    #[diagnostic(
        code(trflow::request_not_found),
        help("Pass the path of a YAML or JSON test request")
    )]
    RequestNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(trflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(trflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Store file must hold a JSON object of key/value entries, got {found}")]
    #[diagnostic(code(trflow::invalid_store_file))]
    InvalidStoreFile { found: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/Parsing Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(trflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(trflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(trflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for TrflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for TrflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for TrflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl TrflowError {
    /// Whether this error came from the resolution phase
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreKeyNotFound { .. }
                | Self::InjectionPointNotFound { .. }
                | Self::ShapeMismatch { .. }
                | Self::SnapshotFailed { .. }
        )
    }

    /// Suggest a next step for this error, if one is known
    pub fn recovery(&self) -> Option<RecoverySuggestion> {
        match self {
            Self::StoreKeyNotFound { key, segment } => {
                Some(RecoverySuggestion::missing_store_key(key, segment))
            }
            Self::InjectionPointNotFound { point, segment } => {
                Some(RecoverySuggestion::unknown_injection_point(point, segment))
            }
            Self::ShapeMismatch { point, .. } => Some(RecoverySuggestion::shape_mismatch(point)),
            _ => None,
        }
    }
}
