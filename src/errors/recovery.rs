// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from resolution errors.

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest how to get a missing value into the store
    pub fn missing_store_key(key: &str, segment: &str) -> Self {
        let root = key.split('.').next().unwrap_or(key);
        let steps = if root == segment {
            vec![
                format!("Nothing is registered under '{}'", root),
                "The task producing it has not completed, or published under a different key".into(),
            ]
        } else {
            vec![
                format!("'{}' is registered but has no field '{}'", root, segment),
                "Field names follow the lowerCamelCase JSON encoding of the message".into(),
                "If the producer updated its value in place, refresh the snapshot first".into(),
            ]
        };

        Self {
            action: format!("Publish '{}' before resolving this task", key),
            steps,
            commands: vec![
                "# Show which task produces which key:".into(),
                "trflow graph request.yaml --format text".into(),
            ],
        }
    }

    /// Suggest fixing a dynamic dependency whose key does not exist in the receiver
    pub fn unknown_injection_point(point: &str, segment: &str) -> Self {
        Self {
            action: format!("Fix injection point '{}'", point),
            steps: vec![
                format!("Segment '{}' does not exist in the receiving message", segment),
                "Every segment but the last must already exist before injection".into(),
                "Numeric segments index into repeated fields and must be in range".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest fixing a value that does not fit its destination field
    pub fn shape_mismatch(point: &str) -> Self {
        Self {
            action: format!("Check the type of the value injected at '{}'", point),
            steps: vec![
                "The injected value could not be decoded back into the receiving message".into(),
                "Point the dependency at a narrower store path or a different field".into(),
            ],
            commands: vec![
                "# Inspect the compiled graph:".into(),
                "trflow build request.yaml --format yaml".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
