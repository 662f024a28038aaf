// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Graph validation
//!
//! Static checks over a compiled request, before any task runs. The builder
//! only guarantees identifier uniqueness among companions; these checks
//! cover the whole graph, including hand-edited ones.

use std::collections::HashMap;

use crate::graph::dag::DependencyDag;
use crate::graph::definition::Request;
use crate::resolver::path::segments;

/// Graph validator
pub struct GraphValidator;

impl GraphValidator {
    /// Validate a compiled request
    pub fn validate(request: &Request) -> ValidationResult {
        let mut result = ValidationResult::new();

        if request.ordered_tasks.is_empty() {
            result.add_warning("Graph has no tasks");
        }

        Self::check_identifiers(request, &mut result);
        Self::check_deps(request, &mut result);
        Self::check_images(request, &mut result);

        let dag = DependencyDag::build(request);
        for forward in dag.forward_references() {
            result.add_error(&format!(
                "Task {} reads '{}', which task {} publishes later",
                forward.consumer, forward.store_key, forward.producer
            ));
        }
        if let Err(e) = dag.topological_order() {
            result.add_error(&e.to_string());
        }

        result
    }

    /// Dynamic identifiers must be unique across the graph
    fn check_identifiers(request: &Request, result: &mut ValidationResult) {
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (idx, container) in request.container_requests() {
            let id = container.dynamic_identifier.as_str();
            if id.is_empty() {
                result.add_error(&format!("Task {}: container request has no dynamic identifier", idx));
                continue;
            }
            if let Some(first) = seen.insert(id, idx) {
                result.add_error(&format!(
                    "Duplicate dynamic identifier '{}' in tasks {} and {}",
                    id, first, idx
                ));
            }
        }
    }

    fn check_deps(request: &Request, result: &mut ValidationResult) {
        for (idx, task) in request.ordered_tasks.iter().enumerate() {
            for dep in task.all_dynamic_deps() {
                if dep.value.is_empty() {
                    result.add_error(&format!("Task {}: dependency for '{}' has no store key", idx, dep.key));
                } else if segments(&dep.value).iter().any(|s| s.is_empty()) {
                    result.add_error(&format!("Task {}: malformed store key '{}'", idx, dep.value));
                }

                if !dep.key.is_empty() && segments(&dep.key).iter().any(|s| s.is_empty()) {
                    result.add_error(&format!("Task {}: malformed injection point '{}'", idx, dep.key));
                }
            }

            if task.required && task.ordered_container_requests.is_empty() && task.payload.is_none() {
                result.add_warning(&format!("Task {}: required but does nothing", idx));
            }
        }
    }

    /// Image keys are only checked when the graph lists any images at all
    fn check_images(request: &Request, result: &mut ValidationResult) {
        let images = &request.params.container_metadata.images;
        if images.is_empty() {
            return;
        }

        for (idx, container) in request.container_requests() {
            let key = &container.container_image_key;
            if key.is_empty() {
                result.add_warning(&format!(
                    "Task {}: container '{}' has no image key",
                    idx, container.dynamic_identifier
                ));
            } else if !images.contains_key(key) {
                result.add_warning(&format!(
                    "Task {}: image '{}' for container '{}' is not in container metadata",
                    idx, key, container.dynamic_identifier
                ));
            }
        }
    }
}

/// Result of graph validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::definition::{ContainerImage, DynamicDep};
    use crate::graph::test_request::{DutSpec, TestRequest};
    use crate::graph::TestRequestConstructor;
    use std::collections::BTreeMap;

    fn built(companions: &[&str]) -> Request {
        let test_request = TestRequest {
            primary_dut: DutSpec {
                board: "brya".into(),
                ..Default::default()
            },
            companion_duts: companions
                .iter()
                .map(|board| DutSpec {
                    board: board.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        TestRequestConstructor::new(&test_request).build()
    }

    #[test]
    fn test_built_graph_is_valid() {
        let result = GraphValidator::validate(&built(&["brya", "brya", "octopus"]));
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_empty_graph_warns() {
        let result = GraphValidator::validate(&Request::default());
        assert!(result.is_valid());
        assert!(result.warnings[0].contains("no tasks"));
    }

    #[test]
    fn test_duplicate_identifier() {
        let mut request = built(&[]);
        let copy = request.ordered_tasks[0].clone();
        request.ordered_tasks.push(copy);

        let result = GraphValidator::validate(&request);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("Duplicate dynamic identifier")));
    }

    #[test]
    fn test_dependency_on_later_task() {
        let mut request = built(&[]);
        // Run the test before the DUT comes up
        let test = request.ordered_tasks.remove(2);
        request.ordered_tasks.insert(0, test);

        let result = GraphValidator::validate(&request);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("'crosDutServer_primaryDevice', which task 1 publishes later")));
    }

    #[test]
    fn test_malformed_deps() {
        let mut request = built(&[]);
        let deps = &mut request.ordered_tasks[0].ordered_container_requests[0].dynamic_deps;
        deps.push(DynamicDep::new("crosDut.dutAddress", ""));
        deps.push(DynamicDep::new("crosDut..dutAddress", "device_primaryDevice"));

        let result = GraphValidator::validate(&request);
        assert!(result.errors.iter().any(|e| e.contains("has no store key")));
        assert!(result.errors.iter().any(|e| e.contains("malformed injection point")));
    }

    #[test]
    fn test_missing_images_warn() {
        let mut request = built(&[]);
        request.params.container_metadata.images = BTreeMap::from([
            ("cros-dut".to_string(), ContainerImage::default()),
            ("cros-test".to_string(), ContainerImage::default()),
        ]);

        let result = GraphValidator::validate(&request);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("'cros-provision'")));
        assert!(result.warnings.iter().any(|w| w.contains("'cros-publish'")));
        assert!(!result.warnings.iter().any(|w| w.contains("'cros-dut'")));
    }
}
