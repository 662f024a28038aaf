// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Dependency DAG over a compiled request
//!
//! Tasks never name each other directly. A task depends on another when one
//! of its dynamic deps reads a store key the other publishes: a container's
//! endpoint under its dynamic identifier, or an RPC output under
//! `<identifier>_<rpc>`. Keys nobody in the graph publishes (device
//! inventory, for one) are external inputs.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::errors::{TrflowError, TrflowResult};
use crate::graph::definition::Request;

/// A dependency whose producer is ordered at or after its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReference {
    pub consumer: usize,
    pub producer: usize,
    pub store_key: String,
}

/// Producer to consumer edges between the tasks of a request
pub struct DependencyDag {
    graph: DiGraph<usize, String>,
    nodes: Vec<NodeIndex>,
    names: Vec<String>,
    labels: Vec<String>,
    producers: HashMap<String, usize>,
    external: BTreeSet<String>,
    forward: Vec<ForwardReference>,
}

impl DependencyDag {
    /// Derive the DAG from the deps a request declares
    pub fn build(request: &Request) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = Vec::with_capacity(request.ordered_tasks.len());
        let mut names = Vec::with_capacity(request.ordered_tasks.len());
        let mut labels = Vec::with_capacity(request.ordered_tasks.len());
        let mut producers = HashMap::new();

        for (idx, task) in request.ordered_tasks.iter().enumerate() {
            nodes.push(graph.add_node(idx));
            names.push(
                task.ordered_container_requests
                    .first()
                    .map(|c| c.dynamic_identifier.clone())
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("task{}", idx)),
            );
            labels.push(task.label());

            // First publisher wins; duplicates are the validator's concern
            for container in &task.ordered_container_requests {
                if !container.dynamic_identifier.is_empty() {
                    producers.entry(container.dynamic_identifier.clone()).or_insert(idx);
                }
            }
        }

        let mut dag = Self {
            graph,
            nodes,
            names,
            labels,
            producers,
            external: BTreeSet::new(),
            forward: Vec::new(),
        };

        for (consumer, task) in request.ordered_tasks.iter().enumerate() {
            for dep in task.all_dynamic_deps() {
                let root = dep.store_root();
                let Some(producer) = dag.producer_of(root) else {
                    dag.external.insert(root.to_string());
                    continue;
                };

                // A task's own containers are up before its payload runs
                if producer == consumer {
                    continue;
                }
                if producer > consumer {
                    dag.forward.push(ForwardReference {
                        consumer,
                        producer,
                        store_key: root.to_string(),
                    });
                }

                let (from, to) = (dag.nodes[producer], dag.nodes[consumer]);
                if !dag.graph.contains_edge(from, to) {
                    dag.graph.add_edge(from, to, root.to_string());
                }
            }
        }

        dag
    }

    /// Index of the task that publishes a top-level store key
    pub fn producer_of(&self, store_key: &str) -> Option<usize> {
        if let Some(idx) = self.producers.get(store_key) {
            return Some(*idx);
        }

        // RPC outputs: `<identifier>_<rpc>`, longest identifier first. A numeric
        // suffix is a postfixed identifier of another device, not an RPC.
        self.producers
            .iter()
            .filter(|(id, _)| {
                store_key
                    .strip_prefix(id.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .is_some_and(|rpc| {
                        !rpc.is_empty() && !rpc.bytes().all(|b| b.is_ascii_digit())
                    })
            })
            .max_by_key(|(id, _)| id.len())
            .map(|(_, idx)| *idx)
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Short name of a task: its first container identifier
    pub fn name(&self, task: usize) -> Option<&str> {
        self.names.get(task).map(String::as_str)
    }

    /// Store keys read by the graph but published outside it
    pub fn external_keys(&self) -> impl Iterator<Item = &str> {
        self.external.iter().map(String::as_str)
    }

    /// Dependencies on tasks ordered at or after the reader
    pub fn forward_references(&self) -> &[ForwardReference] {
        &self.forward
    }

    /// Task indices in an order that satisfies every edge
    pub fn topological_order(&self) -> TrflowResult<Vec<usize>> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| TrflowError::CircularDependency {
                tasks: self.cycle_members(cycle.node_id()),
            })
    }

    /// Tasks in a cycle through `start`, in edge order
    fn cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let mut members = vec![self.names[self.graph[start]].clone()];
        let mut current = start;

        // Walk outgoing edges that can lead back to the start
        while let Some(next) = self
            .graph
            .neighbors_directed(current, Direction::Outgoing)
            .find(|n| has_path_connecting(&self.graph, *n, start, None))
        {
            members.push(self.names[self.graph[next]].clone());
            if next == start || members.len() > self.nodes.len() {
                break;
            }
            current = next;
        }

        members
    }

    /// Tasks that must finish before `task` (direct only)
    pub fn dependencies(&self, task: usize) -> Vec<usize> {
        self.neighbors(task, Direction::Incoming)
    }

    /// Tasks that read something `task` publishes (direct only)
    pub fn dependents(&self, task: usize) -> Vec<usize> {
        self.neighbors(task, Direction::Outgoing)
    }

    fn neighbors(&self, task: usize, direction: Direction) -> Vec<usize> {
        let Some(node) = self.nodes.get(task) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n])
            .collect();
        found.sort_unstable();
        found
    }

    /// Whether task `a` depends on task `b`, directly or transitively
    pub fn depends_on(&self, a: usize, b: usize) -> bool {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(node_a), Some(node_b)) => has_path_connecting(&self.graph, *node_b, *node_a, None),
            _ => false,
        }
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for (idx, name) in self.names.iter().enumerate() {
            out.push_str(&format!("    {}[\"{}\"]\n", name, self.labels[idx]));
        }

        for edge in self.graph.edge_references() {
            let from = &self.names[self.graph[edge.source()]];
            let to = &self.names[self.graph[edge.target()]];
            out.push_str(&format!("    {} --> {}\n", from, to));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph request {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_references() {
            let from = &self.names[self.graph[edge.source()]];
            let to = &self.names[self.graph[edge.target()]];
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                from,
                to,
                edge.weight()
            ));
        }

        // Isolated tasks
        for (idx, node) in self.nodes.iter().enumerate() {
            if self.graph.neighbors_undirected(*node).next().is_none() {
                out.push_str(&format!("    \"{}\";\n", self.names[idx]));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self) -> TrflowResult<String> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (position, idx) in order.iter().enumerate() {
            out.push_str(&format!("{}. {}", position + 1, self.labels[*idx]));

            let deps: Vec<&str> = self
                .dependencies(*idx)
                .into_iter()
                .map(|d| self.names[d].as_str())
                .collect();
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        if !self.external.is_empty() {
            let external: Vec<&str> = self.external_keys().collect();
            out.push_str(&format!("external inputs: {}\n", external.join(", ")));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::catalog::ContainerKind;
    use crate::graph::definition::{ContainerRequest, DynamicDep, Task};
    use crate::graph::test_request::TestRequest;
    use crate::graph::TestRequestConstructor;

    fn task(identifier: &str, deps: &[(&str, &str)]) -> Task {
        let kind = ContainerKind::CrosDut;
        Task {
            required: true,
            ordered_container_requests: vec![ContainerRequest {
                dynamic_identifier: identifier.into(),
                container: kind.template(),
                container_image_key: kind.image_key().into(),
                dynamic_deps: deps.iter().map(|(k, v)| DynamicDep::new(*k, *v)).collect(),
                network: String::new(),
            }],
            payload: None,
        }
    }

    fn request(tasks: Vec<Task>) -> Request {
        Request {
            ordered_tasks: tasks,
            ..Default::default()
        }
    }

    fn built_graph(companions: &[&str]) -> Request {
        let test_request = TestRequest {
            companion_duts: companions
                .iter()
                .map(|board| crate::graph::DutSpec {
                    board: board.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        TestRequestConstructor::new(&test_request).build()
    }

    #[test]
    fn test_built_graph_edges() {
        let dag = DependencyDag::build(&built_graph(&[]));

        // dutServer, provision, test, rdb, gcs
        assert_eq!(dag.len(), 5);
        assert_eq!(dag.dependencies(1), vec![0]);
        assert_eq!(dag.dependencies(2), vec![0]);
        assert_eq!(dag.dependencies(3), vec![2]);
        assert_eq!(dag.dependencies(4), vec![2]);
        assert_eq!(dag.dependents(2), vec![3, 4]);
        assert!(dag.depends_on(4, 0));
        assert!(!dag.depends_on(0, 4));
        assert!(dag.forward_references().is_empty());
        assert_eq!(
            dag.external_keys().collect::<Vec<_>>(),
            vec!["device_primaryDevice"]
        );
    }

    #[test]
    fn test_rpc_outputs_resolve_to_producer() {
        let dag = DependencyDag::build(&built_graph(&["brya", "brya"]));

        assert_eq!(dag.producer_of("crosTest_executeTests"), dag.producer_of("crosTest"));
        assert_eq!(
            dag.producer_of("crosDutServer_companionDevice_brya_2"),
            Some(4)
        );
        assert_eq!(dag.producer_of("crosDutServer_companionDevice_brya"), Some(2));
        assert_eq!(dag.producer_of("device_companionDevice_brya"), None);
        assert_eq!(dag.producer_of("crosTest_"), None);
    }

    #[test]
    fn test_postfixed_key_is_not_an_rpc_output() {
        let dag = DependencyDag::build(&request(vec![
            task("crosDutServer_companionDevice_brya", &[]),
            task(
                "crosTest",
                &[("crosDut.dutAddress", "crosDutServer_companionDevice_brya_2.ssh")],
            ),
        ]));

        assert_eq!(dag.producer_of("crosDutServer_companionDevice_brya_2"), None);
        assert_eq!(dag.producer_of("crosDutServer_companionDevice_brya_executeTests"), Some(0));
        assert!(dag.dependencies(1).is_empty());
        assert_eq!(
            dag.external_keys().collect::<Vec<_>>(),
            vec!["crosDutServer_companionDevice_brya_2"]
        );
    }

    #[test]
    fn test_topological_order_matches_graph_order() {
        let graph = built_graph(&["octopus"]);
        let dag = DependencyDag::build(&graph);
        let order = dag.topological_order().unwrap();

        assert_eq!(order.len(), graph.ordered_tasks.len());
        for (position, idx) in order.iter().enumerate() {
            for dep in dag.dependencies(*idx) {
                assert!(order[..position].contains(&dep));
            }
        }
    }

    #[test]
    fn test_forward_reference_detected() {
        let dag = DependencyDag::build(&request(vec![
            task("a", &[("crosDut.dutAddress", "b.ssh")]),
            task("b", &[]),
        ]));

        assert_eq!(
            dag.forward_references(),
            &[ForwardReference {
                consumer: 0,
                producer: 1,
                store_key: "b".into(),
            }]
        );
        // Still acyclic; only the order is wrong
        assert_eq!(dag.topological_order().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_cycle_detection() {
        let dag = DependencyDag::build(&request(vec![
            task("a", &[("crosDut.dutAddress", "b")]),
            task("b", &[("crosDut.dutAddress", "a")]),
        ]));

        match dag.topological_order() {
            Err(TrflowError::CircularDependency { tasks }) => {
                assert!(tasks.contains(&"a".to_string()));
                assert!(tasks.contains(&"b".to_string()));
            }
            other => panic!("Expected cycle, got {:?}", other),
        }
        assert!(dag.to_text().is_err());
    }

    #[test]
    fn test_renderings() {
        let dag = DependencyDag::build(&request(vec![
            task("a", &[]),
            task("b", &[("crosDut.dutAddress", "a_executeTests.ssh")]),
            task("c", &[]),
        ]));

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("a --> b"));

        let dot = dag.to_dot();
        assert!(dot.contains("\"a\" -> \"b\" [label=\"a_executeTests\"];"));
        assert!(dot.contains("    \"c\";"));

        let text = dag.to_text().unwrap();
        assert!(text.contains("[depends: a]"));
    }

    #[test]
    fn test_unnamed_tasks() {
        let dag = DependencyDag::build(&request(vec![Task::default()]));
        assert_eq!(dag.name(0), Some("task0"));
        assert_eq!(dag.name(1), None);
        assert!(dag.dependencies(7).is_empty());
    }
}
