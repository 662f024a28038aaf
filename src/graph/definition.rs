// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Compiled request graph
//!
//! These are the messages handed to the execution engine. Field names follow
//! the lowerCamelCase JSON encoding, which is also the vocabulary of every
//! dynamic dependency's injection point. Unknown fields are rejected so that
//! an injection of the wrong shape fails loudly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{TrflowError, TrflowResult};
use crate::graph::metadata::AnyPayload;

/// Root of a compiled graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Request {
    pub start_request: Option<StartRequest>,
    pub params: Params,
    /// Tasks in the order the engine must run them
    pub ordered_tasks: Vec<Task>,
}

impl Request {
    /// Load a compiled request from a JSON or YAML file
    pub fn from_file(path: &Path) -> TrflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_json(json: &str) -> TrflowResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Oneofs are read as single-entry maps, matching the JSON encoding
    pub fn from_yaml(yaml: &str) -> TrflowResult<Self> {
        serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))
            .map_err(Into::into)
    }

    pub fn to_json(&self) -> TrflowResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Oneofs are written as single-entry maps rather than YAML tags
    pub fn to_yaml(&self) -> TrflowResult<String> {
        let mut buffer = Vec::new();
        let mut serializer = serde_yaml::Serializer::new(&mut buffer);
        serde_yaml::with::singleton_map_recursive::serialize(self, &mut serializer)?;
        String::from_utf8(buffer).map_err(|e| TrflowError::Yaml { message: e.to_string() })
    }

    /// Every container request in graph order, with its task index
    pub fn container_requests(&self) -> impl Iterator<Item = (usize, &ContainerRequest)> {
        self.ordered_tasks
            .iter()
            .enumerate()
            .flat_map(|(idx, task)| task.ordered_container_requests.iter().map(move |c| (idx, c)))
    }
}

/// Whether a path should be read as JSON rather than YAML
pub(crate) fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// How the run was started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartRequest {
    /// Started from a parent build
    Build(BuildMode),
    /// Started as a long-lived server
    Server(ServerMode),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BuildMode {
    pub parent_build_id: i64,
    pub parent_request_uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ServerMode {
    pub address: IpEndpoint,
}

/// Run-wide parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Params {
    pub test_suites: Vec<TestSuite>,
    pub keyvals: BTreeMap<String, String>,
    pub container_metadata: ContainerMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TestSuite {
    pub name: String,
    pub test_case_ids: Vec<String>,
    pub tags: Vec<String>,
}

/// Container images available to the run, by image key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ContainerMetadata {
    pub images: BTreeMap<String, ContainerImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ContainerImage {
    pub repository: String,
    pub name: String,
    pub digest: String,
    pub tags: Vec<String>,
}

impl ContainerImage {
    /// Pullable reference, pinned by digest when one is known
    pub fn reference(&self) -> String {
        let base = if self.repository.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.repository.trim_end_matches('/'), self.name)
        };
        match (self.digest.is_empty(), self.tags.first()) {
            (false, _) => format!("{}@{}", base, self.digest),
            (true, Some(tag)) => format!("{}:{}", base, tag),
            (true, None) => base,
        }
    }
}

/// One stage of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Task {
    /// Whether a failure of this task fails the run
    pub required: bool,
    /// Containers to start, in order, before the payload runs
    pub ordered_container_requests: Vec<ContainerRequest>,
    pub payload: Option<TaskPayload>,
}

impl Task {
    /// Short human-readable name
    pub fn label(&self) -> String {
        let kind = match &self.payload {
            Some(TaskPayload::Provision(_)) => "provision",
            Some(TaskPayload::Test(_)) => "test",
            Some(TaskPayload::Publish(_)) => "publish",
            None => "containers",
        };
        match self.ordered_container_requests.first() {
            Some(container) => format!("{} ({})", container.dynamic_identifier, kind),
            None => kind.to_string(),
        }
    }

    /// Every dependency declared by this task, container deps first
    pub fn all_dynamic_deps(&self) -> impl Iterator<Item = &DynamicDep> {
        self.ordered_container_requests
            .iter()
            .flat_map(|c| c.dynamic_deps.iter())
            .chain(self.payload.iter().flat_map(|p| p.dynamic_deps().iter()))
    }
}

/// Work a task performs once its containers are up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskPayload {
    Provision(ProvisionTask),
    Test(TestTask),
    Publish(PublishTask),
}

impl TaskPayload {
    /// Dependencies resolved against the payload itself
    pub fn dynamic_deps(&self) -> &[DynamicDep] {
        match self {
            Self::Provision(p) => &p.dynamic_deps,
            Self::Test(t) => &t.dynamic_deps,
            Self::Publish(p) => &p.dynamic_deps,
        }
    }
}

/// Describes a sidecar container implementing one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerRequest {
    /// Name unique within the graph; the container's endpoint is published under it
    #[serde(default)]
    pub dynamic_identifier: String,
    pub container: ContainerSpec,
    #[serde(default)]
    pub container_image_key: String,
    /// Resolved against `container`
    #[serde(default)]
    pub dynamic_deps: Vec<DynamicDep>,
    #[serde(default)]
    pub network: String,
}

/// A reference from a field of the receiving message to a store value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DynamicDep {
    /// Dot-path into the receiver; empty replaces the whole message
    pub key: String,
    /// Dot-path into the injectable store
    pub value: String,
}

impl DynamicDep {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Top-level store key this dependency reads from
    pub fn store_root(&self) -> &str {
        self.value.split('.').next().unwrap_or_default()
    }
}

/// Template of a container kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerSpec {
    CrosDut(CrosDutTemplate),
    CrosProvision(CrosProvisionTemplate),
    /// Generic service container; Android provisioning runs in one
    Generic(GenericTemplate),
    CrosTest(CrosTestTemplate),
    CrosPublish(CrosPublishTemplate),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosDutTemplate {
    pub cache_server: IpEndpoint,
    pub dut_address: IpEndpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosProvisionTemplate {
    pub input_request: CrosProvisionRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosProvisionRequest {
    pub dut: Option<Dut>,
    pub dut_server: IpEndpoint,
    pub system_image_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct GenericTemplate {
    pub binary_name: String,
    pub binary_args: Vec<String>,
    pub docker_artifact_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosTestTemplate {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosPublishTemplate {
    pub publish_type: PublishType,
    pub publish_src_dir: String,
}

/// Destination of a publish container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublishType {
    #[default]
    Unspecified,
    Rdb,
    Gcs,
    Cpcon,
}

impl std::fmt::Display for PublishType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::Rdb => write!(f, "rdb"),
            Self::Gcs => write!(f, "gcs"),
            Self::Cpcon => write!(f, "cpcon"),
        }
    }
}

/// A network endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct IpEndpoint {
    pub address: String,
    pub port: i32,
}

impl IpEndpoint {
    pub fn new(address: impl Into<String>, port: i32) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// Device under test, as published by the inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Dut {
    pub id: String,
    pub board: String,
    pub model: String,
    pub ssh: IpEndpoint,
    pub cache_server: IpEndpoint,
}

/// A device as seen by the test service; also the shape of `device_<id>` store entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TestDevice {
    pub dut: Option<Dut>,
    pub dut_server: IpEndpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ProvisionTask {
    pub service_address: IpEndpoint,
    pub startup_request: ProvisionStartupRequest,
    pub install_request: InstallRequest,
    pub dynamic_deps: Vec<DynamicDep>,
    /// Device id this task provisions
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ProvisionStartupRequest {
    pub dut: Option<Dut>,
    pub dut_server: IpEndpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct InstallRequest {
    pub image_path: String,
    pub metadata: Option<AnyPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TestTask {
    pub service_address: IpEndpoint,
    pub test_request: CrosTestRequest,
    pub dynamic_deps: Vec<DynamicDep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosTestRequest {
    pub test_suites: Vec<TestSuite>,
    pub primary: TestDevice,
    pub companions: Vec<TestDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PublishTask {
    pub service_address: IpEndpoint,
    pub publish_request: PublishRequest,
    pub dynamic_deps: Vec<DynamicDep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PublishRequest {
    pub artifact_dir_path: String,
    /// Test service response, passed through untouched
    pub test_response: Option<Value>,
    pub metadata: Option<AnyPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_request() {
        let yaml = r#"
startRequest:
  build:
    parentBuildId: 42
orderedTasks:
  - required: true
    orderedContainerRequests:
      - dynamicIdentifier: crosDutServer_primaryDevice
        container:
          crosDut: {}
        containerImageKey: cros-dut
        dynamicDeps:
          - key: crosDut.dutAddress
            value: device_primaryDevice.dut.ssh
"#;

        let request = Request::from_yaml(yaml).unwrap();
        assert_eq!(
            request.start_request,
            Some(StartRequest::Build(BuildMode {
                parent_build_id: 42,
                parent_request_uid: String::new(),
            }))
        );
        assert!(request.params.keyvals.is_empty());
        assert_eq!(request.ordered_tasks.len(), 1);

        let container = &request.ordered_tasks[0].ordered_container_requests[0];
        assert!(matches!(container.container, ContainerSpec::CrosDut(_)));
        assert_eq!(container.dynamic_deps[0].store_root(), "device_primaryDevice");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = Request::from_json(r#"{"orderedTasks": [{"required": true, "priority": 3}]}"#);
        assert!(matches!(result, Err(TrflowError::Json { .. })));
    }

    #[test]
    fn test_json_field_names() {
        let task = Task {
            required: true,
            ordered_container_requests: vec![],
            payload: Some(TaskPayload::Provision(ProvisionTask {
                target: "primaryDevice".into(),
                ..Default::default()
            })),
        };
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["payload"]["provision"]["target"], "primaryDevice");
        assert!(value["payload"]["provision"]["startupRequest"]["dutServer"].is_object());
        assert!(value["payload"]["provision"]["dynamicDeps"].is_array());
    }

    #[test]
    fn test_publish_type_encoding() {
        let template = CrosPublishTemplate {
            publish_type: PublishType::Rdb,
            publish_src_dir: String::new(),
        };
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["publishType"], "RDB");
    }

    #[test]
    fn test_image_reference() {
        let image = ContainerImage {
            repository: "us-docker.pkg.dev/cros-registry/test-services/".into(),
            name: "cros-test".into(),
            digest: "sha256:abc".into(),
            tags: vec!["prod".into()],
        };
        assert_eq!(
            image.reference(),
            "us-docker.pkg.dev/cros-registry/test-services/cros-test@sha256:abc"
        );

        let tagged = ContainerImage {
            digest: String::new(),
            ..image
        };
        assert!(tagged.reference().ends_with("cros-test:prod"));
    }

    #[test]
    fn test_round_trip_json() {
        let request = Request {
            start_request: Some(StartRequest::Server(ServerMode::default())),
            params: Params {
                keyvals: BTreeMap::from([("suite".to_string(), "bvt".to_string())]),
                ..Default::default()
            },
            ordered_tasks: vec![Task::default()],
        };

        let json = request.to_json().unwrap();
        assert_eq!(Request::from_json(&json).unwrap(), request);
    }
}
