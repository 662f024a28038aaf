// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Declarative test request
//!
//! Input to the graph builder, usually loaded from a YAML or JSON file.
//! Every field is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{TrflowError, TrflowResult};
use crate::graph::definition::{is_json, ContainerMetadata, TestSuite};
use crate::graph::metadata::AnyPayload;

/// What to test, on which devices, and which stages to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestRequest {
    pub parent_build_id: i64,
    pub parent_request_uid: String,
    pub primary_dut: DutSpec,
    pub companion_duts: Vec<DutSpec>,
    pub test_suites: Option<Vec<TestSuite>>,
    pub keyvals: Option<BTreeMap<String, String>>,
    pub container_metadata: Option<ContainerMetadata>,
    /// Whether this run gates a CQ attempt
    pub cq_run: bool,
    pub infra: Infra,
    /// Prefix under which GCS publishing uploads results
    pub results_gcs_prefix: String,
    pub steps: StepsConfig,
}

impl Default for TestRequest {
    fn default() -> Self {
        Self {
            parent_build_id: 0,
            parent_request_uid: String::new(),
            primary_dut: DutSpec::default(),
            companion_duts: Vec::new(),
            test_suites: None,
            keyvals: None,
            container_metadata: None,
            cq_run: false,
            infra: Infra::default(),
            results_gcs_prefix: "gs://chromeos-test-logs/test-runner".to_string(),
            steps: StepsConfig::default(),
        }
    }
}

impl TestRequest {
    /// Load a request from a file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file(path: &Path) -> TrflowResult<Self> {
        if !path.exists() {
            return Err(TrflowError::RequestNotFound {
                path: path.to_path_buf(),
            });
        }

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

    pub fn from_yaml(yaml: &str) -> TrflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_json(json: &str) -> TrflowResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }
}

/// One device the run needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DutSpec {
    pub board: String,
    pub model: String,
    /// OS image to provision, e.g. `gs://chromeos-image-archive/brya-release/R120-15662.0.0`
    pub image_path: String,
    /// Opaque provisioning instructions; their type selects the provisioner
    pub provision_metadata: Option<AnyPayload>,
}

/// Where devices are hosted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Infra {
    /// Physical lab devices
    #[default]
    Lab,
    /// Virtual devices on GCE
    Gce,
}

/// Pipeline stages to include
///
/// CPCON publishing is opt-in; every other stage runs unless skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepsConfig {
    pub skip_dut_server: bool,
    pub skip_provision: bool,
    pub skip_test: bool,
    /// Suppresses every publish task
    pub skip_publish: bool,
    pub skip_rdb_publish: bool,
    pub skip_gcs_publish: bool,
    pub enable_cpcon_publish: bool,
}

impl StepsConfig {
    /// Every stage skipped
    pub fn skip_all() -> Self {
        Self {
            skip_dut_server: true,
            skip_provision: true,
            skip_test: true,
            skip_publish: true,
            skip_rdb_publish: true,
            skip_gcs_publish: true,
            enable_cpcon_publish: false,
        }
    }
}
