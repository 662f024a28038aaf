// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Container catalog
//!
//! The closed set of container kinds a graph can request. Each kind knows its
//! image key in the container metadata and the template it starts from.

use crate::graph::definition::{
    ContainerSpec, CrosDutTemplate, CrosProvisionTemplate, CrosPublishTemplate, CrosTestTemplate,
    GenericTemplate, PublishType,
};

/// Directory publish containers read results from
pub const PUBLISH_SRC_DIR: &str = "/tmp/test/results";

/// Directory generic containers write artifacts to
pub const GENERIC_ARTIFACT_DIR: &str = "/tmp/android-provision";

/// A known container kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    CrosDut,
    CrosProvision,
    AndroidProvision,
    CrosTest,
    /// Trimmed test runner for CQ runs on GCE
    CrosTestCqLight,
    CrosPublish(PublishType),
}

impl ContainerKind {
    /// Key of this kind's image in the container metadata
    pub fn image_key(&self) -> &'static str {
        match self {
            Self::CrosDut => "cros-dut",
            Self::CrosProvision => "cros-provision",
            Self::AndroidProvision => "android-provision",
            Self::CrosTest => "cros-test",
            Self::CrosTestCqLight => "cros-test-cq-light",
            Self::CrosPublish(_) => "cros-publish",
        }
    }

    /// Unresolved template for this kind
    pub fn template(&self) -> ContainerSpec {
        match self {
            Self::CrosDut => ContainerSpec::CrosDut(CrosDutTemplate::default()),
            Self::CrosProvision => ContainerSpec::CrosProvision(CrosProvisionTemplate::default()),
            Self::AndroidProvision => ContainerSpec::Generic(GenericTemplate {
                binary_name: "android-provision".into(),
                binary_args: vec![
                    "server".into(),
                    "-port".into(),
                    "0".into(),
                ],
                docker_artifact_dir: GENERIC_ARTIFACT_DIR.into(),
            }),
            Self::CrosTest | Self::CrosTestCqLight => ContainerSpec::CrosTest(CrosTestTemplate::default()),
            Self::CrosPublish(publish_type) => ContainerSpec::CrosPublish(CrosPublishTemplate {
                publish_type: *publish_type,
                publish_src_dir: PUBLISH_SRC_DIR.into(),
            }),
        }
    }

    /// Test runner variant for a run
    pub fn test_runner(cq_light: bool) -> Self {
        if cq_light {
            Self::CrosTestCqLight
        } else {
            Self::CrosTest
        }
    }
}
