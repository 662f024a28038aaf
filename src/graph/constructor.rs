// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Request construction
//!
//! Compiles a [`TestRequest`] into an ordered task graph. Construction never
//! fails: absent inputs degrade to empty defaults, and every runtime value a
//! task needs is left as a [`DynamicDep`] for the resolver.
//!
//! Task order is part of the contract. Later tasks depend on values that
//! earlier tasks publish, so the engine must run (or at least resolve) them
//! in sequence:
//!
//! 1. primary DUT server, primary provision
//! 2. DUT server and provision for each companion
//! 3. test execution
//! 4. publishing: RDB, GCS, CPCON

use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::graph::catalog::ContainerKind;
use crate::graph::definition::{
    BuildMode, ContainerRequest, ContainerSpec, CrosTestRequest, DynamicDep, InstallRequest, ProvisionTask,
    PublishRequest, PublishTask, PublishType, Request, StartRequest, Task, TaskPayload, TestSuite, TestTask,
};
use crate::graph::metadata::{
    AndroidProvisionMetadata, AnyPayload, CpconPublishMetadata, GcsPublishMetadata, RdbPublishMetadata,
    TypedMessage,
};
use crate::graph::test_request::{DutSpec, Infra, TestRequest};
use crate::ids::{tasks, DeviceIdentifier};

/// Keyval set to the primary device's board
pub const PRIMARY_BOARD_KEYVAL: &str = "primary-board";

/// Keyval set to the comma-joined companion boards
pub const COMPANION_BOARDS_KEYVAL: &str = "companion-boards";

/// Keyval set to the build target of the primary image
pub const BUILD_TARGET_KEYVAL: &str = "build_target";

/// The three phases that fill in a [`Request`]
pub trait RequestConstructor {
    fn construct_start_request(&self, request: &mut Request);
    fn construct_params(&self, request: &mut Request);
    fn construct_ordered_tasks(&self, request: &mut Request);
}

/// Run every construction phase, in order, over an empty request
#[instrument(skip_all)]
pub fn build(constructor: &dyn RequestConstructor) -> Request {
    let mut request = Request::default();

    constructor.construct_start_request(&mut request);
    constructor.construct_params(&mut request);
    constructor.construct_ordered_tasks(&mut request);

    info!(tasks = request.ordered_tasks.len(), "built request graph");
    request
}

/// Builds the standard ChromeOS/Android test pipeline from a [`TestRequest`]
pub struct TestRequestConstructor<'a> {
    request: &'a TestRequest,
}

impl<'a> TestRequestConstructor<'a> {
    pub fn new(request: &'a TestRequest) -> Self {
        Self { request }
    }

    /// Shorthand for [`build`] over this constructor
    pub fn build(&self) -> Request {
        build(self)
    }

    fn test_suites(&self) -> Vec<TestSuite> {
        self.request.test_suites.clone().unwrap_or_default()
    }

    /// Append the DUT server and provision tasks for one device
    fn push_device_tasks(&self, tasks: &mut Vec<Task>, device: &DeviceIdentifier, dut: &DutSpec) {
        let steps = &self.request.steps;

        if steps.skip_dut_server {
            debug!(device = %device, "skipping DUT server");
        } else {
            tasks.push(dut_server_task(device));
        }

        if steps.skip_provision {
            debug!(device = %device, "skipping provision");
        } else {
            tasks.push(provision_task(device, dut));
        }
    }

    fn test_task(&self, primary: &DeviceIdentifier, companions: &[DeviceIdentifier]) -> Task {
        let test_id = tasks::cros_test();
        let cq_light = self.request.cq_run && self.request.infra == Infra::Gce;

        let mut deps = vec![
            DynamicDep::new("serviceAddress", test_id.id.clone()),
            DynamicDep::new("testRequest.primary", primary.get_device(&[])),
            DynamicDep::new("testRequest.primary.dutServer", primary.get_cros_dut_server()),
        ];
        // Each companion is appended, then its server filled in by index.
        for (idx, companion) in companions.iter().enumerate() {
            deps.push(DynamicDep::new("testRequest.companions", companion.get_device(&[])));
            deps.push(DynamicDep::new(
                format!("testRequest.companions.{}.dutServer", idx),
                companion.get_cros_dut_server(),
            ));
        }

        Task {
            required: true,
            ordered_container_requests: vec![container_request(
                ContainerKind::test_runner(cq_light),
                test_id.id,
                Vec::new(),
            )],
            payload: Some(TaskPayload::Test(TestTask {
                test_request: CrosTestRequest {
                    test_suites: self.test_suites(),
                    ..Default::default()
                },
                dynamic_deps: deps,
                ..Default::default()
            })),
        }
    }

    fn publish_tasks(&self) -> Vec<Task> {
        let steps = &self.request.steps;
        let mut publish = Vec::new();

        if steps.skip_publish {
            debug!("skipping all publishing");
            return publish;
        }

        let test_response = tasks::cros_test().get_rpc_response(tasks::EXECUTE_TESTS_RPC, &[]);
        let primary = &self.request.primary_dut;

        if !steps.skip_rdb_publish {
            let metadata = RdbPublishMetadata {
                parent_build_id: self.request.parent_build_id,
                parent_request_uid: self.request.parent_request_uid.clone(),
                board: primary.board.clone(),
                suite_names: self.test_suites().into_iter().map(|s| s.name).collect(),
            };
            publish.push(publish_task(
                PublishType::Rdb,
                tasks::RDB_PUBLISH,
                false,
                pack_metadata(&metadata),
                DynamicDep::new("publishRequest.testResponse", test_response.clone()),
            ));
        }

        if !steps.skip_gcs_publish {
            let metadata = GcsPublishMetadata {
                gcs_path: self.gcs_results_path(),
            };
            publish.push(publish_task(
                PublishType::Gcs,
                tasks::GCS_PUBLISH,
                true,
                pack_metadata(&metadata),
                DynamicDep::new(
                    "publishRequest.artifactDirPath",
                    tasks::cros_test().get_rpc_response(tasks::EXECUTE_TESTS_RPC, &["artifactDir"]),
                ),
            ));
        }

        if steps.enable_cpcon_publish {
            let metadata = CpconPublishMetadata {
                board: primary.board.clone(),
                model: primary.model.clone(),
            };
            publish.push(publish_task(
                PublishType::Cpcon,
                tasks::CPCON_PUBLISH,
                true,
                pack_metadata(&metadata),
                DynamicDep::new("publishRequest.testResponse", test_response),
            ));
        }

        publish
    }

    fn gcs_results_path(&self) -> String {
        let run = if self.request.parent_request_uid.is_empty() {
            self.request.parent_build_id.to_string()
        } else {
            self.request.parent_request_uid.clone()
        };
        format!("{}/{}", self.request.results_gcs_prefix.trim_end_matches('/'), run)
    }
}

impl RequestConstructor for TestRequestConstructor<'_> {
    fn construct_start_request(&self, request: &mut Request) {
        request.start_request = Some(StartRequest::Build(BuildMode {
            parent_build_id: self.request.parent_build_id,
            parent_request_uid: self.request.parent_request_uid.clone(),
        }));
    }

    fn construct_params(&self, request: &mut Request) {
        if self.request.steps.skip_test {
            debug!("test stage skipped; leaving params empty");
            return;
        }

        let params = &mut request.params;
        params.test_suites = self.test_suites();
        params.keyvals = self.request.keyvals.clone().unwrap_or_default();
        params.container_metadata = self.request.container_metadata.clone().unwrap_or_default();

        let primary = &self.request.primary_dut;
        if !params.keyvals.contains_key(BUILD_TARGET_KEYVAL) {
            if let Some(build_target) = derive_build_target(&primary.image_path) {
                params.keyvals.insert(BUILD_TARGET_KEYVAL.into(), build_target);
            }
        }

        if primary.board.is_empty() {
            warn!("primary DUT has no board");
        } else {
            params.keyvals.insert(PRIMARY_BOARD_KEYVAL.into(), primary.board.clone());
        }

        if !self.request.companion_duts.is_empty() {
            let boards: Vec<&str> = self
                .request
                .companion_duts
                .iter()
                .map(|dut| dut.board.as_str())
                .collect();
            params.keyvals.insert(COMPANION_BOARDS_KEYVAL.into(), boards.join(","));
        }
    }

    fn construct_ordered_tasks(&self, request: &mut Request) {
        let ordered = &mut request.ordered_tasks;
        let mut used_ids = HashSet::new();

        let primary = DeviceIdentifier::primary();
        used_ids.insert(primary.id.clone());
        self.push_device_tasks(ordered, &primary, &self.request.primary_dut);

        let mut companions = Vec::with_capacity(self.request.companion_duts.len());
        for dut in &self.request.companion_duts {
            let device = unique_companion_id(&mut used_ids, &dut.board);
            self.push_device_tasks(ordered, &device, dut);
            companions.push(device);
        }

        if self.request.steps.skip_test {
            debug!("skipping test execution");
        } else {
            ordered.push(self.test_task(&primary, &companions));
        }

        ordered.extend(self.publish_tasks());

        for (idx, task) in ordered.iter().enumerate() {
            debug!(index = idx, task = %task.label(), required = task.required, "ordered task");
        }
    }
}

/// Identifier for a companion, postfixed `_2`, `_3`, … until unused
fn unique_companion_id(used: &mut HashSet<String>, board: &str) -> DeviceIdentifier {
    let base = DeviceIdentifier::companion(board);
    let mut candidate = base.clone();
    let mut postfix = 2;
    while used.contains(&candidate.id) {
        candidate = base.add_postfix(postfix);
        postfix += 1;
    }
    used.insert(candidate.id.clone());
    candidate
}

/// Build target from an image path like `gs://bucket/brya-kernelnext-release/R120-…`
pub fn derive_build_target(image_path: &str) -> Option<String> {
    let re = Regex::new(
        r"^(?:gs://[^/]+/)?(?P<target>[^/]+)-(?:release|postsubmit|cq|snapshot|paladin|firmware|factory)/",
    )
    .ok()?;
    re.captures(image_path)
        .and_then(|caps| caps.name("target"))
        .map(|m| m.as_str().to_string())
}

fn is_android(dut: &DutSpec) -> bool {
    dut.provision_metadata
        .as_ref()
        .is_some_and(|metadata| metadata.unpack::<AndroidProvisionMetadata>().is_ok())
}

fn pack_metadata<T: TypedMessage>(metadata: &T) -> Option<AnyPayload> {
    match AnyPayload::pack(metadata) {
        Ok(payload) => Some(payload),
        Err(e) => {
            let type_url = T::type_url();
            warn!(type_url = %type_url, error = %e, "dropping unencodable metadata");
            None
        }
    }
}

fn container_request(kind: ContainerKind, identifier: impl Into<String>, deps: Vec<DynamicDep>) -> ContainerRequest {
    ContainerRequest {
        dynamic_identifier: identifier.into(),
        container: kind.template(),
        container_image_key: kind.image_key().to_string(),
        dynamic_deps: deps,
        network: String::new(),
    }
}

fn dut_server_task(device: &DeviceIdentifier) -> Task {
    Task {
        required: true,
        ordered_container_requests: vec![container_request(
            ContainerKind::CrosDut,
            device.get_cros_dut_server(),
            vec![
                DynamicDep::new("crosDut.cacheServer", device.get_device(&["dut", "cacheServer"])),
                DynamicDep::new("crosDut.dutAddress", device.get_device(&["dut", "ssh"])),
            ],
        )],
        payload: None,
    }
}

fn provision_task(device: &DeviceIdentifier, dut: &DutSpec) -> Task {
    let android = is_android(dut);
    let (kind, task_id) = if android {
        (ContainerKind::AndroidProvision, tasks::android_provision())
    } else {
        (ContainerKind::CrosProvision, tasks::cros_provision())
    };
    let task_id = task_id.add_device_id(device);
    debug!(device = %device, android, "building provision task");

    let mut container = if android {
        container_request(kind, task_id.id.clone(), Vec::new())
    } else {
        container_request(
            kind,
            task_id.id.clone(),
            vec![
                DynamicDep::new("crosProvision.inputRequest.dut", device.get_device(&["dut"])),
                DynamicDep::new("crosProvision.inputRequest.dutServer", device.get_cros_dut_server()),
            ],
        )
    };
    if let ContainerSpec::CrosProvision(template) = &mut container.container {
        template.input_request.system_image_path = dut.image_path.clone();
    }

    Task {
        required: true,
        ordered_container_requests: vec![container],
        payload: Some(TaskPayload::Provision(ProvisionTask {
            install_request: InstallRequest {
                image_path: dut.image_path.clone(),
                metadata: dut.provision_metadata.clone(),
            },
            dynamic_deps: vec![
                DynamicDep::new("serviceAddress", task_id.id),
                DynamicDep::new("startupRequest.dut", device.get_device(&["dut"])),
                DynamicDep::new("startupRequest.dutServer", device.get_cros_dut_server()),
            ],
            target: device.id.clone(),
            ..Default::default()
        })),
    }
}

fn publish_task(
    publish_type: PublishType,
    identifier: &str,
    required: bool,
    metadata: Option<AnyPayload>,
    input: DynamicDep,
) -> Task {
    Task {
        required,
        ordered_container_requests: vec![container_request(
            ContainerKind::CrosPublish(publish_type),
            identifier,
            Vec::new(),
        )],
        payload: Some(TaskPayload::Publish(PublishTask {
            publish_request: PublishRequest {
                metadata,
                ..Default::default()
            },
            dynamic_deps: vec![DynamicDep::new("serviceAddress", identifier), input],
            ..Default::default()
        })),
    }
}
