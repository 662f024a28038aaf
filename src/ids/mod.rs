// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Identifier scheme
//!
//! Maps (device, task, RPC) triples to the store keys producers publish under
//! and consumers reference from their dynamic dependencies. Both sides go
//! through these types so the keys cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the primary device under test
pub const PRIMARY_DEVICE: &str = "primaryDevice";

/// Prefix of companion device ids
pub const COMPANION_DEVICE: &str = "companionDevice";

/// Store key prefix for device info
pub const DEVICE_PREFIX: &str = "device";

/// Store key prefix for device metadata
pub const DEVICE_METADATA_PREFIX: &str = "deviceMetadata";

/// Store key prefix for a device's DUT server endpoint
pub const CROS_DUT_SERVER_PREFIX: &str = "crosDutServer";

/// Join a root key and an optional call chain into a dotted store path
fn injectable_key(root: String, chain: &[&str]) -> String {
    if chain.is_empty() {
        return root;
    }
    format!("{}.{}", root, chain.join("."))
}

/// Identifies one device taking part in a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    pub id: String,
}

impl DeviceIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The primary device
    pub fn primary() -> Self {
        Self::new(PRIMARY_DEVICE)
    }

    /// A companion device, keyed by its board
    pub fn companion(board: &str) -> Self {
        Self::new(format!("{}_{}", COMPANION_DEVICE, board))
    }

    /// A new identifier with `_<postfix>` appended
    pub fn add_postfix(&self, postfix: impl fmt::Display) -> Self {
        Self::new(format!("{}_{}", self.id, postfix))
    }

    /// `device_<id>[.<chain>]`
    pub fn get_device(&self, chain: &[&str]) -> String {
        injectable_key(format!("{}_{}", DEVICE_PREFIX, self.id), chain)
    }

    /// `deviceMetadata_<id>[.<chain>]`
    pub fn get_device_metadata(&self, chain: &[&str]) -> String {
        injectable_key(format!("{}_{}", DEVICE_METADATA_PREFIX, self.id), chain)
    }

    /// `crosDutServer_<id>`
    pub fn get_cros_dut_server(&self) -> String {
        format!("{}_{}", CROS_DUT_SERVER_PREFIX, self.id)
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Identifies a task (or the container serving it)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentifier {
    pub id: String,
}

impl TaskIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Per-device variant: `<id>_<device id>`
    pub fn add_device_id(&self, device: &DeviceIdentifier) -> Self {
        Self::new(format!("{}_{}", self.id, device.id))
    }

    /// Key of an RPC response: `<id>_<rpc>[.<chain>]`
    pub fn get_rpc_response(&self, rpc: &str, chain: &[&str]) -> String {
        injectable_key(format!("{}_{}", self.id, rpc), chain)
    }

    /// Key of an RPC request: `<id>_<rpc>Request[.<chain>]`
    pub fn get_rpc_request(&self, rpc: &str, chain: &[&str]) -> String {
        injectable_key(format!("{}_{}Request", self.id, rpc), chain)
    }
}

impl fmt::Display for TaskIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Well-known task identifiers
pub mod tasks {
    use super::TaskIdentifier;

    pub const CROS_PROVISION: &str = "crosProvision";
    pub const ANDROID_PROVISION: &str = "androidProvision";
    pub const CROS_TEST: &str = "crosTest";
    pub const RDB_PUBLISH: &str = "rdbPublish";
    pub const GCS_PUBLISH: &str = "gcsPublish";
    pub const CPCON_PUBLISH: &str = "cpconPublish";

    /// RPC the test service exposes
    pub const EXECUTE_TESTS_RPC: &str = "executeTests";

    pub fn cros_provision() -> TaskIdentifier {
        TaskIdentifier::new(CROS_PROVISION)
    }

    pub fn android_provision() -> TaskIdentifier {
        TaskIdentifier::new(ANDROID_PROVISION)
    }

    pub fn cros_test() -> TaskIdentifier {
        TaskIdentifier::new(CROS_TEST)
    }
}
