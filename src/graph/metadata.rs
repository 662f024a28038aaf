// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Opaque metadata payloads
//!
//! Provision and publish requests carry `Any`-style metadata owned by the
//! services that consume it. The graph builder attaches these payloads and,
//! apart from the type probe used to pick a provisioner, never looks inside.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{TrflowError, TrflowResult};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// A message type that can travel inside an [`AnyPayload`]
pub trait TypedMessage: Serialize + DeserializeOwned {
    /// Fully qualified message name
    const TYPE_NAME: &'static str;

    fn type_url() -> String {
        format!("{}{}", TYPE_URL_PREFIX, Self::TYPE_NAME)
    }
}

/// Type-tagged opaque message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnyPayload {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub value: Value,
}

impl AnyPayload {
    /// Wrap a typed message
    pub fn pack<T: TypedMessage>(message: &T) -> TrflowResult<Self> {
        Ok(Self {
            type_url: T::type_url(),
            value: serde_json::to_value(message)?,
        })
    }

    /// Whether this payload claims to hold a `T`
    pub fn is<T: TypedMessage>(&self) -> bool {
        self.type_url == T::type_url()
    }

    /// Decode as `T`; fails when the type URL or the body does not match
    pub fn unpack<T: TypedMessage>(&self) -> TrflowResult<T> {
        if !self.is::<T>() {
            return Err(TrflowError::Json {
                message: format!("payload holds '{}', not '{}'", self.type_url, T::type_url()),
            });
        }
        serde_json::from_value(self.value.clone()).map_err(Into::into)
    }
}

/// Provisioning instructions for an Android device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AndroidProvisionMetadata {
    pub cipd_packages: Vec<CipdPackage>,
    pub android_os_image: String,
}

impl TypedMessage for AndroidProvisionMetadata {
    const TYPE_NAME: &'static str = "chromiumos.test.api.AndroidProvisionRequestMetadata";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CipdPackage {
    pub name: String,
    pub version: String,
}

/// Provisioning instructions for a ChromeOS device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CrosProvisionMetadata {
    pub update_firmware: bool,
    pub prevent_reboot: bool,
}

impl TypedMessage for CrosProvisionMetadata {
    const TYPE_NAME: &'static str = "chromiumos.test.api.CrOSProvisionMetadata";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RdbPublishMetadata {
    pub parent_build_id: i64,
    pub parent_request_uid: String,
    pub board: String,
    pub suite_names: Vec<String>,
}

impl TypedMessage for RdbPublishMetadata {
    const TYPE_NAME: &'static str = "chromiumos.test.api.PublishRdbMetadata";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct GcsPublishMetadata {
    pub gcs_path: String,
}

impl TypedMessage for GcsPublishMetadata {
    const TYPE_NAME: &'static str = "chromiumos.test.api.PublishGcsMetadata";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CpconPublishMetadata {
    pub board: String,
    pub model: String,
}

impl TypedMessage for CpconPublishMetadata {
    const TYPE_NAME: &'static str = "chromiumos.test.api.PublishCpconMetadata";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pack_unpack() {
        let metadata = AndroidProvisionMetadata {
            cipd_packages: vec![CipdPackage {
                name: "chromiumos/infra/gms-core".into(),
                version: "latest".into(),
            }],
            android_os_image: String::new(),
        };

        let any = AnyPayload::pack(&metadata).unwrap();
        assert_eq!(
            any.type_url,
            "type.googleapis.com/chromiumos.test.api.AndroidProvisionRequestMetadata"
        );
        assert!(any.is::<AndroidProvisionMetadata>());
        assert_eq!(any.unpack::<AndroidProvisionMetadata>().unwrap(), metadata);
    }

    #[test]
    fn test_unpack_wrong_type() {
        let any = AnyPayload::pack(&CrosProvisionMetadata::default()).unwrap();
        assert!(any.unpack::<AndroidProvisionMetadata>().is_err());
    }

    #[test]
    fn test_unpack_wrong_body() {
        let any = AnyPayload {
            type_url: AndroidProvisionMetadata::type_url(),
            value: json!({"cipdPackages": "not-a-list"}),
        };
        assert!(any.unpack::<AndroidProvisionMetadata>().is_err());
    }

    #[test]
    fn test_wire_shape() {
        let any = AnyPayload::pack(&GcsPublishMetadata {
            gcs_path: "gs://bucket/path".into(),
        })
        .unwrap();
        let value = serde_json::to_value(&any).unwrap();
        assert_eq!(value["@type"], "type.googleapis.com/chromiumos.test.api.PublishGcsMetadata");
        assert_eq!(value["value"]["gcsPath"], "gs://bucket/path");
    }
}
