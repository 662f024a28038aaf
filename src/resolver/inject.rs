// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Injection of store values into typed messages
//!
//! The receiver is serialized to a value tree, edited at the injection point
//! and decoded back into its own type. `receiver` is only overwritten once
//! the decode succeeds.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::{TrflowError, TrflowResult};
use crate::graph::DynamicDep;
use crate::resolver::path;
use crate::store::Snapshot;

/// Shape of a tree node, used to decide whether a sequence overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl Kind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }
}

/// Element kind of a sequence: `Ok(None)` when empty, `Err(())` when mixed
fn element_kind(items: &[Value]) -> Result<Option<Kind>, ()> {
    let mut kinds = items.iter().map(Kind::of);
    let Some(first) = kinds.next() else {
        return Ok(None);
    };
    if kinds.all(|k| k == first) {
        Ok(Some(first))
    } else {
        Err(())
    }
}

fn element_kinds_match(existing: &[Value], incoming: &[Value]) -> bool {
    match (element_kind(existing), element_kind(incoming)) {
        (Ok(None), Ok(_)) | (Ok(_), Ok(None)) => true,
        (Ok(Some(a)), Ok(Some(b))) => a == b,
        _ => false,
    }
}

/// Override the sequence with a compatible sequence, otherwise append
fn merge_into_sequence(existing: &mut Vec<Value>, injectable: Value) {
    match injectable {
        Value::Array(incoming) if element_kinds_match(existing, &incoming) => *existing = incoming,
        other => existing.push(other),
    }
}

fn write_slot(slot: &mut Value, injectable: Value) {
    match slot {
        Value::Array(existing) => merge_into_sequence(existing, injectable),
        _ => *slot = injectable,
    }
}

fn point_not_found(point: &str, segment: &str) -> TrflowError {
    TrflowError::InjectionPointNotFound {
        point: point.to_string(),
        segment: segment.to_string(),
    }
}

/// Write `injectable` at the dotted `point` inside `tree`
fn place(tree: &mut Value, point: &str, injectable: Value) -> TrflowResult<()> {
    let segments = path::segments(point);
    let Some((field, parents)) = segments.split_last() else {
        *tree = injectable;
        return Ok(());
    };

    let parent = path::lookup_mut(tree, parents).map_err(|miss| point_not_found(point, &miss.segment))?;

    match parent {
        Value::Object(map) => match map.get_mut(*field) {
            Some(slot) => write_slot(slot, injectable),
            None => {
                map.insert(field.to_string(), injectable);
            }
        },
        Value::Array(items) => {
            let slot = field
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| point_not_found(point, field))?;
            write_slot(slot, injectable);
        }
        _ => return Err(point_not_found(point, field)),
    }

    Ok(())
}

/// Inject the store value at `injection_key` into `receiver` at `injection_point`
///
/// An empty `injection_point` replaces the whole receiver. When the field at
/// the injection point holds a sequence, a sequence of the same element kind
/// replaces it and anything else is appended as one new element.
pub fn inject<T>(
    receiver: &mut T,
    injection_point: &str,
    snapshot: &Snapshot,
    injection_key: &str,
) -> TrflowResult<()>
where
    T: Serialize + DeserializeOwned,
{
    let shape_mismatch = |e: serde_json::Error| TrflowError::ShapeMismatch {
        point: injection_point.to_string(),
        message: e.to_string(),
    };

    let mut tree = serde_json::to_value(&*receiver).map_err(shape_mismatch)?;
    let injectable = snapshot.get(injection_key)?.clone();

    place(&mut tree, injection_point, injectable)?;

    *receiver = serde_json::from_value(tree).map_err(shape_mismatch)?;
    debug!(point = injection_point, key = injection_key, "injected dependency");
    Ok(())
}

/// Apply every dependency in order, stopping at the first failure
#[instrument(skip_all, fields(deps = deps.len()))]
pub fn inject_dependencies<T>(receiver: &mut T, snapshot: &Snapshot, deps: &[DynamicDep]) -> TrflowResult<()>
where
    T: Serialize + DeserializeOwned,
{
    for dep in deps {
        inject(receiver, &dep.key, snapshot, &dep.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CrosTestRequest, Dut, IpEndpoint, ProvisionTask, TestDevice, TestSuite};
    use crate::store::{shared, InjectableStore};
    use serde::Deserialize;
    use serde_json::json;

    fn snapshot_of(entries: Value) -> Snapshot {
        InjectableStore::from_json(&entries.to_string())
            .unwrap()
            .snapshot()
            .clone()
    }

    fn suite(name: &str) -> TestSuite {
        TestSuite {
            name: name.into(),
            ..Default::default()
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Tagged {
        tags: Vec<String>,
    }

    #[test]
    fn test_whole_message_replace_round_trip() {
        let snapshot = snapshot_of(json!({"crosTest": {"address": "localhost", "port": 8010}}));
        let mut endpoint = IpEndpoint::default();

        inject(&mut endpoint, "", &snapshot, "crosTest").unwrap();

        assert_eq!(endpoint, IpEndpoint::new("localhost", 8010));
    }

    #[test]
    fn test_plain_overwrite_of_nested_field() {
        let snapshot = snapshot_of(json!({"crosDutServer_primaryDevice": {"address": "10.1.1.1", "port": 80}}));
        let mut task = ProvisionTask::default();

        inject(&mut task, "startupRequest.dutServer", &snapshot, "crosDutServer_primaryDevice").unwrap();

        assert_eq!(task.startup_request.dut_server, IpEndpoint::new("10.1.1.1", 80));
    }

    #[test]
    fn test_single_element_appends() {
        let snapshot = snapshot_of(json!({"extra": {"name": "suite-d"}}));
        let mut request = CrosTestRequest {
            test_suites: vec![suite("a"), suite("b"), suite("c")],
            ..Default::default()
        };

        inject(&mut request, "testSuites", &snapshot, "extra").unwrap();

        assert_eq!(request.test_suites.len(), 4);
        assert_eq!(request.test_suites[3].name, "suite-d");
    }

    #[test]
    fn test_matching_sequence_overrides() {
        let snapshot = snapshot_of(json!({
            "suites": [{"name": "x"}, {"name": "y"}, {"name": "z"}]
        }));
        let mut request = CrosTestRequest {
            test_suites: vec![suite("a"), suite("b"), suite("c")],
            ..Default::default()
        };

        inject(&mut request, "testSuites", &snapshot, "suites").unwrap();

        let names: Vec<_> = request.test_suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_scalar_sequences() {
        let snapshot = snapshot_of(json!({"one": "d", "many": ["x", "y"]}));
        let mut tagged = Tagged {
            tags: vec!["a".into(), "b".into(), "c".into()],
        };

        inject(&mut tagged, "tags", &snapshot, "one").unwrap();
        assert_eq!(tagged.tags, vec!["a", "b", "c", "d"]);

        inject(&mut tagged, "tags", &snapshot, "many").unwrap();
        assert_eq!(tagged.tags, vec!["x", "y"]);
    }

    #[test]
    fn test_empty_destination_sequence_is_overridden() {
        let snapshot = snapshot_of(json!({"many": ["x", "y"]}));
        let mut tagged = Tagged::default();

        inject(&mut tagged, "tags", &snapshot, "many").unwrap();
        assert_eq!(tagged.tags, vec!["x", "y"]);
    }

    #[test]
    fn test_mismatched_sequence_is_appended_then_rejected() {
        // A sequence of numbers does not override a sequence of strings; it is
        // appended as one element, which a Vec<String> cannot hold.
        let snapshot = snapshot_of(json!({"numbers": [1, 2]}));
        let mut tagged = Tagged {
            tags: vec!["a".into()],
        };

        let result = inject(&mut tagged, "tags", &snapshot, "numbers");

        assert!(matches!(result, Err(TrflowError::ShapeMismatch { .. })));
        assert_eq!(tagged.tags, vec!["a"]);
    }

    #[test]
    fn test_index_into_sequence() {
        let snapshot = snapshot_of(json!({"crosDutServer_companionDevice_brya": {"address": "c", "port": 1}}));
        let mut request = CrosTestRequest {
            companions: vec![TestDevice::default(), TestDevice::default()],
            ..Default::default()
        };

        inject(
            &mut request,
            "companions.1.dutServer",
            &snapshot,
            "crosDutServer_companionDevice_brya",
        )
        .unwrap();

        assert_eq!(request.companions[0].dut_server, IpEndpoint::default());
        assert_eq!(request.companions[1].dut_server, IpEndpoint::new("c", 1));
    }

    #[test]
    fn test_missing_store_key() {
        let snapshot = snapshot_of(json!({}));
        let mut endpoint = IpEndpoint::default();

        let result = inject(&mut endpoint, "", &snapshot, "crosTest");

        assert!(matches!(result, Err(TrflowError::StoreKeyNotFound { .. })));
    }

    #[test]
    fn test_missing_injection_point_prefix() {
        let snapshot = snapshot_of(json!({"crosTest": {"address": "a", "port": 1}}));
        let mut task = ProvisionTask::default();

        match inject(&mut task, "startupRequest.nope.dutServer", &snapshot, "crosTest") {
            Err(TrflowError::InjectionPointNotFound { point, segment }) => {
                assert_eq!(point, "startupRequest.nope.dutServer");
                assert_eq!(segment, "nope");
            }
            other => panic!("Expected InjectionPointNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let snapshot = snapshot_of(json!({"crosTest": {"address": "a", "port": 1}}));
        let mut request = CrosTestRequest::default();

        let result = inject(&mut request, "companions.0.dutServer", &snapshot, "crosTest");

        assert!(matches!(result, Err(TrflowError::InjectionPointNotFound { .. })));
    }

    #[test]
    fn test_shape_mismatch_leaves_receiver_untouched() {
        let snapshot = snapshot_of(json!({"port": "not a number"}));
        let mut endpoint = IpEndpoint::new("localhost", 1);

        let result = inject(&mut endpoint, "port", &snapshot, "port");

        assert!(matches!(result, Err(TrflowError::ShapeMismatch { .. })));
        assert_eq!(endpoint, IpEndpoint::new("localhost", 1));
    }

    #[test]
    fn test_unknown_field_is_a_shape_mismatch() {
        let snapshot = snapshot_of(json!({"v": 1}));
        let mut endpoint = IpEndpoint::default();

        let result = inject(&mut endpoint, "hostname", &snapshot, "v");

        assert!(matches!(result, Err(TrflowError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_dependencies_apply_in_order() {
        // The append must happen before the indexed write can resolve.
        let snapshot = snapshot_of(json!({
            "device_companionDevice_brya": {"dut": {"id": "brya-1", "board": "brya"}},
            "crosDutServer_companionDevice_brya": {"address": "c", "port": 2}
        }));
        let deps = vec![
            DynamicDep::new("companions", "device_companionDevice_brya"),
            DynamicDep::new("companions.0.dutServer", "crosDutServer_companionDevice_brya"),
        ];
        let mut request = CrosTestRequest::default();

        inject_dependencies(&mut request, &snapshot, &deps).unwrap();

        assert_eq!(request.companions.len(), 1);
        let dut = request.companions[0].dut.as_ref().unwrap();
        assert_eq!(dut.board, "brya");
        assert_eq!(request.companions[0].dut_server, IpEndpoint::new("c", 2));

        // Reversed, the indexed write runs first and fails.
        let mut request = CrosTestRequest::default();
        let reversed: Vec<_> = deps.into_iter().rev().collect();
        let result = inject_dependencies(&mut request, &snapshot, &reversed);
        assert!(matches!(result, Err(TrflowError::InjectionPointNotFound { .. })));
        assert!(request.companions.is_empty());
    }

    #[test]
    fn test_dependencies_stop_at_first_error() {
        let snapshot = snapshot_of(json!({"a": {"address": "a", "port": 1}}));
        let deps = vec![
            DynamicDep::new("serviceAddress", "a"),
            DynamicDep::new("startupRequest.dutServer", "missing"),
            DynamicDep::new("startupRequest.dutServer", "a"),
        ];
        let mut task = ProvisionTask::default();

        let result = inject_dependencies(&mut task, &snapshot, &deps);

        assert!(matches!(result, Err(TrflowError::StoreKeyNotFound { .. })));
        assert_eq!(task.service_address, IpEndpoint::new("a", 1));
        assert_eq!(task.startup_request.dut_server, IpEndpoint::default());
    }

    #[test]
    fn test_live_value_needs_refresh_before_injection() {
        let dut = shared(Dut {
            id: "dut-1".into(),
            board: "brya".into(),
            ..Default::default()
        });
        let mut store = InjectableStore::new();
        store.set_shared("device_primaryDevice", &dut);
        store.load_injectables().unwrap();

        dut.write().unwrap().model = "redrix".into();

        let mut received = Dut::default();
        inject(&mut received, "", store.snapshot(), "device_primaryDevice").unwrap();
        assert_eq!(received.model, "");

        store.load_injectables().unwrap();
        inject(&mut received, "", store.snapshot(), "device_primaryDevice").unwrap();
        assert_eq!(received.model, "redrix");
    }
}
