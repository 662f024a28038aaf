// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Task graphs
//!
//! A [`TestRequest`] goes in, a [`Request`] of ordered tasks comes out. Each
//! task carries the dynamic deps the resolver fills in at run time.

pub mod catalog;
mod constructor;
mod dag;
mod definition;
pub mod metadata;
mod test_request;
mod validation;

pub use catalog::ContainerKind;
pub use constructor::{
    build, derive_build_target, RequestConstructor, TestRequestConstructor, BUILD_TARGET_KEYVAL,
    COMPANION_BOARDS_KEYVAL, PRIMARY_BOARD_KEYVAL,
};
pub use dag::{DependencyDag, ForwardReference};
pub use definition::*;
pub use metadata::{AnyPayload, TypedMessage};
pub use test_request::{DutSpec, Infra, StepsConfig, TestRequest};
pub use validation::{GraphValidator, ValidationResult};
