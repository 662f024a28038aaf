// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Utility modules
//!
//! Common utilities for the trflow CLI.

pub mod colors;

pub use colors::*;
