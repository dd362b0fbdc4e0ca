// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stevedore Core
//!
//! Deployment lifecycle orchestration over heterogeneous management backends.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Deploy, undeploy, start and stop application archives with one awaited contract per operation

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
