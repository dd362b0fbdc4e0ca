// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Lifecycle types and the seams every backend is reached through.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and traits; no wire protocols

pub mod module;
pub mod progress;
pub mod management;
pub mod session;
pub mod backend;
pub mod artifact;
pub mod errors;
pub mod localization;
pub mod config;
