// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Stevedore CLI

pub mod config;
pub mod lifecycle;

pub use self::config::ConfigCommand;
pub use self::lifecycle::LifecycleCommand;
