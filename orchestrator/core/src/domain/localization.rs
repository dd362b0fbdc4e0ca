// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

/// Formats human-readable diagnostics.
///
/// Purely presentational: nothing in the lifecycle consults the output.
pub trait Localizer: Send + Sync {
    /// Render the message identified by `code`, falling back to `template`
    fn localize(&self, code: &str, template: &str, args: &serde_json::Value) -> String;
}
