// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Template Localizer
//!
//! Renders lifecycle diagnostics from Handlebars templates.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Concrete [`Localizer`] with per-code template overrides
//!
//! # Placeholders
//!
//! - `{{module}}` - Module identity
//! - `{{step}}` - Lifecycle step
//! - `{{elapsed_ms}}` - Elapsed milliseconds
//! - `{{cause}}` - Failure cause

use handlebars::Handlebars;
use std::collections::HashMap;
use tracing::warn;

use crate::domain::localization::Localizer;

pub struct TemplateLocalizer {
    handlebars: Handlebars<'static>,
    catalog: HashMap<String, String>,
}

impl TemplateLocalizer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Plain-text output; module names must not be HTML-escaped
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars, catalog: HashMap::new() }
    }

    /// Replace the template used for `code`
    pub fn with_message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.catalog.insert(code.into(), template.into());
        self
    }

    pub fn with_catalog(mut self, catalog: HashMap<String, String>) -> Self {
        self.catalog.extend(catalog);
        self
    }
}

impl Default for TemplateLocalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Localizer for TemplateLocalizer {
    fn localize(&self, code: &str, template: &str, args: &serde_json::Value) -> String {
        let template = self.catalog.get(code).map(String::as_str).unwrap_or(template);
        match self.handlebars.render_template(template, args) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(code, error = %e, "Failed to render message template");
                template.to_string()
            }
        }
    }
}
