// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod proxy;
pub mod deployer;
pub mod adapters;
pub mod jolokia;
pub mod in_memory;
pub mod artifact;
pub mod localizer;

pub use adapters::{ListingAdapter, NotifyingAdapter};
pub use artifact::{FileNameResolver, FileUrlResolver};
pub use in_memory::{InMemoryConnectionProvider, InMemoryManagementServer};
pub use jolokia::JolokiaConnectionProvider;
pub use localizer::TemplateLocalizer;
