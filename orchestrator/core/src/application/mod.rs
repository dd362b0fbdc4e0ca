// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod latch;
pub mod poller;
pub mod orchestrator;
pub mod backend_factory;

// Re-export use cases for convenience
pub use backend_factory::{connect_from_config, create_backend, create_resolver};
pub use latch::{LatchTimedOut, ProgressLatch};
pub use orchestrator::{DeploymentOrchestrator, OrchestratorSettings};
pub use poller::{PollOutcome, PollPolicy, Poller};
