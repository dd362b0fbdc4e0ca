// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::module::ModuleIdentity;

/// Progress reported by a backend while a lifecycle step executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub module: Option<ModuleIdentity>,
    pub completed: bool,
    pub failed: bool,
    pub message: String,
}

impl ProgressEvent {
    pub fn running(module: Option<ModuleIdentity>, message: impl Into<String>) -> Self {
        Self { module, completed: false, failed: false, message: message.into() }
    }

    pub fn completed(module: Option<ModuleIdentity>, message: impl Into<String>) -> Self {
        Self { module, completed: true, failed: false, message: message.into() }
    }

    pub fn failed(module: Option<ModuleIdentity>, message: impl Into<String>) -> Self {
        Self { module, completed: false, failed: true, message: message.into() }
    }

    /// Terminal events end a step, successfully or not
    pub fn is_terminal(&self) -> bool {
        self.completed || self.failed
    }
}

pub type ProgressSender = mpsc::Sender<ProgressEvent>;

/// What a backend hands back after a mutating call has been issued.
///
/// Synchronous backends return `Completed` once the call has returned;
/// event-driven backends return `Streaming` and push events as they arrive.
#[derive(Debug)]
pub enum ProgressHandle {
    Completed(ProgressEvent),
    Streaming(mpsc::Receiver<ProgressEvent>),
}

impl ProgressHandle {
    pub fn completed(module: Option<ModuleIdentity>, message: impl Into<String>) -> Self {
        ProgressHandle::Completed(ProgressEvent::completed(module, message))
    }

    /// Open a streaming handle; events sent on the returned sender reach the handle
    pub fn channel(buffer: usize) -> (ProgressSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, ProgressHandle::Streaming(rx))
    }
}
