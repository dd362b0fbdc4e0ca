// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Progress Latch
//!
//! One-shot gate between a backend's progress stream and an awaiting lifecycle step.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Turns 0..N progress events into a single bounded wait
//!
//! The first terminal event releases the latch; every later release is
//! ignored. A release that happens before anyone waits is still observed,
//! because waiting checks the stored value before suspending.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::progress::{ProgressEvent, ProgressHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("progress latch not released within {}ms", .timeout.as_millis())]
pub struct LatchTimedOut {
    pub timeout: Duration,
}

/// Single-use gate released by the first terminal [`ProgressEvent`].
///
/// Clones share the same gate. Build a fresh latch per lifecycle step.
#[derive(Clone)]
pub struct ProgressLatch {
    state: Arc<watch::Sender<Option<ProgressEvent>>>,
}

impl ProgressLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { state: Arc::new(tx) }
    }

    /// Release the latch with `event`. Returns false if it was already released.
    pub fn release(&self, event: ProgressEvent) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(event);
            true
        })
    }

    pub fn is_released(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Wait until released, or fail once `timeout` has elapsed.
    pub async fn wait(&self, timeout: Duration) -> Result<ProgressEvent, LatchTimedOut> {
        let mut rx = self.state.subscribe();
        let released = tokio::time::timeout(timeout, async {
            // The sender lives as long as `self`, so the channel cannot close here
            match rx.wait_for(Option::is_some).await {
                Ok(value) => (*value).clone(),
                Err(_) => None,
            }
        })
        .await;

        match released {
            Ok(Some(event)) => Ok(event),
            _ => Err(LatchTimedOut { timeout }),
        }
    }

    /// Feed a backend's progress handle into this latch.
    ///
    /// A completed handle releases immediately. A streaming handle is drained
    /// by a background task until its first terminal event; the returned task
    /// should be aborted once the wait is over. A stream that closes without a
    /// terminal event releases the latch as failed.
    pub fn attach(&self, handle: ProgressHandle) -> Option<JoinHandle<()>> {
        match handle {
            ProgressHandle::Completed(event) => {
                self.release(event);
                None
            }
            ProgressHandle::Streaming(mut events) => {
                let latch = self.clone();
                Some(tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if event.is_terminal() {
                            latch.release(event);
                            return;
                        }
                        debug!(
                            module = ?event.module.as_ref().map(|m| m.as_str()),
                            message = %event.message,
                            "Progress"
                        );
                    }
                    latch.release(ProgressEvent::failed(
                        None,
                        "progress stream closed before a terminal event",
                    ));
                }))
            }
        }
    }
}

impl Default for ProgressLatch {
    fn default() -> Self {
        Self::new()
    }
}
