// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::management::ManagementConnection;
use crate::domain::module::TargetSet;

/// Live connection state for one backend.
///
/// Owns the management connection, an optional separate telemetry connection
/// used for listing queries, and the target set resolved at connect time.
/// A session belongs to exactly one orchestrator.
pub struct Session {
    id: Uuid,
    management: Arc<dyn ManagementConnection>,
    telemetry: Option<Arc<dyn ManagementConnection>>,
    targets: TargetSet,
    opened_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        management: Arc<dyn ManagementConnection>,
        telemetry: Option<Arc<dyn ManagementConnection>>,
        targets: TargetSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            management,
            telemetry,
            targets,
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn management(&self) -> &Arc<dyn ManagementConnection> {
        &self.management
    }

    pub fn telemetry(&self) -> Option<&Arc<dyn ManagementConnection>> {
        self.telemetry.as_ref()
    }

    /// Connection used for listing queries: telemetry when configured, otherwise management
    pub fn listing_connection(&self) -> &Arc<dyn ManagementConnection> {
        self.telemetry.as_ref().unwrap_or(&self.management)
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    /// Close every connection the session holds.
    ///
    /// Never fails: a connection that refuses to close is logged and the
    /// remaining ones are still released.
    pub async fn close(&self) {
        if let Some(telemetry) = &self.telemetry {
            if let Err(e) = telemetry.close().await {
                warn!(session_id = %self.id, error = %e, "Failed to close telemetry connection");
            }
        }

        if let Err(e) = self.management.close().await {
            warn!(session_id = %self.id, error = %e, "Failed to close management connection");
        }

        let open_ms = (Utc::now() - self.opened_at).num_milliseconds();
        debug!(session_id = %self.id, open_ms, "Session connections released");
    }
}
