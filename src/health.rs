//! Connection health record shared between the read loop and readers.
//!
//! Writers apply a read-modify-write under an exclusive lock; readers get
//! a copy, so no caller ever observes a half-updated record.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time copy of a connector's health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub connected: bool,
    /// Time of the last message received from the venue.
    pub last_activity: Option<DateTime<Utc>>,
    pub message_count: u64,
    pub error_count: u64,
    /// Time of the last transition to disconnected.
    pub reconnect_time: Option<DateTime<Utc>>,
}

/// Owner of a connector's [`HealthStatus`].
#[derive(Debug, Default)]
pub struct HealthTracker {
    status: RwLock<HealthStatus>,
}

impl HealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> HealthStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HealthStatus)) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }

    /// Marks the connection up or down; going down stamps `reconnect_time`.
    pub fn set_connected(&self, connected: bool) {
        self.update(|status| {
            status.connected = connected;
            if !connected {
                status.reconnect_time = Some(Utc::now());
            }
        });
    }

    /// Counts one inbound message and refreshes the activity timestamp.
    pub fn record_message(&self) {
        self.update(|status| {
            status.message_count += 1;
            status.last_activity = Some(Utc::now());
        });
    }

    pub fn record_error(&self) {
        self.update(|status| status.error_count += 1);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }
}
