//! Execution leases for wake-up work.
//!
//! A wake-up callback must not return before its asynchronous work is done
//! or abandoned. The receiver takes an `ExecutionLease` synchronously and
//! moves it into the spawned task; dropping the lease releases it, whether
//! the task finished, failed, panicked or timed out.
//!
//! Work that outlives its window is told to stop through an `AbandonSignal`,
//! so nothing unleased keeps changing alarm state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::error::ReminderError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Snapshot of one held lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveLease {
    pub id: Uuid,
    /// Event kind the lease was taken for.
    pub kind: &'static str,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Default)]
struct LeaseState {
    active: Mutex<HashMap<Uuid, ActiveLease>>,
    issued: Mutex<u64>,
}

impl LeaseState {
    fn active(&self) -> MutexGuard<'_, HashMap<Uuid, ActiveLease>> {
        // A panic while holding the map cannot leave it half-updated.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ═══════════════════════════════════════════════════════════
// LeaseTracker
// ═══════════════════════════════════════════════════════════

/// Issues leases and tracks which are held. Cheap to clone.
#[derive(Clone, Default)]
pub struct LeaseTracker {
    state: Arc<LeaseState>,
}

impl LeaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, kind: &'static str) -> ExecutionLease {
        let lease = ActiveLease {
            id: Uuid::new_v4(),
            kind,
            acquired_at: Utc::now(),
        };
        let id = lease.id;
        self.state.active().insert(id, lease);
        *self.state.issued.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        debug!(lease_id = %id, kind, "Execution lease acquired");
        ExecutionLease {
            id,
            kind,
            started: Instant::now(),
            state: Arc::clone(&self.state),
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.active().len()
    }

    pub fn active_leases(&self) -> Vec<ActiveLease> {
        let mut leases: Vec<_> = self.state.active().values().cloned().collect();
        leases.sort_by_key(|l| l.acquired_at);
        leases
    }

    /// Leases issued since the tracker was created.
    pub fn total_issued(&self) -> u64 {
        *self.state.issued.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ═══════════════════════════════════════════════════════════
// ExecutionLease: RAII permit
// ═══════════════════════════════════════════════════════════

/// Held for the lifetime of one wake-up's work. Released on drop.
pub struct ExecutionLease {
    id: Uuid,
    kind: &'static str,
    started: Instant,
    state: Arc<LeaseState>,
}

impl ExecutionLease {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        self.state.active().remove(&self.id);
        debug!(
            lease_id = %self.id,
            kind = self.kind,
            held_ms = self.started.elapsed().as_millis() as u64,
            "Execution lease released"
        );
    }
}

// ═══════════════════════════════════════════════════════════
// AbandonSignal
// ═══════════════════════════════════════════════════════════

/// Raised once the receiver gives up on a piece of wake-up work.
#[derive(Debug, Clone, Default)]
pub struct AbandonSignal(Arc<AtomicBool>);

impl AbandonSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abandon(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(WorkAbandoned)` once raised.
    pub fn ensure_live(&self) -> Result<(), ReminderError> {
        if self.is_abandoned() {
            return Err(ReminderError::WorkAbandoned);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
