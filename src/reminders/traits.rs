//! Trait definitions for the reminder engine's collaborators.
//!
//! Five traits define the boundary with the host:
//! - MedicineStore: medicine and intake-history persistence
//! - AlarmFacility: exact one-shot wake-ups
//! - NotificationSurface: user-visible notifications
//! - ScheduleReporter: scheduling outcomes (toast, log)
//! - Clock: current local time

use chrono::{DateTime, Local};

use super::error::ReminderError;
use super::keys::AlarmKey;
use super::notification::Notification;
use super::registry::ScheduleNotice;
use crate::db::DatabaseError;
use crate::models::*;

/// Snapshot access to stored medicines and their history.
pub trait MedicineStore: Send + Sync {
    /// Insert and return the stored medicine with its assigned id.
    fn insert(&self, medicine: &NewMedicine) -> Result<Medicine, DatabaseError>;

    fn update(&self, medicine: &Medicine) -> Result<(), DatabaseError>;

    /// Delete a medicine and, by cascade, its history.
    fn delete(&self, id: i64) -> Result<(), DatabaseError>;

    fn get_by_id(&self, id: i64) -> Result<Option<Medicine>, DatabaseError>;

    /// All medicines, ordered by name.
    fn get_all(&self) -> Result<Vec<Medicine>, DatabaseError>;

    /// Append a history entry and save `medicine` atomically.
    fn record_intake(
        &self,
        medicine: &Medicine,
        entry: &NewHistoryEntry,
    ) -> Result<MedicineHistoryEntry, DatabaseError>;

    /// History for one medicine, newest first.
    fn get_history_for(&self, medicine_id: i64) -> Result<Vec<MedicineHistoryEntry>, DatabaseError>;

    /// Returns the number of entries removed.
    fn delete_history_for(&self, medicine_id: i64) -> Result<usize, DatabaseError>;
}

/// The host's exact-alarm scheduler.
pub trait AlarmFacility: Send + Sync {
    /// Whether exact wake-ups are currently permitted.
    fn can_schedule_exact(&self) -> bool;

    /// Register a wake-up, replacing any existing one with the same key.
    fn set_exact(&self, alarm: ScheduledAlarm) -> Result<(), ReminderError>;

    /// Remove a wake-up. Unknown keys are a no-op.
    fn cancel(&self, key: AlarmKey) -> Result<(), ReminderError>;
}

pub trait NotificationSurface: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), ReminderError>;
}

/// Receives every scheduling outcome. Not part of the scheduling contract.
pub trait ScheduleReporter: Send + Sync {
    fn report(&self, notice: &ScheduleNotice);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_store(_: &dyn MedicineStore) {}
        fn _assert_facility(_: &dyn AlarmFacility) {}
        fn _assert_surface(_: &dyn NotificationSurface) {}
        fn _assert_reporter(_: &dyn ScheduleReporter) {}
        fn _assert_clock(_: &dyn Clock) {}
    }
}
