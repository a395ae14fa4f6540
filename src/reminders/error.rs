//! Error types for the reminder engine.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The host has not granted exact-alarm capability. Nothing was scheduled.
    #[error("Exact alarm permission not granted (medicine {medicine_id})")]
    ExactAlarmDenied { medicine_id: i64 },

    #[error("Alarm facility error: {0}")]
    Facility(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Medicine not found: {0}")]
    MedicineNotFound(i64),

    #[error("No dose due for medicine {medicine_id}: {reason}")]
    NoDoseDue { medicine_id: i64, reason: String },

    #[error("Invalid medicine: {0}")]
    InvalidMedicine(String),

    #[error("Wake-up handling exceeded its {0:?} execution window")]
    ExecutionWindowElapsed(Duration),

    /// The execution window closed; remaining alarm changes were skipped.
    #[error("Wake-up work abandoned")]
    WorkAbandoned,

    #[error("Wake-up handler panicked: {0}")]
    HandlerPanicked(String),
}

impl ReminderError {
    /// True when the caller should prompt the user for the exact-alarm permission.
    pub fn is_permission_required(&self) -> bool {
        matches!(self, Self::ExactAlarmDenied { .. })
    }
}
