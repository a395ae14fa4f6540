use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminders::keys::AlarmKey;

/// Carried by a dose wake-up; enough to render the notification without a store read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosePayload {
    pub medicine_id: i64,
    pub name: String,
    pub dosage: String,
    pub dose_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillPayload {
    pub medicine_id: i64,
    pub name: String,
    pub current_quantity: i32,
    pub refill_threshold: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlarmPayload {
    Dose(DosePayload),
    Refill(RefillPayload),
}

impl AlarmPayload {
    pub fn medicine_id(&self) -> i64 {
        match self {
            Self::Dose(p) => p.medicine_id,
            Self::Refill(p) => p.medicine_id,
        }
    }
}

/// One-shot wake-up handed to the alarm facility. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub key: AlarmKey,
    pub fire_at: DateTime<Utc>,
    pub payload: AlarmPayload,
}
