//! Wake-up handler: one run per fired alarm or boot signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ReminderError;
use super::lease::AbandonSignal;
use super::notification::{dose_notification, refill_notification, Notification};
use super::registry::AlarmRegistry;
use super::traits::{MedicineStore, NotificationSurface};
use crate::models::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WakeupEvent {
    DoseDue(DosePayload),
    RefillDue(RefillPayload),
    /// Host restarted; every armed alarm is gone.
    SystemRestarted,
}

impl WakeupEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DoseDue(_) => "dose_due",
            Self::RefillDue(_) => "refill_due",
            Self::SystemRestarted => "system_restarted",
        }
    }
}

impl From<AlarmPayload> for WakeupEvent {
    fn from(payload: AlarmPayload) -> Self {
        match payload {
            AlarmPayload::Dose(p) => Self::DoseDue(p),
            AlarmPayload::Refill(p) => Self::RefillDue(p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandleOutcome {
    DoseNotified {
        medicine_id: i64,
        slot: usize,
        /// `None` when the slot no longer resolves.
        next_fire: Option<DateTime<Utc>>,
    },
    /// The dose time was removed from the medicine after the alarm was set.
    StaleSlot { medicine_id: i64, dose_time: String },
    MedicineMissing { medicine_id: i64 },
    RefillNotified { medicine_id: i64 },
    Rescheduled { medicines: usize, failed: usize },
}

pub struct WakeupHandler {
    store: Arc<dyn MedicineStore>,
    registry: Arc<AlarmRegistry>,
    notifier: Arc<dyn NotificationSurface>,
}

impl WakeupHandler {
    pub fn new(
        store: Arc<dyn MedicineStore>,
        registry: Arc<AlarmRegistry>,
        notifier: Arc<dyn NotificationSurface>,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
        }
    }

    pub fn handle(&self, event: WakeupEvent) -> Result<HandleOutcome, ReminderError> {
        self.handle_until(event, &AbandonSignal::new())
    }

    /// Handle `event`, making no further alarm changes once `signal` is raised.
    pub fn handle_until(
        &self,
        event: WakeupEvent,
        signal: &AbandonSignal,
    ) -> Result<HandleOutcome, ReminderError> {
        match event {
            WakeupEvent::DoseDue(payload) => self.on_dose_due(payload, signal),
            WakeupEvent::RefillDue(payload) => {
                self.post(&refill_notification(&payload));
                Ok(HandleOutcome::RefillNotified {
                    medicine_id: payload.medicine_id,
                })
            }
            WakeupEvent::SystemRestarted => self.on_restart(signal),
        }
    }

    fn on_dose_due(
        &self,
        payload: DosePayload,
        signal: &AbandonSignal,
    ) -> Result<HandleOutcome, ReminderError> {
        self.post(&dose_notification(&payload));

        let medicine_id = payload.medicine_id;
        let Some(medicine) = self.store.get_by_id(medicine_id)? else {
            warn!(medicine_id, "Dose fired for a deleted medicine, not re-arming");
            return Ok(HandleOutcome::MedicineMissing { medicine_id });
        };

        // Match on the time string: slot indices shift when times are edited.
        let Some(slot) = medicine.slot_of(&payload.dose_time) else {
            warn!(
                medicine_id,
                dose_time = %payload.dose_time,
                "Dose time no longer configured, dropping stale slot"
            );
            return Ok(HandleOutcome::StaleSlot {
                medicine_id,
                dose_time: payload.dose_time,
            });
        };

        let next_fire = self.registry.schedule_slot_until(&medicine, slot, signal)?;
        Ok(HandleOutcome::DoseNotified {
            medicine_id,
            slot,
            next_fire,
        })
    }

    fn on_restart(&self, signal: &AbandonSignal) -> Result<HandleOutcome, ReminderError> {
        let medicines = self.store.get_all()?;
        let mut failed = 0;
        for medicine in &medicines {
            match self.registry.schedule_all_until(medicine, signal) {
                Ok(_) => {}
                Err(ReminderError::WorkAbandoned) => return Err(ReminderError::WorkAbandoned),
                Err(e) => {
                    failed += 1;
                    warn!(medicine_id = medicine.id, error = %e, "Re-arm after restart failed");
                }
            }
        }
        info!(medicines = medicines.len(), failed, "Alarms re-armed after restart");
        Ok(HandleOutcome::Rescheduled {
            medicines: medicines.len(),
            failed,
        })
    }

    /// A notification failure is logged and never blocks re-arming.
    fn post(&self, notification: &Notification) {
        if let Err(e) = self.notifier.notify(notification) {
            warn!(id = notification.id, error = %e, "Notification not shown");
        }
    }
}
