//! Alarm registry: keeps a medicine's wake-ups in step with its schedule.
//!
//! Scheduling is always cancel-then-recreate. Two `schedule_all` calls racing
//! for the same medicine leave one alarm per slot because `set_exact`
//! replaces by key.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ReminderError;
use super::keys::{AlarmKey, MAX_DOSE_SLOTS};
use super::lease::AbandonSignal;
use super::recurrence::{next_fire_time, next_refill_check};
use super::threshold::needs_refill_alert;
use super::traits::{AlarmFacility, Clock, ScheduleReporter};
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Bad time string, empty weekday set, or no allowed day in range.
    Unresolvable,
    /// Index beyond `MAX_DOSE_SLOTS`, or no longer in the medicine's times.
    SlotLimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSlot {
    pub index: usize,
    pub dose_time: String,
    pub reason: SkipReason,
}

/// What one `schedule_all` run registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub medicine_id: i64,
    pub scheduled: Vec<ScheduledAlarm>,
    pub skipped: Vec<SkippedSlot>,
    pub refill: Option<ScheduledAlarm>,
}

impl ScheduleReport {
    fn new(medicine_id: i64) -> Self {
        Self {
            medicine_id,
            scheduled: Vec::new(),
            skipped: Vec::new(),
            refill: None,
        }
    }

    /// Fire time of the dose alarm for `slot`, if one was armed.
    pub fn fire_at(&self, slot: usize) -> Option<DateTime<Utc>> {
        self.scheduled
            .iter()
            .find(|a| a.key == AlarmKey::dose(self.medicine_id, slot))
            .map(|a| a.fire_at)
    }
}

/// Scheduling outcomes sent to the host's reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScheduleNotice {
    Scheduled {
        key: AlarmKey,
        fire_at: DateTime<Utc>,
    },
    Skipped {
        medicine_id: i64,
        slot: SkippedSlot,
    },
    /// Exact alarms are not permitted. The host should prompt the user.
    PermissionRequired { medicine_id: i64 },
    Cancelled { medicine_id: i64 },
}

/// Logs every notice through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ScheduleReporter for TracingReporter {
    fn report(&self, notice: &ScheduleNotice) {
        match notice {
            ScheduleNotice::Scheduled { key, fire_at } => {
                info!(key = %key, fire_at = %fire_at, "Alarm scheduled");
            }
            ScheduleNotice::Skipped { medicine_id, slot } => {
                warn!(
                    medicine_id,
                    index = slot.index,
                    dose_time = %slot.dose_time,
                    reason = ?slot.reason,
                    "Dose slot skipped"
                );
            }
            ScheduleNotice::PermissionRequired { medicine_id } => {
                warn!(medicine_id, "Exact alarm permission required");
            }
            ScheduleNotice::Cancelled { medicine_id } => {
                debug!(medicine_id, "Alarms cancelled");
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Maps (medicine, slot) and (medicine, refill) onto exact wake-ups.
pub struct AlarmRegistry {
    facility: Arc<dyn AlarmFacility>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ScheduleReporter>,
    refill_time: NaiveTime,
}

impl AlarmRegistry {
    pub fn new(
        facility: Arc<dyn AlarmFacility>,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn ScheduleReporter>,
        refill_time: NaiveTime,
    ) -> Self {
        Self {
            facility,
            clock,
            reporter,
            refill_time,
        }
    }

    pub fn refill_time(&self) -> NaiveTime {
        self.refill_time
    }

    /// Replace every wake-up of `medicine` with freshly resolved ones.
    ///
    /// Existing alarms are cancelled first, even when the permission check
    /// then fails, so a denied medicine never keeps stale alarms.
    pub fn schedule_all(&self, medicine: &Medicine) -> Result<ScheduleReport, ReminderError> {
        self.schedule_all_until(medicine, &AbandonSignal::new())
    }

    /// `schedule_all` that stops touching alarms once `signal` is raised.
    pub fn schedule_all_until(
        &self,
        medicine: &Medicine,
        signal: &AbandonSignal,
    ) -> Result<ScheduleReport, ReminderError> {
        signal.ensure_live()?;
        self.cancel(medicine.id)?;
        self.ensure_permission(medicine.id)?;

        let now = self.clock.now();
        let mut report = ScheduleReport::new(medicine.id);

        for (index, dose_time) in medicine.times.iter().enumerate() {
            if index >= MAX_DOSE_SLOTS {
                let slot = self.skip(medicine.id, index, dose_time, SkipReason::SlotLimitExceeded);
                report.skipped.push(slot);
                continue;
            }
            match dose_alarm(medicine, index, &now) {
                Some(alarm) => {
                    self.arm(&alarm, signal)?;
                    report.scheduled.push(alarm);
                }
                None => {
                    let slot = self.skip(medicine.id, index, dose_time, SkipReason::Unresolvable);
                    report.skipped.push(slot);
                }
            }
        }

        if let Some(alarm) = self.refill_alarm(medicine, &now) {
            self.arm(&alarm, signal)?;
            report.refill = Some(alarm);
        }

        info!(
            medicine_id = medicine.id,
            scheduled = report.scheduled.len(),
            skipped = report.skipped.len(),
            refill = report.refill.is_some(),
            "Medicine schedule armed"
        );
        Ok(report)
    }

    /// Re-arm a single dose slot. `Ok(None)` when the slot cannot be resolved.
    pub fn schedule_slot(
        &self,
        medicine: &Medicine,
        index: usize,
    ) -> Result<Option<DateTime<Utc>>, ReminderError> {
        self.schedule_slot_until(medicine, index, &AbandonSignal::new())
    }

    pub fn schedule_slot_until(
        &self,
        medicine: &Medicine,
        index: usize,
        signal: &AbandonSignal,
    ) -> Result<Option<DateTime<Utc>>, ReminderError> {
        self.ensure_permission(medicine.id)?;

        let Some(dose_time) = medicine.times.get(index) else {
            self.skip(medicine.id, index, "", SkipReason::SlotLimitExceeded);
            return Ok(None);
        };
        if index >= MAX_DOSE_SLOTS {
            self.skip(medicine.id, index, dose_time, SkipReason::SlotLimitExceeded);
            return Ok(None);
        }

        let now = self.clock.now();
        match dose_alarm(medicine, index, &now) {
            Some(alarm) => {
                let fire_at = alarm.fire_at;
                self.arm(&alarm, signal)?;
                Ok(Some(fire_at))
            }
            None => {
                self.skip(medicine.id, index, dose_time, SkipReason::Unresolvable);
                Ok(None)
            }
        }
    }

    /// Cancel every dose slot and the refill alarm for `medicine_id`.
    pub fn cancel(&self, medicine_id: i64) -> Result<(), ReminderError> {
        for key in AlarmKey::all_for(medicine_id) {
            self.facility.cancel(key)?;
        }
        self.reporter
            .report(&ScheduleNotice::Cancelled { medicine_id });
        Ok(())
    }

    fn ensure_permission(&self, medicine_id: i64) -> Result<(), ReminderError> {
        if self.facility.can_schedule_exact() {
            return Ok(());
        }
        self.reporter
            .report(&ScheduleNotice::PermissionRequired { medicine_id });
        Err(ReminderError::ExactAlarmDenied { medicine_id })
    }

    fn arm(&self, alarm: &ScheduledAlarm, signal: &AbandonSignal) -> Result<(), ReminderError> {
        signal.ensure_live()?;
        self.facility.set_exact(alarm.clone())?;
        self.reporter.report(&ScheduleNotice::Scheduled {
            key: alarm.key,
            fire_at: alarm.fire_at,
        });
        Ok(())
    }

    fn skip(&self, medicine_id: i64, index: usize, dose_time: &str, reason: SkipReason) -> SkippedSlot {
        let slot = SkippedSlot {
            index,
            dose_time: dose_time.to_string(),
            reason,
        };
        self.reporter.report(&ScheduleNotice::Skipped {
            medicine_id,
            slot: slot.clone(),
        });
        slot
    }

    fn refill_alarm(&self, medicine: &Medicine, now: &DateTime<Local>) -> Option<ScheduledAlarm> {
        if !needs_refill_alert(medicine) {
            return None;
        }
        let current_quantity = medicine.current_quantity?;
        let refill_threshold = medicine.refill_threshold?;
        let fire_at = next_refill_check(now, self.refill_time)?;
        Some(ScheduledAlarm {
            key: AlarmKey::refill(medicine.id),
            fire_at: fire_at.with_timezone(&Utc),
            payload: AlarmPayload::Refill(RefillPayload {
                medicine_id: medicine.id,
                name: medicine.name.clone(),
                current_quantity,
                refill_threshold,
            }),
        })
    }
}

fn dose_alarm(medicine: &Medicine, index: usize, now: &DateTime<Local>) -> Option<ScheduledAlarm> {
    let dose_time = medicine.times.get(index)?;
    let fire_at = next_fire_time(dose_time, &medicine.recurrence, now)?;
    Some(ScheduledAlarm {
        key: AlarmKey::dose(medicine.id, index),
        fire_at: fire_at.with_timezone(&Utc),
        payload: AlarmPayload::Dose(DosePayload {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            dose_time: dose_time.clone(),
        }),
    })
}
