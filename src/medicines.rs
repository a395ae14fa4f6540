//! Medicine service: the add / edit / delete / mark-taken flows.
//!
//! Every write that changes a medicine's schedule or stock goes through
//! `AlarmRegistry::schedule_all` afterwards, so alarms always mirror the
//! stored record. A missing exact-alarm permission never fails the save; it
//! comes back as `permission_required` for the host to act on.

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::DatabaseError;
use crate::models::*;
use crate::reminders::keys::MAX_DOSE_SLOTS;
use crate::reminders::recurrence::parse_dose_time;
use crate::reminders::registry::{AlarmRegistry, ScheduleReport};
use crate::reminders::traits::{Clock, MedicineStore};
use crate::reminders::ReminderError;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub medicine: Medicine,
    /// `None` when scheduling was refused for lack of permission.
    pub schedule: Option<ScheduleReport>,
    pub permission_required: bool,
}

/// Result of marking one dose as taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeRecord {
    pub medicine: Medicine,
    pub entry: MedicineHistoryEntry,
    pub dose_time: String,
    pub schedule: Option<ScheduleReport>,
    pub permission_required: bool,
}

// ═══════════════════════════════════════════
// Dose availability
// ═══════════════════════════════════════════

/// Whether `dose_time` has been reached on the day of `now`.
pub fn is_dose_time_passed(dose_time: &str, now: NaiveTime) -> bool {
    parse_dose_time(dose_time).is_some_and(|t| now >= t)
}

/// First dose, in configured order, whose time has passed today and that is
/// not yet taken.
pub fn next_available_dose<'a>(
    times: &'a [String],
    taken_today: &[String],
    now: NaiveTime,
) -> Option<&'a str> {
    times
        .iter()
        .find(|t| is_dose_time_passed(t, now) && !taken_today.contains(t))
        .map(String::as_str)
}

// ═══════════════════════════════════════════
// MedicineService
// ═══════════════════════════════════════════

pub struct MedicineService {
    store: Arc<dyn MedicineStore>,
    registry: Arc<AlarmRegistry>,
    clock: Arc<dyn Clock>,
}

impl MedicineService {
    pub fn new(
        store: Arc<dyn MedicineStore>,
        registry: Arc<AlarmRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    pub fn add_medicine(&self, mut new: NewMedicine) -> Result<SaveOutcome, ReminderError> {
        new.name = new.name.trim().to_string();
        new.dosage = new.dosage.trim().to_string();
        new.times = trim_times(new.times);
        validate(&new.name, &new.dosage, &new.times, &new.recurrence)?;
        new.current_quantity = clamp_quantity(new.current_quantity);

        let medicine = self.store.insert(&new)?;
        info!(medicine_id = medicine.id, name = %medicine.name, "Medicine added");
        self.saved(medicine)
    }

    pub fn update_medicine(&self, mut medicine: Medicine) -> Result<SaveOutcome, ReminderError> {
        medicine.name = medicine.name.trim().to_string();
        medicine.dosage = medicine.dosage.trim().to_string();
        medicine.times = trim_times(medicine.times);
        validate(
            &medicine.name,
            &medicine.dosage,
            &medicine.times,
            &medicine.recurrence,
        )?;
        medicine.current_quantity = clamp_quantity(medicine.current_quantity);

        self.store
            .update(&medicine)
            .map_err(|e| not_found_as(e, medicine.id))?;
        info!(medicine_id = medicine.id, "Medicine updated");
        self.saved(medicine)
    }

    /// Cancel the medicine's alarms, then delete it along with its history.
    pub fn delete_medicine(&self, id: i64) -> Result<(), ReminderError> {
        if self.store.get_by_id(id)?.is_none() {
            return Err(ReminderError::MedicineNotFound(id));
        }
        self.registry.cancel(id)?;
        self.store.delete(id).map_err(|e| not_found_as(e, id))?;
        info!(medicine_id = id, "Medicine deleted");
        Ok(())
    }

    pub fn get_medicine(&self, id: i64) -> Result<Medicine, ReminderError> {
        self.store
            .get_by_id(id)?
            .ok_or(ReminderError::MedicineNotFound(id))
    }

    pub fn list_medicines(&self) -> Result<Vec<Medicine>, ReminderError> {
        Ok(self.store.get_all()?)
    }

    /// Record one intake.
    ///
    /// With `dose_time` set, that dose is taken (it must be configured and not
    /// yet taken today). Without it, the next available dose is used.
    pub fn mark_taken(
        &self,
        id: i64,
        dose_time: Option<&str>,
    ) -> Result<IntakeRecord, ReminderError> {
        let mut medicine = self.get_medicine(id)?;
        let now = self.clock.now();
        let today = now.date_naive();
        let mut taken = medicine.taken_today(today).to_vec();

        let dose = match dose_time {
            Some(t) => {
                if !medicine.times.iter().any(|configured| configured == t) {
                    return Err(no_dose(id, format!("{t} is not a configured dose time")));
                }
                if taken.iter().any(|done| done == t) {
                    return Err(no_dose(id, format!("{t} already taken today")));
                }
                t.to_string()
            }
            None => next_available_dose(&medicine.times, &taken, now.time())
                .map(String::from)
                .ok_or_else(|| no_dose(id, "no pending dose has come due yet".into()))?,
        };

        taken.push(dose.clone());
        medicine.taken_times_today = taken;
        medicine.last_taken_date = Some(today);
        medicine.current_quantity = medicine.current_quantity.map(|q| (q - 1).max(0));

        let entry = self.store.record_intake(
            &medicine,
            &NewHistoryEntry {
                medicine_id: id,
                taken_at: now.with_timezone(&Utc),
                dosage_taken: medicine.dosage.clone(),
            },
        )?;

        info!(
            medicine_id = id,
            dose_time = %dose,
            remaining = ?medicine.current_quantity,
            "Dose marked as taken"
        );

        let (schedule, permission_required) = self.reschedule(&medicine)?;
        Ok(IntakeRecord {
            medicine,
            entry,
            dose_time: dose,
            schedule,
            permission_required,
        })
    }

    /// Intake history, newest first.
    pub fn history(&self, id: i64) -> Result<Vec<MedicineHistoryEntry>, ReminderError> {
        Ok(self.store.get_history_for(id)?)
    }

    pub fn clear_history(&self, id: i64) -> Result<usize, ReminderError> {
        let removed = self.store.delete_history_for(id)?;
        info!(medicine_id = id, removed, "History cleared");
        Ok(removed)
    }

    fn saved(&self, medicine: Medicine) -> Result<SaveOutcome, ReminderError> {
        let (schedule, permission_required) = self.reschedule(&medicine)?;
        Ok(SaveOutcome {
            medicine,
            schedule,
            permission_required,
        })
    }

    fn reschedule(
        &self,
        medicine: &Medicine,
    ) -> Result<(Option<ScheduleReport>, bool), ReminderError> {
        match self.registry.schedule_all(medicine) {
            Ok(report) => Ok((Some(report), false)),
            Err(e) if e.is_permission_required() => {
                warn!(medicine_id = medicine.id, "Saved without alarms: exact alarm permission missing");
                Ok((None, true))
            }
            Err(e) => Err(e),
        }
    }
}

// ═══════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════

fn trim_times(times: Vec<String>) -> Vec<String> {
    times.into_iter().map(|t| t.trim().to_string()).collect()
}

fn clamp_quantity(quantity: Option<i32>) -> Option<i32> {
    quantity.map(|q| q.max(0))
}

fn validate(
    name: &str,
    dosage: &str,
    times: &[String],
    recurrence: &Recurrence,
) -> Result<(), ReminderError> {
    let invalid = |msg: String| -> Result<(), ReminderError> { Err(ReminderError::InvalidMedicine(msg)) };

    if name.is_empty() {
        return invalid("name is required".into());
    }
    if dosage.is_empty() {
        return invalid("dosage is required".into());
    }
    if times.is_empty() {
        return invalid("at least one dose time is required".into());
    }
    if times.len() > MAX_DOSE_SLOTS {
        return invalid(format!("at most {MAX_DOSE_SLOTS} dose times are allowed"));
    }
    for (i, t) in times.iter().enumerate() {
        if parse_dose_time(t).is_none() {
            return invalid(format!("dose time {t:?} is not HH:MM"));
        }
        if times[..i].contains(t) {
            return invalid(format!("dose time {t} is listed twice"));
        }
    }
    if matches!(recurrence, Recurrence::SpecificDays(days) if days.is_empty()) {
        return invalid("pick at least one weekday".into());
    }
    Ok(())
}

fn no_dose(medicine_id: i64, reason: String) -> ReminderError {
    ReminderError::NoDoseDue {
        medicine_id,
        reason,
    }
}

fn not_found_as(e: DatabaseError, id: i64) -> ReminderError {
    match e {
        DatabaseError::NotFound { .. } => ReminderError::MedicineNotFound(id),
        other => other.into(),
    }
}
