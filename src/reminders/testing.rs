//! Test doubles shared by the reminder tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

use super::error::ReminderError;
use super::keys::AlarmKey;
use super::notification::Notification;
use super::registry::{AlarmRegistry, ScheduleNotice};
use super::store::SqliteMedicineStore;
use super::traits::*;
use crate::db::DatabaseError;
use crate::models::*;

pub fn local(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, m, d, h, mi, 0)
        .earliest()
        .unwrap()
}

pub fn local_utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    local(y, m, d, h, mi).with_timezone(&Utc)
}

pub fn nine_am() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

/// Alarm facility that keeps armed alarms in a map and counts calls.
pub struct RecordingFacility {
    active: Mutex<HashMap<AlarmKey, ScheduledAlarm>>,
    set_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    permitted: AtomicBool,
}

impl RecordingFacility {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            set_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            permitted: AtomicBool::new(true),
        }
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    pub fn active(&self) -> Vec<ScheduledAlarm> {
        let mut alarms: Vec<_> = self.active.lock().unwrap().values().cloned().collect();
        alarms.sort_by_key(|a| a.key);
        alarms
    }

    pub fn get(&self, key: AlarmKey) -> Option<ScheduledAlarm> {
        self.active.lock().unwrap().get(&key).cloned()
    }

    pub fn active_for(&self, medicine_id: i64) -> usize {
        self.active()
            .iter()
            .filter(|a| a.key.medicine_id() == medicine_id)
            .count()
    }

    pub fn set_count(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl AlarmFacility for RecordingFacility {
    fn can_schedule_exact(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    fn set_exact(&self, alarm: ScheduledAlarm) -> Result<(), ReminderError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().insert(alarm.key, alarm);
        Ok(())
    }

    fn cancel(&self, key: AlarmKey) -> Result<(), ReminderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().remove(&key);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let n = Self::default();
        n.fail.store(true, Ordering::SeqCst);
        n
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSurface for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), ReminderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReminderError::Notification("channel disabled".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    notices: Mutex<Vec<ScheduleNotice>>,
}

impl RecordingReporter {
    pub fn notices(&self) -> Vec<ScheduleNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl ScheduleReporter for RecordingReporter {
    fn report(&self, notice: &ScheduleNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

pub struct FixedClock(Mutex<DateTime<Local>>);

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.0.lock().unwrap()
    }
}

/// Store whose every call fails.
pub struct FailingStore;

fn offline() -> DatabaseError {
    DatabaseError::ConstraintViolation("store offline".into())
}

impl MedicineStore for FailingStore {
    fn insert(&self, _: &NewMedicine) -> Result<Medicine, DatabaseError> {
        Err(offline())
    }
    fn update(&self, _: &Medicine) -> Result<(), DatabaseError> {
        Err(offline())
    }
    fn delete(&self, _: i64) -> Result<(), DatabaseError> {
        Err(offline())
    }
    fn get_by_id(&self, _: i64) -> Result<Option<Medicine>, DatabaseError> {
        Err(offline())
    }
    fn get_all(&self) -> Result<Vec<Medicine>, DatabaseError> {
        Err(offline())
    }
    fn record_intake(
        &self,
        _: &Medicine,
        _: &NewHistoryEntry,
    ) -> Result<MedicineHistoryEntry, DatabaseError> {
        Err(offline())
    }
    fn get_history_for(&self, _: i64) -> Result<Vec<MedicineHistoryEntry>, DatabaseError> {
        Err(offline())
    }
    fn delete_history_for(&self, _: i64) -> Result<usize, DatabaseError> {
        Err(offline())
    }
}

/// Store that sleeps before every read.
pub struct SlowStore {
    pub inner: Arc<dyn MedicineStore>,
    pub delay: Duration,
}

impl MedicineStore for SlowStore {
    fn insert(&self, m: &NewMedicine) -> Result<Medicine, DatabaseError> {
        self.inner.insert(m)
    }
    fn update(&self, m: &Medicine) -> Result<(), DatabaseError> {
        self.inner.update(m)
    }
    fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.inner.delete(id)
    }
    fn get_by_id(&self, id: i64) -> Result<Option<Medicine>, DatabaseError> {
        std::thread::sleep(self.delay);
        self.inner.get_by_id(id)
    }
    fn get_all(&self) -> Result<Vec<Medicine>, DatabaseError> {
        std::thread::sleep(self.delay);
        self.inner.get_all()
    }
    fn record_intake(
        &self,
        m: &Medicine,
        e: &NewHistoryEntry,
    ) -> Result<MedicineHistoryEntry, DatabaseError> {
        self.inner.record_intake(m, e)
    }
    fn get_history_for(&self, id: i64) -> Result<Vec<MedicineHistoryEntry>, DatabaseError> {
        self.inner.get_history_for(id)
    }
    fn delete_history_for(&self, id: i64) -> Result<usize, DatabaseError> {
        self.inner.delete_history_for(id)
    }
}

/// Registry wired to recording doubles, plus handles on each double.
pub struct Harness {
    pub store: Arc<SqliteMedicineStore>,
    pub facility: Arc<RecordingFacility>,
    pub reporter: Arc<RecordingReporter>,
    pub clock: Arc<FixedClock>,
    pub registry: Arc<AlarmRegistry>,
}

impl Harness {
    pub fn at(now: DateTime<Local>) -> Self {
        let store = Arc::new(SqliteMedicineStore::in_memory().unwrap());
        let facility = Arc::new(RecordingFacility::new());
        let reporter = Arc::new(RecordingReporter::default());
        let clock = Arc::new(FixedClock::new(now));
        let registry = Arc::new(AlarmRegistry::new(
            facility.clone(),
            clock.clone(),
            reporter.clone(),
            nine_am(),
        ));
        Self {
            store,
            facility,
            reporter,
            clock,
            registry,
        }
    }

    pub fn add(&self, medicine: NewMedicine) -> Medicine {
        self.store.insert(&medicine).unwrap()
    }
}
