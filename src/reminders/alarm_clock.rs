//! In-process exact-alarm facility backed by tokio timers.
//!
//! One task per armed key sleeps until its fire time, then sends the
//! matching `WakeupEvent` on a channel. Nothing survives the process, which
//! is why the runtime replays `SystemRestarted` on start.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::ReminderError;
use super::handler::WakeupEvent;
use super::keys::AlarmKey;
use super::receiver::WakeupReceiver;
use super::traits::AlarmFacility;
use crate::models::ScheduledAlarm;

struct ArmedAlarm {
    fire_at: DateTime<Utc>,
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct AlarmTable {
    armed: HashMap<AlarmKey, ArmedAlarm>,
    next_generation: u64,
}

pub struct TokioAlarmFacility {
    table: Arc<Mutex<AlarmTable>>,
    events: UnboundedSender<WakeupEvent>,
    runtime: Handle,
    exact_permitted: AtomicBool,
}

impl TokioAlarmFacility {
    /// Create the facility and the channel its alarms fire into.
    pub fn new(runtime: Handle) -> (Self, UnboundedReceiver<WakeupEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let facility = Self {
            table: Arc::new(Mutex::new(AlarmTable::default())),
            events,
            runtime,
            exact_permitted: AtomicBool::new(true),
        };
        (facility, rx)
    }

    /// Simulates the host granting or revoking the exact-alarm capability.
    pub fn set_exact_permitted(&self, permitted: bool) {
        self.exact_permitted.store(permitted, Ordering::SeqCst);
    }

    /// Armed keys with their fire times, soonest first.
    pub fn pending(&self) -> Vec<(AlarmKey, DateTime<Utc>)> {
        let mut pending: Vec<_> = lock(&self.table)
            .armed
            .iter()
            .map(|(key, alarm)| (*key, alarm.fire_at))
            .collect();
        pending.sort_by_key(|(key, fire_at)| (*fire_at, *key));
        pending
    }

    /// Abort every armed alarm.
    pub fn cancel_everything(&self) {
        let mut table = lock(&self.table);
        let count = table.armed.len();
        for (_, alarm) in table.armed.drain() {
            alarm.task.abort();
        }
        info!(count, "All in-process alarms cancelled");
    }
}

fn lock(table: &Mutex<AlarmTable>) -> MutexGuard<'_, AlarmTable> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

impl AlarmFacility for TokioAlarmFacility {
    fn can_schedule_exact(&self) -> bool {
        self.exact_permitted.load(Ordering::SeqCst)
    }

    fn set_exact(&self, alarm: ScheduledAlarm) -> Result<(), ReminderError> {
        if self.events.is_closed() {
            return Err(ReminderError::Facility("wake-up channel closed".into()));
        }

        let ScheduledAlarm {
            key,
            fire_at,
            payload,
        } = alarm;
        if payload.medicine_id() != key.medicine_id() {
            return Err(ReminderError::Facility(format!(
                "payload for medicine {} cannot arm {key}",
                payload.medicine_id()
            )));
        }
        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        let mut table = lock(&self.table);
        table.next_generation += 1;
        let generation = table.next_generation;

        let events = self.events.clone();
        let shared = Arc::clone(&self.table);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut table = lock(&shared);
                match table.armed.get(&key) {
                    Some(armed) if armed.generation == generation => {
                        table.armed.remove(&key);
                    }
                    // replaced or cancelled while the timer was completing
                    _ => return,
                }
            }
            debug!(key = %key, "Alarm fired");
            if events.send(WakeupEvent::from(payload)).is_err() {
                warn!(key = %key, "Alarm fired with no receiver listening");
            }
        });

        if let Some(previous) = table.armed.insert(
            key,
            ArmedAlarm {
                fire_at,
                generation,
                task,
            },
        ) {
            previous.task.abort();
        }
        Ok(())
    }

    fn cancel(&self, key: AlarmKey) -> Result<(), ReminderError> {
        if let Some(alarm) = lock(&self.table).armed.remove(&key) {
            alarm.task.abort();
            debug!(key = %key, "Alarm cancelled");
        }
        Ok(())
    }
}

/// Forward fired events to the receiver until every sender is gone.
pub async fn dispatch_events(mut rx: UnboundedReceiver<WakeupEvent>, receiver: Arc<WakeupReceiver>) {
    while let Some(event) = rx.recv().await {
        // The receiver logs the outcome; the handle is not awaited here.
        drop(receiver.on_receive(event));
    }
    info!("Wake-up dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmPayload, DosePayload, RefillPayload};

    fn dose_alarm(slot: usize, in_ms: i64) -> ScheduledAlarm {
        ScheduledAlarm {
            key: AlarmKey::dose(1, slot),
            fire_at: Utc::now() + chrono::Duration::milliseconds(in_ms),
            payload: AlarmPayload::Dose(DosePayload {
                medicine_id: 1,
                name: "Aspirin".into(),
                dosage: "1 tablet".into(),
                dose_time: format!("0{slot}:00"),
            }),
        }
    }

    async fn next_event(rx: &mut UnboundedReceiver<WakeupEvent>) -> Option<WakeupEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn fires_event_at_due_time() {
        let (facility, mut rx) = TokioAlarmFacility::new(Handle::current());
        facility.set_exact(dose_alarm(0, 20)).unwrap();
        assert_eq!(facility.pending().len(), 1);

        match next_event(&mut rx).await {
            Some(WakeupEvent::DoseDue(p)) => assert_eq!(p.dose_time, "00:00"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(facility.pending().is_empty());
    }

    #[tokio::test]
    async fn past_fire_time_fires_immediately() {
        let (facility, mut rx) = TokioAlarmFacility::new(Handle::current());
        facility.set_exact(dose_alarm(0, -1_000)).unwrap();
        assert!(next_event(&mut rx).await.is_some());
    }

    #[tokio::test]
    async fn same_key_replaces_previous_alarm() {
        let (facility, mut rx) = TokioAlarmFacility::new(Handle::current());
        facility.set_exact(dose_alarm(0, 60_000)).unwrap();
        let mut replacement = dose_alarm(0, 20);
        if let AlarmPayload::Dose(p) = &mut replacement.payload {
            p.dose_time = "09:30".into();
        }
        facility.set_exact(replacement).unwrap();
        assert_eq!(facility.pending().len(), 1);

        match next_event(&mut rx).await {
            Some(WakeupEvent::DoseDue(p)) => assert_eq!(p.dose_time, "09:30"),
            other => panic!("unexpected {other:?}"),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelled_alarm_never_fires() {
        let (facility, mut rx) = TokioAlarmFacility::new(Handle::current());
        facility.set_exact(dose_alarm(0, 30)).unwrap();
        facility.cancel(AlarmKey::dose(1, 0)).unwrap();
        // unknown key is a no-op
        facility.cancel(AlarmKey::refill(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(facility.pending().is_empty());
    }

    #[tokio::test]
    async fn pending_is_sorted_by_fire_time() {
        let (facility, _rx) = TokioAlarmFacility::new(Handle::current());
        facility.set_exact(dose_alarm(1, 60_000)).unwrap();
        facility.set_exact(dose_alarm(0, 30_000)).unwrap();
        facility
            .set_exact(ScheduledAlarm {
                key: AlarmKey::refill(1),
                fire_at: Utc::now() + chrono::Duration::milliseconds(90_000),
                payload: AlarmPayload::Refill(RefillPayload {
                    medicine_id: 1,
                    name: "Aspirin".into(),
                    current_quantity: 1,
                    refill_threshold: 5,
                }),
            })
            .unwrap();

        let keys: Vec<AlarmKey> = facility.pending().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![AlarmKey::dose(1, 0), AlarmKey::dose(1, 1), AlarmKey::refill(1)]
        );

        facility.cancel_everything();
        assert!(facility.pending().is_empty());
    }

    #[tokio::test]
    async fn permission_flag_is_reported() {
        let (facility, _rx) = TokioAlarmFacility::new(Handle::current());
        assert!(facility.can_schedule_exact());
        facility.set_exact_permitted(false);
        assert!(!facility.can_schedule_exact());
    }

    #[tokio::test]
    async fn payload_must_belong_to_key() {
        let (facility, _rx) = TokioAlarmFacility::new(Handle::current());
        let mut alarm = dose_alarm(0, 60_000);
        alarm.key = AlarmKey::dose(2, 0);

        assert!(matches!(facility.set_exact(alarm), Err(ReminderError::Facility(_))));
        assert!(facility.pending().is_empty());
    }

    #[tokio::test]
    async fn closed_channel_is_facility_error() {
        let (facility, rx) = TokioAlarmFacility::new(Handle::current());
        drop(rx);
        assert!(matches!(
            facility.set_exact(dose_alarm(0, 10)),
            Err(ReminderError::Facility(_))
        ));
    }
}
