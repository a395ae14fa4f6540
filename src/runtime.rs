//! Reminder runtime: builds every collaborator once and owns them.
//!
//! In-process timers die with the process, so `start` replays
//! `SystemRestarted` the same way a mobile host re-arms on boot.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ReminderSettings;
use crate::db;
use crate::medicines::MedicineService;
use crate::reminders::{
    dispatch_events, AlarmRegistry, Clock, HandleOutcome, LeaseTracker, LogNotificationSurface,
    ReminderError, SqliteMedicineStore, SystemClock, TokioAlarmFacility, TracingReporter,
    WakeupEvent, WakeupHandler, WakeupReceiver,
};

pub struct ReminderRuntime {
    facility: Arc<TokioAlarmFacility>,
    registry: Arc<AlarmRegistry>,
    receiver: Arc<WakeupReceiver>,
    medicines: MedicineService,
    dispatch: JoinHandle<()>,
    boot: Option<JoinHandle<Result<HandleOutcome, ReminderError>>>,
}

impl ReminderRuntime {
    /// Open the configured database and start the runtime on `runtime`.
    pub fn start(settings: &ReminderSettings, runtime: Handle) -> Result<Self, ReminderError> {
        let conn = db::open_database(&settings.database_path())?;
        Self::with_connection(conn, settings, runtime)
    }

    pub fn with_connection(
        conn: Connection,
        settings: &ReminderSettings,
        runtime: Handle,
    ) -> Result<Self, ReminderError> {
        let store = Arc::new(SqliteMedicineStore::new(conn));
        let (facility, events) = TokioAlarmFacility::new(runtime.clone());
        let facility = Arc::new(facility);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let registry = Arc::new(AlarmRegistry::new(
            facility.clone(),
            clock.clone(),
            Arc::new(TracingReporter),
            settings.refill_time(),
        ));
        let handler = Arc::new(WakeupHandler::new(
            store.clone(),
            registry.clone(),
            Arc::new(LogNotificationSurface),
        ));
        let receiver = Arc::new(WakeupReceiver::new(
            handler,
            LeaseTracker::new(),
            settings.execution_window(),
            runtime.clone(),
        ));
        let dispatch = runtime.spawn(dispatch_events(events, receiver.clone()));
        let medicines = MedicineService::new(store, registry.clone(), clock);

        let boot = receiver.on_receive(WakeupEvent::SystemRestarted);
        info!(
            refill_time = %settings.refill_time(),
            window_secs = settings.execution_window_secs,
            "Reminder runtime started"
        );

        Ok(Self {
            facility,
            registry,
            receiver,
            medicines,
            dispatch,
            boot: Some(boot),
        })
    }

    /// Wait for the start-up re-arm to finish. `None` once already awaited.
    pub async fn wait_ready(&mut self) -> Option<Result<HandleOutcome, ReminderError>> {
        let boot = self.boot.take()?;
        Some(boot.await.unwrap_or_else(|e| Err(ReminderError::HandlerPanicked(e.to_string()))))
    }

    pub fn medicines(&self) -> &MedicineService {
        &self.medicines
    }

    pub fn registry(&self) -> &Arc<AlarmRegistry> {
        &self.registry
    }

    pub fn facility(&self) -> &Arc<TokioAlarmFacility> {
        &self.facility
    }

    pub fn receiver(&self) -> &Arc<WakeupReceiver> {
        &self.receiver
    }

    /// Drop every armed alarm and stop dispatching.
    pub fn shutdown(self) {
        self.facility.cancel_everything();
        self.dispatch.abort();
        if let Some(boot) = self.boot {
            boot.abort();
        }
        info!("Reminder runtime stopped");
    }
}
