//! Wake-up receiver: the boundary between the alarm callback and handler work.
//!
//! `on_receive` returns immediately. The handler runs on tokio's blocking
//! pool under an execution lease and a timeout; every failure is logged here
//! and goes no further. When the window closes the work is signalled to stop
//! before the lease is released, so it arms nothing afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::ReminderError;
use super::handler::{HandleOutcome, WakeupEvent, WakeupHandler};
use super::lease::{AbandonSignal, LeaseTracker};

pub struct WakeupReceiver {
    handler: Arc<WakeupHandler>,
    leases: LeaseTracker,
    execution_window: Duration,
    runtime: Handle,
}

impl WakeupReceiver {
    pub fn new(
        handler: Arc<WakeupHandler>,
        leases: LeaseTracker,
        execution_window: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            handler,
            leases,
            execution_window,
            runtime,
        }
    }

    pub fn leases(&self) -> &LeaseTracker {
        &self.leases
    }

    /// Accept a fired event. Safe to call from a non-async callback thread.
    pub fn on_receive(&self, event: WakeupEvent) -> JoinHandle<Result<HandleOutcome, ReminderError>> {
        let kind = event.kind();
        let lease = self.leases.acquire(kind);
        let handler = Arc::clone(&self.handler);
        let window = self.execution_window;
        let signal = AbandonSignal::new();
        let work_signal = signal.clone();

        self.runtime.spawn(async move {
            let _lease = lease;
            let work =
                tokio::task::spawn_blocking(move || handler.handle_until(event, &work_signal));

            let result = match tokio::time::timeout(window, work).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(ReminderError::HandlerPanicked(join_err.to_string())),
                Err(_) => {
                    signal.abandon();
                    Err(ReminderError::ExecutionWindowElapsed(window))
                }
            };

            match &result {
                Ok(outcome) => info!(kind, ?outcome, "Wake-up handled"),
                Err(e @ ReminderError::ExecutionWindowElapsed(_)) => {
                    warn!(kind, error = %e, "Wake-up work abandoned");
                }
                Err(e) => error!(kind, error = %e, "Wake-up handling failed"),
            }
            result
        })
    }
}
