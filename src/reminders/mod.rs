//! Reminder scheduling engine
//!
//! Turns a medicine's dose times and recurrence rule into one-shot exact
//! wake-ups, reacts to those wake-ups with notifications, and re-arms the next
//! occurrence. A parallel refill reminder is keyed off a stock threshold.
//!
//! ## Architecture
//!
//! ```text
//! recurrence (pure) ─┐
//! threshold (pure) ──┼─> registry ──> AlarmFacility ──> WakeupEvent
//!                    │                                       │
//!                    └──── handler <── receiver (lease) <────┘
//! ```
//!
//! OS-facing collaborators (store, alarm facility, notifications, clock) are
//! traits in `traits`. `alarm_clock` and `store` hold the in-process defaults.

pub mod alarm_clock;
pub mod error;
pub mod handler;
pub mod keys;
pub mod lease;
pub mod notification;
pub mod receiver;
pub mod recurrence;
pub mod registry;
pub mod store;
pub mod threshold;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use alarm_clock::{dispatch_events, TokioAlarmFacility};
pub use error::ReminderError;
pub use handler::{HandleOutcome, WakeupEvent, WakeupHandler};
pub use keys::{AlarmKey, MAX_DOSE_SLOTS};
pub use lease::{AbandonSignal, ExecutionLease, LeaseTracker};
pub use notification::{LogNotificationSurface, Notification};
pub use receiver::WakeupReceiver;
pub use recurrence::{next_fire_time, next_refill_check, parse_dose_time};
pub use registry::{
    AlarmRegistry, ScheduleNotice, ScheduleReport, SkipReason, SkippedSlot, SystemClock,
    TracingReporter,
};
pub use store::SqliteMedicineStore;
pub use threshold::needs_refill_alert;
pub use traits::*;
