//! Notification content for dose and refill wake-ups.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ReminderError;
use super::keys::{dose_notification_id, refill_notification_id};
use super::traits::NotificationSurface;
use crate::models::{DosePayload, NotificationChannel, RefillPayload};

pub const DOSE_TITLE: &str = "Time for your medicine!";
pub const REFILL_TITLE: &str = "Medicine Refill Alert!";

/// A user-visible notification. Posting twice with the same `id` replaces
/// the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i32,
    pub channel: NotificationChannel,
    pub title: String,
    pub body: String,
}

pub fn dose_notification(payload: &DosePayload) -> Notification {
    Notification {
        id: dose_notification_id(payload.medicine_id, &payload.dose_time),
        channel: NotificationChannel::Reminder,
        title: DOSE_TITLE.to_string(),
        body: format!(
            "{} ({}): Take {}",
            payload.name, payload.dose_time, payload.dosage
        ),
    }
}

pub fn refill_notification(payload: &RefillPayload) -> Notification {
    Notification {
        id: refill_notification_id(payload.medicine_id),
        channel: NotificationChannel::Refill,
        title: REFILL_TITLE.to_string(),
        body: format!(
            "{} is low. Only {} doses left. Refill soon!",
            payload.name, payload.current_quantity
        ),
    }
}

/// Writes notifications to the log. Default surface for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSurface;

impl NotificationSurface for LogNotificationSurface {
    fn notify(&self, notification: &Notification) -> Result<(), ReminderError> {
        info!(
            id = notification.id,
            channel = notification.channel.display_name(),
            title = %notification.title,
            "{}",
            notification.body
        );
        Ok(())
    }
}
