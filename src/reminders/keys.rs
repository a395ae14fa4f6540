//! Alarm keys and notification ids.
//!
//! Request codes: dose slot `medicine_id * 1000 + slot`, refill
//! `medicine_id * 1000 + 999`. Slots stay below 999, so the two never meet.

use serde::{Deserialize, Serialize};

/// Most dose times a medicine may carry. `cancel` sweeps this whole range.
pub const MAX_DOSE_SLOTS: usize = 10;

const SLOT_STRIDE: i64 = 1000;
const REFILL_SLOT: i64 = 999;

/// Offset added to a medicine id to form its refill notification id.
pub const REFILL_NOTIFICATION_OFFSET: i32 = 99_999;

/// Identity of one scheduled wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlarmKey {
    Dose { medicine_id: i64, slot: usize },
    Refill { medicine_id: i64 },
}

impl AlarmKey {
    pub fn dose(medicine_id: i64, slot: usize) -> Self {
        Self::Dose { medicine_id, slot }
    }

    pub fn refill(medicine_id: i64) -> Self {
        Self::Refill { medicine_id }
    }

    pub fn medicine_id(&self) -> i64 {
        match *self {
            Self::Dose { medicine_id, .. } | Self::Refill { medicine_id } => medicine_id,
        }
    }

    /// Integer code for hosts whose scheduler keys alarms by number.
    pub fn request_code(&self) -> i64 {
        match *self {
            Self::Dose { medicine_id, slot } => medicine_id * SLOT_STRIDE + slot as i64,
            Self::Refill { medicine_id } => medicine_id * SLOT_STRIDE + REFILL_SLOT,
        }
    }

    /// Every key `cancel` touches for one medicine.
    pub fn all_for(medicine_id: i64) -> impl Iterator<Item = AlarmKey> {
        (0..MAX_DOSE_SLOTS)
            .map(move |slot| AlarmKey::dose(medicine_id, slot))
            .chain(std::iter::once(AlarmKey::refill(medicine_id)))
    }
}

impl std::fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dose { medicine_id, slot } => write!(f, "dose:{medicine_id}:{slot}"),
            Self::Refill { medicine_id } => write!(f, "refill:{medicine_id}"),
        }
    }
}

/// 32-bit string hash over UTF-16 code units (`h = 31 * h + c`, wrapping).
pub fn dose_time_hash(dose_time: &str) -> i32 {
    dose_time
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

/// Dedup id for a dose notification. Repeated deliveries for the same
/// medicine and dose time collapse onto one visible notification.
pub fn dose_notification_id(medicine_id: i64, dose_time: &str) -> i32 {
    (medicine_id as i32).wrapping_add(dose_time_hash(dose_time))
}

pub fn refill_notification_id(medicine_id: i64) -> i32 {
    (medicine_id as i32).wrapping_add(REFILL_NOTIFICATION_OFFSET)
}
