use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::enums::FrequencyType;

/// Which calendar days a dose slot is active on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "days", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    /// Currently fires every day, exactly like `Daily`.
    AlternateDay,
    SpecificDays(Vec<Weekday>),
}

impl Recurrence {
    /// Build a `SpecificDays` rule with days sorted Monday-first and deduplicated.
    pub fn specific_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(|d| d.number_from_monday());
        days.dedup();
        Self::SpecificDays(days)
    }

    pub fn frequency_type(&self) -> FrequencyType {
        match self {
            Self::Daily => FrequencyType::Daily,
            Self::AlternateDay => FrequencyType::AlternateDay,
            Self::SpecificDays(_) => FrequencyType::SpecificDays,
        }
    }

    /// Whether a dose on `weekday` is allowed by this rule.
    pub fn includes(&self, weekday: Weekday) -> bool {
        match self {
            Self::Daily | Self::AlternateDay => true,
            Self::SpecificDays(days) => days.contains(&weekday),
        }
    }
}

/// ISO weekday number (1 = Monday .. 7 = Sunday) to `Weekday`.
pub fn weekday_from_number(n: u32) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// A stored medicine with its dose schedule and stock levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub photo_uri: Option<String>,
    pub dosage: String,
    /// Dose times as local "HH:MM", in display order. Index = dose slot.
    pub times: Vec<String>,
    pub recurrence: Recurrence,
    pub total_quantity: Option<i32>,
    pub current_quantity: Option<i32>,
    pub refill_threshold: Option<i32>,
    pub notes: Option<String>,
    pub side_effects: Option<String>,
    pub purpose: Option<String>,
    pub taken_times_today: Vec<String>,
    pub last_taken_date: Option<NaiveDate>,
}

impl Medicine {
    /// Doses taken on `today`. Tracking from an earlier day counts as nothing taken.
    pub fn taken_today(&self, today: NaiveDate) -> &[String] {
        if self.last_taken_date == Some(today) {
            &self.taken_times_today
        } else {
            &[]
        }
    }

    pub fn slot_of(&self, dose_time: &str) -> Option<usize> {
        self.times.iter().position(|t| t == dose_time)
    }
}

/// Medicine fields supplied by the host before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub photo_uri: Option<String>,
    pub dosage: String,
    pub times: Vec<String>,
    pub recurrence: Recurrence,
    pub total_quantity: Option<i32>,
    pub current_quantity: Option<i32>,
    pub refill_threshold: Option<i32>,
    pub notes: Option<String>,
    pub side_effects: Option<String>,
    pub purpose: Option<String>,
}

impl NewMedicine {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        times: &[&str],
        recurrence: Recurrence,
    ) -> Self {
        Self {
            name: name.into(),
            photo_uri: None,
            dosage: dosage.into(),
            times: times.iter().map(|t| t.to_string()).collect(),
            recurrence,
            total_quantity: None,
            current_quantity: None,
            refill_threshold: None,
            notes: None,
            side_effects: None,
            purpose: None,
        }
    }

    /// Set total, current and refill-threshold quantities together.
    pub fn with_stock(mut self, total: i32, current: i32, threshold: i32) -> Self {
        self.total_quantity = Some(total);
        self.current_quantity = Some(current);
        self.refill_threshold = Some(threshold);
        self
    }

    pub fn into_medicine(self, id: i64) -> Medicine {
        Medicine {
            id,
            name: self.name,
            photo_uri: self.photo_uri,
            dosage: self.dosage,
            times: self.times,
            recurrence: self.recurrence,
            total_quantity: self.total_quantity,
            current_quantity: self.current_quantity,
            refill_threshold: self.refill_threshold,
            notes: self.notes,
            side_effects: self.side_effects,
            purpose: self.purpose,
            taken_times_today: Vec::new(),
            last_taken_date: None,
        }
    }
}

/// One recorded intake. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineHistoryEntry {
    pub id: i64,
    pub medicine_id: i64,
    pub taken_at: DateTime<Utc>,
    /// Dosage label as it was when the dose was taken.
    pub dosage_taken: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub medicine_id: i64,
    pub taken_at: DateTime<Utc>,
    pub dosage_taken: String,
}
