use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const MEDICINE_COLUMNS: &str = "id, name, photo_uri, dosage, times, frequency_type, specific_days,
     total_quantity, current_quantity, refill_threshold, notes, side_effects, purpose,
     taken_times_today, last_taken_date";

/// Insert a medicine and return the id assigned by SQLite.
pub fn insert_medicine(conn: &Connection, med: &NewMedicine) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO medicines (name, photo_uri, dosage, times, frequency_type, specific_days,
         total_quantity, current_quantity, refill_threshold, notes, side_effects, purpose)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            med.name,
            med.photo_uri,
            med.dosage,
            join_list(&med.times),
            med.recurrence.frequency_type().as_str(),
            days_column(&med.recurrence),
            med.total_quantity,
            med.current_quantity,
            med.refill_threshold,
            med.notes,
            med.side_effects,
            med.purpose,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrite every column of an existing medicine. `NotFound` if the id is unknown.
pub fn update_medicine(conn: &Connection, med: &Medicine) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medicines SET name = ?2, photo_uri = ?3, dosage = ?4, times = ?5,
         frequency_type = ?6, specific_days = ?7, total_quantity = ?8, current_quantity = ?9,
         refill_threshold = ?10, notes = ?11, side_effects = ?12, purpose = ?13,
         taken_times_today = ?14, last_taken_date = ?15
         WHERE id = ?1",
        params![
            med.id,
            med.name,
            med.photo_uri,
            med.dosage,
            join_list(&med.times),
            med.recurrence.frequency_type().as_str(),
            days_column(&med.recurrence),
            med.total_quantity,
            med.current_quantity,
            med.refill_threshold,
            med.notes,
            med.side_effects,
            med.purpose,
            join_list(&med.taken_times_today),
            med.last_taken_date,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::medicine_not_found(med.id));
    }
    Ok(())
}

/// Delete a medicine. History rows go with it through the foreign-key cascade.
pub fn delete_medicine(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM medicines WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::medicine_not_found(id));
    }
    Ok(())
}

pub fn get_medicine(conn: &Connection, id: i64) -> Result<Option<Medicine>, DatabaseError> {
    let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], medicine_row_from_rusqlite)
        .optional()?;
    row.map(medicine_from_row).transpose()
}

/// All medicines, ordered by name.
pub fn get_all_medicines(conn: &Connection) -> Result<Vec<Medicine>, DatabaseError> {
    let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY name COLLATE NOCASE, id");
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map([], medicine_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medicine_from_row(row?)?);
    }
    Ok(meds)
}

// ═══════════════════════════════════════════
// Column encoding
// ═══════════════════════════════════════════

fn join_list(items: &[String]) -> String {
    items.join(",")
}

fn split_list(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn days_column(recurrence: &Recurrence) -> String {
    match recurrence {
        Recurrence::SpecificDays(days) => days
            .iter()
            .map(|d| d.number_from_monday().to_string())
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

fn parse_days(column: &str) -> Result<Vec<Weekday>, DatabaseError> {
    split_list(column)
        .iter()
        .map(|n| {
            n.parse::<u32>()
                .ok()
                .and_then(weekday_from_number)
                .ok_or_else(|| DatabaseError::InvalidValue {
                    field: "specific_days".into(),
                    value: n.clone(),
                })
        })
        .collect()
}

struct MedicineRow {
    id: i64,
    name: String,
    photo_uri: Option<String>,
    dosage: String,
    times: String,
    frequency_type: String,
    specific_days: String,
    total_quantity: Option<i32>,
    current_quantity: Option<i32>,
    refill_threshold: Option<i32>,
    notes: Option<String>,
    side_effects: Option<String>,
    purpose: Option<String>,
    taken_times_today: String,
    last_taken_date: Option<NaiveDate>,
}

fn medicine_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicineRow, rusqlite::Error> {
    Ok(MedicineRow {
        id: row.get(0)?,
        name: row.get(1)?,
        photo_uri: row.get(2)?,
        dosage: row.get(3)?,
        times: row.get(4)?,
        frequency_type: row.get(5)?,
        specific_days: row.get(6)?,
        total_quantity: row.get(7)?,
        current_quantity: row.get(8)?,
        refill_threshold: row.get(9)?,
        notes: row.get(10)?,
        side_effects: row.get(11)?,
        purpose: row.get(12)?,
        taken_times_today: row.get(13)?,
        last_taken_date: row.get(14)?,
    })
}

fn medicine_from_row(row: MedicineRow) -> Result<Medicine, DatabaseError> {
    let recurrence = match FrequencyType::from_str(&row.frequency_type)? {
        FrequencyType::Daily => Recurrence::Daily,
        FrequencyType::AlternateDay => Recurrence::AlternateDay,
        FrequencyType::SpecificDays => Recurrence::specific_days(parse_days(&row.specific_days)?),
    };

    Ok(Medicine {
        id: row.id,
        name: row.name,
        photo_uri: row.photo_uri,
        dosage: row.dosage,
        times: split_list(&row.times),
        recurrence,
        total_quantity: row.total_quantity,
        current_quantity: row.current_quantity,
        refill_threshold: row.refill_threshold,
        notes: row.notes,
        side_effects: row.side_effects,
        purpose: row.purpose,
        taken_times_today: split_list(&row.taken_times_today),
        last_taken_date: row.last_taken_date,
    })
}
