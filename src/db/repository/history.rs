use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection};

use super::medicine::update_medicine;
use crate::db::DatabaseError;
use crate::models::*;

/// Timestamps are stored to the millisecond; the returned entry matches what
/// a later read gives back.
pub fn insert_history(
    conn: &Connection,
    entry: &NewHistoryEntry,
) -> Result<MedicineHistoryEntry, DatabaseError> {
    let taken_at = entry.taken_at.trunc_subsecs(3);
    conn.execute(
        "INSERT INTO medicine_history (medicine_id, taken_at, dosage_taken)
         VALUES (?1, ?2, ?3)",
        params![
            entry.medicine_id,
            taken_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.dosage_taken,
        ],
    )?;
    Ok(MedicineHistoryEntry {
        id: conn.last_insert_rowid(),
        medicine_id: entry.medicine_id,
        taken_at,
        dosage_taken: entry.dosage_taken.clone(),
    })
}

/// Write the history row and the medicine's new stock and taken set in one
/// transaction. Either both land or neither does.
pub fn record_intake(
    conn: &Connection,
    medicine: &Medicine,
    entry: &NewHistoryEntry,
) -> Result<MedicineHistoryEntry, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let stored = insert_history(&tx, entry)?;
    update_medicine(&tx, medicine)?;
    tx.commit()?;
    Ok(stored)
}

/// Intake history for one medicine, newest first.
pub fn get_history_for(
    conn: &Connection,
    medicine_id: i64,
) -> Result<Vec<MedicineHistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medicine_id, taken_at, dosage_taken
         FROM medicine_history WHERE medicine_id = ?1
         ORDER BY taken_at DESC, id DESC",
    )?;

    let rows = stmt.query_map(params![medicine_id], |row| {
        Ok(MedicineHistoryEntry {
            id: row.get(0)?,
            medicine_id: row.get(1)?,
            taken_at: row.get::<_, DateTime<Utc>>(2)?,
            dosage_taken: row.get(3)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Remove all history for a medicine. Returns the number of rows deleted.
pub fn delete_history_for(conn: &Connection, medicine_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM medicine_history WHERE medicine_id = ?1",
        params![medicine_id],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{delete_medicine, get_medicine, insert_medicine};
    use crate::db::sqlite::open_memory_database;
    use chrono::TimeZone;

    fn setup() -> (Connection, i64) {
        let conn = open_memory_database().unwrap();
        let id = insert_medicine(
            &conn,
            &NewMedicine::new("Aspirin", "1 tablet", &["08:00"], Recurrence::Daily),
        )
        .unwrap();
        (conn, id)
    }

    fn entry(medicine_id: i64, hour: u32) -> NewHistoryEntry {
        NewHistoryEntry {
            medicine_id,
            taken_at: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
            dosage_taken: "1 tablet".into(),
        }
    }

    #[test]
    fn history_is_newest_first() {
        let (conn, id) = setup();
        insert_history(&conn, &entry(id, 8)).unwrap();
        insert_history(&conn, &entry(id, 20)).unwrap();
        insert_history(&conn, &entry(id, 12)).unwrap();

        let hours: Vec<u32> = get_history_for(&conn, id)
            .unwrap()
            .iter()
            .map(|e| chrono::Timelike::hour(&e.taken_at))
            .collect();
        assert_eq!(hours, vec![20, 12, 8]);
    }

    #[test]
    fn insert_returns_stored_entry() {
        let (conn, id) = setup();
        let stored = insert_history(&conn, &entry(id, 8)).unwrap();
        let loaded = get_history_for(&conn, id).unwrap();
        assert_eq!(loaded, vec![stored]);
    }

    #[test]
    fn sub_millisecond_precision_is_dropped_on_insert() {
        let (conn, id) = setup();
        let precise = Utc.with_ymd_and_hms(2026, 3, 2, 8, 1, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let stored = insert_history(
            &conn,
            &NewHistoryEntry {
                medicine_id: id,
                taken_at: precise,
                dosage_taken: "1 tablet".into(),
            },
        )
        .unwrap();

        assert_eq!(
            stored.taken_at,
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 1, 0).unwrap()
                + chrono::Duration::milliseconds(123)
        );
        assert_eq!(get_history_for(&conn, id).unwrap(), vec![stored]);
    }

    #[test]
    fn record_intake_writes_history_and_stock_together() {
        let (conn, id) = setup();
        let mut med = get_medicine(&conn, id).unwrap().unwrap();
        med.current_quantity = Some(4);
        med.taken_times_today = vec!["08:00".into()];

        let stored = record_intake(&conn, &med, &entry(id, 8)).unwrap();

        assert_eq!(get_history_for(&conn, id).unwrap(), vec![stored]);
        let reloaded = get_medicine(&conn, id).unwrap().unwrap();
        assert_eq!(reloaded.current_quantity, Some(4));
        assert_eq!(reloaded.taken_times_today, vec!["08:00"]);
    }

    #[test]
    fn failed_medicine_update_rolls_back_history() {
        let (conn, id) = setup();
        let mut med = get_medicine(&conn, id).unwrap().unwrap();
        // violates CHECK (current_quantity >= 0)
        med.current_quantity = Some(-1);

        assert!(record_intake(&conn, &med, &entry(id, 8)).is_err());
        assert!(get_history_for(&conn, id).unwrap().is_empty());
        assert_eq!(get_medicine(&conn, id).unwrap().unwrap().current_quantity, None);
    }

    #[test]
    fn history_for_unknown_medicine_rejected() {
        let (conn, id) = setup();
        assert!(insert_history(&conn, &entry(id + 1, 8)).is_err());
    }

    #[test]
    fn delete_history_for_counts_rows() {
        let (conn, id) = setup();
        insert_history(&conn, &entry(id, 8)).unwrap();
        insert_history(&conn, &entry(id, 9)).unwrap();
        assert_eq!(delete_history_for(&conn, id).unwrap(), 2);
        assert!(get_history_for(&conn, id).unwrap().is_empty());
        assert_eq!(delete_history_for(&conn, id).unwrap(), 0);
    }

    #[test]
    fn deleting_medicine_cascades_history() {
        let (conn, id) = setup();
        insert_history(&conn, &entry(id, 8)).unwrap();
        delete_medicine(&conn, id).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM medicine_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
