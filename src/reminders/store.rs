//! SQLite implementation of MedicineStore.

use std::sync::Mutex;

use rusqlite::Connection;

use super::traits::MedicineStore;
use crate::db::{self, DatabaseError};
use crate::models::*;

/// Serialises access to one SQLite connection.
pub struct SqliteMedicineStore {
    conn: Mutex<Connection>,
}

impl SqliteMedicineStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_memory_database()?))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

impl MedicineStore for SqliteMedicineStore {
    fn insert(&self, medicine: &NewMedicine) -> Result<Medicine, DatabaseError> {
        self.with_conn(|conn| {
            let id = db::insert_medicine(conn, medicine)?;
            Ok(medicine.clone().into_medicine(id))
        })
    }

    fn update(&self, medicine: &Medicine) -> Result<(), DatabaseError> {
        self.with_conn(|conn| db::update_medicine(conn, medicine))
    }

    fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.with_conn(|conn| db::delete_medicine(conn, id))
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Medicine>, DatabaseError> {
        self.with_conn(|conn| db::get_medicine(conn, id))
    }

    fn get_all(&self) -> Result<Vec<Medicine>, DatabaseError> {
        self.with_conn(db::get_all_medicines)
    }

    fn record_intake(
        &self,
        medicine: &Medicine,
        entry: &NewHistoryEntry,
    ) -> Result<MedicineHistoryEntry, DatabaseError> {
        self.with_conn(|conn| db::record_intake(conn, medicine, entry))
    }

    fn get_history_for(&self, medicine_id: i64) -> Result<Vec<MedicineHistoryEntry>, DatabaseError> {
        self.with_conn(|conn| db::get_history_for(conn, medicine_id))
    }

    fn delete_history_for(&self, medicine_id: i64) -> Result<usize, DatabaseError> {
        self.with_conn(|conn| db::delete_history_for(conn, medicine_id))
    }
}
