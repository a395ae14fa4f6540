//! Repository layer: table-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; locking is the caller's job
//! (see `reminders::store::SqliteMedicineStore`).

mod history;
mod medicine;

pub use history::*;
pub use medicine::*;
