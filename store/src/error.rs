//! Storage error type.
//!
//! Absence of a record is not an error — lookups return `Option`. Errors are
//! reserved for I/O failures, corruption, and schema mismatches; all three
//! abort the enclosing transaction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("corrupt record in table {table}: {detail}")]
    Corruption {
        table: &'static str,
        detail: String,
    },

    /// The database was written by a newer node. Fatal at open.
    #[error("database schema version {found} is newer than supported version {supported}")]
    VersionMismatch { found: u32, supported: u32 },
}
