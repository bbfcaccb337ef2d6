//! Database schema migration engine.
//!
//! The `meta` table carries a monotonically increasing schema version. On
//! open, the migrator walks `v(N) → v(N+1)` steps inside a single write
//! transaction, so a crash mid-migration re-enters cleanly at the same
//! version. A database written by a newer node refuses to open.

use cobalt_store::{ReadTransaction, Store, StoreError, Table, WriteTransaction};

use crate::environment::LmdbStore;

/// The schema version the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    pub fn run(store: &LmdbStore) -> Result<(), StoreError> {
        let mut txn = store.tx_begin_write(&[Table::Meta])?;
        let current = txn.version_get()?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::VersionMismatch {
                found: current,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(txn.as_mut(), version, version + 1)?;
        }

        txn.version_put(CURRENT_SCHEMA_VERSION)?;
        txn.commit()?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn run_migration(
    _txn: &mut dyn WriteTransaction,
    from: u32,
    to: u32,
) -> Result<(), StoreError> {
    match (from, to) {
        (0, 1) => {
            // Initial schema — the named databases are created at open.
            Ok(())
        }
        (1, 2) => {
            // Schema v2 dropped the legacy checksum table and added the
            // source epoch to pending values. No v1 databases shipped, so
            // there are no rows to rewrite.
            Ok(())
        }
        _ => Err(StoreError::Io(format!(
            "unknown migration: {from} -> {to}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_store::ReadTransaction;

    #[test]
    fn fresh_database_lands_on_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.version_get().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        {
            LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        }
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.version_get().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
            let mut txn = store.tx_begin_write(&[Table::Meta]).unwrap();
            txn.version_put(CURRENT_SCHEMA_VERSION + 1).unwrap();
            txn.commit().unwrap();
        }
        let result = LmdbStore::open(dir.path(), 16 * 1024 * 1024);
        assert!(matches!(
            result,
            Err(StoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn unknown_migration_step_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let mut txn = store.tx_begin_write(&[Table::Meta]).unwrap();
        let result = run_migration(txn.as_mut(), 98, 99);
        assert!(result.is_err());
    }
}
