//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use cobalt_store::{ReadTransaction, Store, StoreError, Table, WriteTransaction};

use crate::migration::Migrator;
use crate::txn::{LmdbReadTransaction, LmdbWriteTransaction};
use crate::LmdbError;

const MAX_DBS: u32 = 16;

/// The LMDB environment and one named database per logical table.
pub struct LmdbStore {
    pub(crate) env: Env,
    pub(crate) accounts_db: Database<Bytes, Bytes>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) pending_db: Database<Bytes, Bytes>,
    pub(crate) unchecked_db: Database<Bytes, Bytes>,
    pub(crate) frontiers_db: Database<Bytes, Bytes>,
    pub(crate) representation_db: Database<Bytes, Bytes>,
    pub(crate) peers_db: Database<Bytes, Bytes>,
    pub(crate) online_weight_db: Database<Bytes, Bytes>,
    pub(crate) confirmation_height_db: Database<Bytes, Bytes>,
    pub(crate) final_votes_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store at `path` and run any pending schema
    /// migrations. A database written by a newer node is a fatal error.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Io(format!("create data directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(MAX_DBS)
                .map_size(map_size)
                .open(path)
                .map_err(LmdbError::from)?
        };

        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        let accounts_db = env
            .create_database(&mut wtxn, Some("accounts"))
            .map_err(LmdbError::from)?;
        let blocks_db = env
            .create_database(&mut wtxn, Some("blocks"))
            .map_err(LmdbError::from)?;
        let pending_db = env
            .create_database(&mut wtxn, Some("pending"))
            .map_err(LmdbError::from)?;
        let unchecked_db = env
            .create_database(&mut wtxn, Some("unchecked"))
            .map_err(LmdbError::from)?;
        let frontiers_db = env
            .create_database(&mut wtxn, Some("frontiers"))
            .map_err(LmdbError::from)?;
        let representation_db = env
            .create_database(&mut wtxn, Some("representation"))
            .map_err(LmdbError::from)?;
        let peers_db = env
            .create_database(&mut wtxn, Some("peers"))
            .map_err(LmdbError::from)?;
        let online_weight_db = env
            .create_database(&mut wtxn, Some("online_weight"))
            .map_err(LmdbError::from)?;
        let confirmation_height_db = env
            .create_database(&mut wtxn, Some("confirmation_height"))
            .map_err(LmdbError::from)?;
        let final_votes_db = env
            .create_database(&mut wtxn, Some("final_votes"))
            .map_err(LmdbError::from)?;
        let meta_db = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        let store = Self {
            env,
            accounts_db,
            blocks_db,
            pending_db,
            unchecked_db,
            frontiers_db,
            representation_db,
            peers_db,
            online_weight_db,
            confirmation_height_db,
            final_votes_db,
            meta_db,
        };

        Migrator::run(&store)?;
        Ok(store)
    }
}

impl Store for LmdbStore {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>, StoreError> {
        Ok(Box::new(LmdbReadTransaction::new(self)?))
    }

    fn tx_begin_write(
        &self,
        _tables: &[Table],
    ) -> Result<Box<dyn WriteTransaction + '_>, StoreError> {
        Ok(Box::new(LmdbWriteTransaction::new(self)?))
    }
}
