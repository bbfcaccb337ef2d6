//! Transaction wrappers over heed's `RoTxn`/`RwTxn`.

use heed::{RoTxn, RwTxn};
use rand::Rng;
use std::ops::Bound;

use cobalt_store::{
    AccountInfo, ConfirmationHeightInfo, PendingInfo, PendingKey, ReadTransaction, StoreError,
    UncheckedInfo, UncheckedKey, WriteTransaction,
};
use cobalt_types::{Account, Amount, BlockHash, Root, Timestamp};

use crate::environment::LmdbStore;
use crate::LmdbError;

const VERSION_KEY: [u8; 4] = 1u32.to_be_bytes();

fn prefix_bounds(prefix: &[u8; 32]) -> ([u8; 64], [u8; 64]) {
    let mut lower = [0u8; 64];
    lower[..32].copy_from_slice(prefix);
    let mut upper = [0xFFu8; 64];
    upper[..32].copy_from_slice(prefix);
    (lower, upper)
}

/// Shared read path; the write transaction reaches it through `RwTxn`'s
/// deref to `RoTxn`.
fn account_get(
    store: &LmdbStore,
    txn: &RoTxn<'_>,
    account: &Account,
) -> Result<Option<AccountInfo>, StoreError> {
    store
        .accounts_db
        .get(txn, account.as_bytes().as_slice())
        .map_err(LmdbError::from)?
        .map(|bytes| {
            bincode::deserialize(bytes).map_err(|e| StoreError::Corruption {
                table: "accounts",
                detail: e.to_string(),
            })
        })
        .transpose()
}

fn pending_get(
    store: &LmdbStore,
    txn: &RoTxn<'_>,
    key: &PendingKey,
) -> Result<Option<PendingInfo>, StoreError> {
    store
        .pending_db
        .get(txn, key.to_bytes().as_slice())
        .map_err(LmdbError::from)?
        .map(|bytes| {
            bincode::deserialize(bytes).map_err(|e| StoreError::Corruption {
                table: "pending",
                detail: e.to_string(),
            })
        })
        .transpose()
}

fn pending_iter_account(
    store: &LmdbStore,
    txn: &RoTxn<'_>,
    account: &Account,
) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
    let (lower, upper) = prefix_bounds(account.as_bytes());
    let bounds = (
        Bound::Included(lower.as_slice()),
        Bound::Included(upper.as_slice()),
    );
    let iter = store
        .pending_db
        .range(txn, &bounds)
        .map_err(LmdbError::from)?;
    let mut entries = Vec::new();
    for result in iter {
        let (key, value) = result.map_err(LmdbError::from)?;
        let key = PendingKey::from_bytes(key).ok_or_else(|| StoreError::Corruption {
            table: "pending",
            detail: "key length".into(),
        })?;
        let info = bincode::deserialize(value).map_err(|e| StoreError::Corruption {
            table: "pending",
            detail: e.to_string(),
        })?;
        entries.push((key, info));
    }
    Ok(entries)
}

fn unchecked_get(
    store: &LmdbStore,
    txn: &RoTxn<'_>,
    dependency: &BlockHash,
) -> Result<Vec<(UncheckedKey, UncheckedInfo)>, StoreError> {
    let (lower, upper) = prefix_bounds(dependency.as_bytes());
    let bounds = (
        Bound::Included(lower.as_slice()),
        Bound::Included(upper.as_slice()),
    );
    let iter = store
        .unchecked_db
        .range(txn, &bounds)
        .map_err(LmdbError::from)?;
    let mut entries = Vec::new();
    for result in iter {
        let (key, value) = result.map_err(LmdbError::from)?;
        let key = UncheckedKey::from_bytes(key).ok_or_else(|| StoreError::Corruption {
            table: "unchecked",
            detail: "key length".into(),
        })?;
        let info = bincode::deserialize(value).map_err(|e| StoreError::Corruption {
            table: "unchecked",
            detail: e.to_string(),
        })?;
        entries.push((key, info));
    }
    Ok(entries)
}

fn block_random(
    store: &LmdbStore,
    txn: &RoTxn<'_>,
) -> Result<Option<(BlockHash, Vec<u8>)>, StoreError> {
    let probe: [u8; 32] = rand::thread_rng().gen();
    let bounds = (Bound::Included(probe.as_slice()), Bound::Unbounded);
    let next = store
        .blocks_db
        .range(txn, &bounds)
        .map_err(LmdbError::from)?
        .next()
        .transpose()
        .map_err(LmdbError::from)?;
    let entry = match next {
        Some(entry) => Some(entry),
        None => store.blocks_db.first(txn).map_err(LmdbError::from)?,
    };
    Ok(entry.map(|(key, value)| {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(key);
        (BlockHash::new(hash), value.to_vec())
    }))
}

fn amount_from_bytes(bytes: &[u8], table: &'static str) -> Result<Amount, StoreError> {
    let array: [u8; 16] = bytes.try_into().map_err(|_| StoreError::Corruption {
        table,
        detail: "amount length".into(),
    })?;
    Ok(Amount::from_be_bytes(array))
}

macro_rules! impl_lmdb_read {
    ($ty:ident) => {
        impl ReadTransaction for $ty<'_> {
            fn account_get(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
                account_get(self.store, self.ro(), account)
            }

            fn account_count(&self) -> Result<u64, StoreError> {
                Ok(self
                    .store
                    .accounts_db
                    .len(self.ro())
                    .map_err(LmdbError::from)?)
            }

            fn block_get(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
                Ok(self
                    .store
                    .blocks_db
                    .get(self.ro(), hash.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                    .map(|bytes| bytes.to_vec()))
            }

            fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError> {
                Ok(self
                    .store
                    .blocks_db
                    .get(self.ro(), hash.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                    .is_some())
            }

            fn block_count(&self) -> Result<u64, StoreError> {
                Ok(self
                    .store
                    .blocks_db
                    .len(self.ro())
                    .map_err(LmdbError::from)?)
            }

            fn block_random(&self) -> Result<Option<(BlockHash, Vec<u8>)>, StoreError> {
                block_random(self.store, self.ro())
            }

            fn pending_get(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
                pending_get(self.store, self.ro(), key)
            }

            fn pending_exists(&self, key: &PendingKey) -> Result<bool, StoreError> {
                Ok(self
                    .store
                    .pending_db
                    .get(self.ro(), key.to_bytes().as_slice())
                    .map_err(LmdbError::from)?
                    .is_some())
            }

            fn pending_iter_account(
                &self,
                account: &Account,
            ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
                pending_iter_account(self.store, self.ro(), account)
            }

            fn pending_count(&self) -> Result<u64, StoreError> {
                Ok(self
                    .store
                    .pending_db
                    .len(self.ro())
                    .map_err(LmdbError::from)?)
            }

            fn unchecked_get(
                &self,
                dependency: &BlockHash,
            ) -> Result<Vec<(UncheckedKey, UncheckedInfo)>, StoreError> {
                unchecked_get(self.store, self.ro(), dependency)
            }

            fn unchecked_count(&self) -> Result<u64, StoreError> {
                Ok(self
                    .store
                    .unchecked_db
                    .len(self.ro())
                    .map_err(LmdbError::from)?)
            }

            fn frontier_get(&self, hash: &BlockHash) -> Result<Option<Account>, StoreError> {
                Ok(self
                    .store
                    .frontiers_db
                    .get(self.ro(), hash.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                    .and_then(|bytes| {
                        let array: Option<[u8; 32]> = bytes.try_into().ok();
                        array.map(Account::new)
                    }))
            }

            fn rep_weight_get(&self, representative: &Account) -> Result<Amount, StoreError> {
                match self
                    .store
                    .representation_db
                    .get(self.ro(), representative.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                {
                    Some(bytes) => amount_from_bytes(bytes, "representation"),
                    None => Ok(Amount::ZERO),
                }
            }

            fn rep_weights_iter(&self) -> Result<Vec<(Account, Amount)>, StoreError> {
                let iter = self
                    .store
                    .representation_db
                    .iter(self.ro())
                    .map_err(LmdbError::from)?;
                let mut weights = Vec::new();
                for result in iter {
                    let (key, value) = result.map_err(LmdbError::from)?;
                    let account: [u8; 32] =
                        key.try_into().map_err(|_| StoreError::Corruption {
                            table: "representation",
                            detail: "key length".into(),
                        })?;
                    weights.push((
                        Account::new(account),
                        amount_from_bytes(value, "representation")?,
                    ));
                }
                Ok(weights)
            }

            fn confirmation_height_get(
                &self,
                account: &Account,
            ) -> Result<Option<ConfirmationHeightInfo>, StoreError> {
                match self
                    .store
                    .confirmation_height_db
                    .get(self.ro(), account.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                {
                    Some(bytes) if bytes.len() == 40 => {
                        let mut height = [0u8; 8];
                        height.copy_from_slice(&bytes[..8]);
                        let mut frontier = [0u8; 32];
                        frontier.copy_from_slice(&bytes[8..]);
                        Ok(Some(ConfirmationHeightInfo::new(
                            u64::from_be_bytes(height),
                            BlockHash::new(frontier),
                        )))
                    }
                    Some(_) => Err(StoreError::Corruption {
                        table: "confirmation_height",
                        detail: "value length".into(),
                    }),
                    None => Ok(None),
                }
            }

            fn final_vote_get(&self, root: &Root) -> Result<Option<BlockHash>, StoreError> {
                Ok(self
                    .store
                    .final_votes_db
                    .get(self.ro(), root.as_bytes().as_slice())
                    .map_err(LmdbError::from)?
                    .and_then(|bytes| {
                        let array: Option<[u8; 32]> = bytes.try_into().ok();
                        array.map(BlockHash::new)
                    }))
            }

            fn online_weight_iter(&self) -> Result<Vec<(Timestamp, Amount)>, StoreError> {
                let iter = self
                    .store
                    .online_weight_db
                    .iter(self.ro())
                    .map_err(LmdbError::from)?;
                let mut samples = Vec::new();
                for result in iter {
                    let (key, value) = result.map_err(LmdbError::from)?;
                    let secs: [u8; 8] = key.try_into().map_err(|_| StoreError::Corruption {
                        table: "online_weight",
                        detail: "key length".into(),
                    })?;
                    samples.push((
                        Timestamp::new(u64::from_be_bytes(secs)),
                        amount_from_bytes(value, "online_weight")?,
                    ));
                }
                Ok(samples)
            }

            fn peers_iter(&self) -> Result<Vec<(String, Timestamp)>, StoreError> {
                let iter = self
                    .store
                    .peers_db
                    .iter(self.ro())
                    .map_err(LmdbError::from)?;
                let mut peers = Vec::new();
                for result in iter {
                    let (key, value) = result.map_err(LmdbError::from)?;
                    let endpoint =
                        String::from_utf8(key.to_vec()).map_err(|_| StoreError::Corruption {
                            table: "peers",
                            detail: "endpoint encoding".into(),
                        })?;
                    let secs: [u8; 8] = value.try_into().map_err(|_| StoreError::Corruption {
                        table: "peers",
                        detail: "value length".into(),
                    })?;
                    peers.push((endpoint, Timestamp::new(u64::from_be_bytes(secs))));
                }
                Ok(peers)
            }

            fn version_get(&self) -> Result<u32, StoreError> {
                Ok(self
                    .store
                    .meta_db
                    .get(self.ro(), VERSION_KEY.as_slice())
                    .map_err(LmdbError::from)?
                    .and_then(|bytes| {
                        let array: Option<[u8; 4]> = bytes.try_into().ok();
                        array.map(u32::from_be_bytes)
                    })
                    .unwrap_or(0))
            }

            fn renew(&mut self) -> Result<(), StoreError> {
                self.renew_impl()
            }
        }
    };
}

/// Snapshot-consistent reader. `renew` swaps in a fresh snapshot so a
/// long-lived reader does not pin old pages. The inner transaction is held
/// in an `Option` so renewal can end the old reader slot before taking a
/// new one — LMDB allows one read transaction per thread.
pub struct LmdbReadTransaction<'a> {
    pub(crate) store: &'a LmdbStore,
    txn: Option<RoTxn<'a>>,
}

impl<'a> LmdbReadTransaction<'a> {
    pub(crate) fn new(store: &'a LmdbStore) -> Result<Self, StoreError> {
        let txn = store.env.read_txn().map_err(LmdbError::from)?;
        Ok(Self {
            store,
            txn: Some(txn),
        })
    }

    fn ro(&self) -> &RoTxn<'a> {
        self.txn.as_ref().expect("read transaction active")
    }

    fn renew_impl(&mut self) -> Result<(), StoreError> {
        self.txn = None;
        self.txn = Some(self.store.env.read_txn().map_err(LmdbError::from)?);
        Ok(())
    }
}

impl_lmdb_read!(LmdbReadTransaction);

/// The single writer. Commit is the only fsync; dropping aborts.
pub struct LmdbWriteTransaction<'a> {
    pub(crate) store: &'a LmdbStore,
    txn: RwTxn<'a>,
}

impl<'a> LmdbWriteTransaction<'a> {
    pub(crate) fn new(store: &'a LmdbStore) -> Result<Self, StoreError> {
        let txn = store.env.write_txn().map_err(LmdbError::from)?;
        Ok(Self { store, txn })
    }

    fn ro(&self) -> &RoTxn<'a> {
        &self.txn
    }

    fn renew_impl(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl_lmdb_read!(LmdbWriteTransaction);

impl WriteTransaction for LmdbWriteTransaction<'_> {
    fn account_put(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(LmdbError::from)?;
        self.store
            .accounts_db
            .put(&mut self.txn, account.as_bytes().as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn account_del(&mut self, account: &Account) -> Result<(), StoreError> {
        self.store
            .accounts_db
            .delete(&mut self.txn, account.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn block_put(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError> {
        self.store
            .blocks_db
            .put(&mut self.txn, hash.as_bytes().as_slice(), bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn block_del(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.store
            .blocks_db
            .delete(&mut self.txn, hash.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn pending_put(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(LmdbError::from)?;
        self.store
            .pending_db
            .put(&mut self.txn, key.to_bytes().as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn pending_del(&mut self, key: &PendingKey) -> Result<(), StoreError> {
        self.store
            .pending_db
            .delete(&mut self.txn, key.to_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn unchecked_put(
        &mut self,
        key: &UncheckedKey,
        info: &UncheckedInfo,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(LmdbError::from)?;
        self.store
            .unchecked_db
            .put(&mut self.txn, key.to_bytes().as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn unchecked_del(&mut self, key: &UncheckedKey) -> Result<(), StoreError> {
        self.store
            .unchecked_db
            .delete(&mut self.txn, key.to_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn frontier_put(&mut self, hash: &BlockHash, account: &Account) -> Result<(), StoreError> {
        self.store
            .frontiers_db
            .put(
                &mut self.txn,
                hash.as_bytes().as_slice(),
                account.as_bytes().as_slice(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn frontier_del(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.store
            .frontiers_db
            .delete(&mut self.txn, hash.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn rep_weight_put(
        &mut self,
        representative: &Account,
        weight: Amount,
    ) -> Result<(), StoreError> {
        if weight.is_zero() {
            self.store
                .representation_db
                .delete(&mut self.txn, representative.as_bytes().as_slice())
                .map_err(LmdbError::from)?;
        } else {
            self.store
                .representation_db
                .put(
                    &mut self.txn,
                    representative.as_bytes().as_slice(),
                    weight.to_be_bytes().as_slice(),
                )
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    fn confirmation_height_put(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        let mut bytes = [0u8; 40];
        bytes[..8].copy_from_slice(&info.height.to_be_bytes());
        bytes[8..].copy_from_slice(info.frontier.as_bytes());
        self.store
            .confirmation_height_db
            .put(&mut self.txn, account.as_bytes().as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn confirmation_height_del(&mut self, account: &Account) -> Result<(), StoreError> {
        self.store
            .confirmation_height_db
            .delete(&mut self.txn, account.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn final_vote_put(&mut self, root: &Root, hash: &BlockHash) -> Result<(), StoreError> {
        self.store
            .final_votes_db
            .put(
                &mut self.txn,
                root.as_bytes().as_slice(),
                hash.as_bytes().as_slice(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn final_vote_del(&mut self, root: &Root) -> Result<(), StoreError> {
        self.store
            .final_votes_db
            .delete(&mut self.txn, root.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn online_weight_put(
        &mut self,
        sample_time: Timestamp,
        weight: Amount,
    ) -> Result<(), StoreError> {
        self.store
            .online_weight_db
            .put(
                &mut self.txn,
                sample_time.as_secs().to_be_bytes().as_slice(),
                weight.to_be_bytes().as_slice(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn online_weight_del(&mut self, sample_time: Timestamp) -> Result<(), StoreError> {
        self.store
            .online_weight_db
            .delete(&mut self.txn, sample_time.as_secs().to_be_bytes().as_slice())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn peer_put(&mut self, endpoint: &str, last_contact: Timestamp) -> Result<(), StoreError> {
        self.store
            .peers_db
            .put(
                &mut self.txn,
                endpoint.as_bytes(),
                last_contact.as_secs().to_be_bytes().as_slice(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn peer_del(&mut self, endpoint: &str) -> Result<(), StoreError> {
        self.store
            .peers_db
            .delete(&mut self.txn, endpoint.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn version_put(&mut self, version: u32) -> Result<(), StoreError> {
        self.store
            .meta_db
            .put(
                &mut self.txn,
                VERSION_KEY.as_slice(),
                version.to_be_bytes().as_slice(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
