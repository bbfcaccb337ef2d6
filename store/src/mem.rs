//! In-memory backend.
//!
//! Used by unit tests and the dev tooling. Write transactions stage into a
//! copy of the state while holding the writer lock, so writers serialize and
//! a dropped transaction publishes nothing; read transactions clone a
//! snapshot and stay consistent for their lifetime.

use crate::account::AccountInfo;
use crate::confirmation_height::ConfirmationHeightInfo;
use crate::error::StoreError;
use crate::pending::{PendingInfo, PendingKey};
use crate::txn::{ReadTransaction, Store, Table, WriteTransaction};
use crate::unchecked::{UncheckedInfo, UncheckedKey};
use cobalt_types::{Account, Amount, BlockHash, Root, Timestamp};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct MemState {
    accounts: BTreeMap<[u8; 32], AccountInfo>,
    blocks: BTreeMap<[u8; 32], Vec<u8>>,
    pending: BTreeMap<[u8; 64], PendingInfo>,
    unchecked: BTreeMap<[u8; 64], UncheckedInfo>,
    frontiers: BTreeMap<[u8; 32], Account>,
    representation: BTreeMap<[u8; 32], Amount>,
    confirmation_height: BTreeMap<[u8; 32], ConfirmationHeightInfo>,
    final_votes: BTreeMap<[u8; 32], BlockHash>,
    online_weight: BTreeMap<u64, Amount>,
    peers: BTreeMap<String, Timestamp>,
    version: u32,
}

impl MemState {
    fn read(&self) -> MemRead<'_> {
        MemRead { state: self }
    }
}

/// Shared read-path over a `MemState`, used by both transaction kinds.
struct MemRead<'a> {
    state: &'a MemState,
}

impl MemRead<'_> {
    fn account_get(&self, account: &Account) -> Option<AccountInfo> {
        self.state.accounts.get(account.as_bytes()).cloned()
    }

    fn pending_iter_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)> {
        let mut lower = [0u8; 64];
        lower[..32].copy_from_slice(account.as_bytes());
        let mut upper = [0xFFu8; 64];
        upper[..32].copy_from_slice(account.as_bytes());
        self.state
            .pending
            .range(lower..=upper)
            .filter_map(|(k, v)| PendingKey::from_bytes(k).map(|key| (key, *v)))
            .collect()
    }

    fn unchecked_get(&self, dependency: &BlockHash) -> Vec<(UncheckedKey, UncheckedInfo)> {
        let mut lower = [0u8; 64];
        lower[..32].copy_from_slice(dependency.as_bytes());
        let mut upper = [0xFFu8; 64];
        upper[..32].copy_from_slice(dependency.as_bytes());
        self.state
            .unchecked
            .range(lower..=upper)
            .filter_map(|(k, v)| UncheckedKey::from_bytes(k).map(|key| (key, v.clone())))
            .collect()
    }

    fn block_random(&self) -> Option<(BlockHash, Vec<u8>)> {
        if self.state.blocks.is_empty() {
            return None;
        }
        let probe: [u8; 32] = rand::thread_rng().gen();
        self.state
            .blocks
            .range(probe..)
            .next()
            .or_else(|| self.state.blocks.iter().next())
            .map(|(k, v)| (BlockHash::new(*k), v.clone()))
    }
}

macro_rules! impl_read_txn {
    ($ty:ident, $field:ident) => {
        impl ReadTransaction for $ty<'_> {
            fn account_get(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
                Ok(self.$field.read().account_get(account))
            }

            fn account_count(&self) -> Result<u64, StoreError> {
                Ok(self.$field.accounts.len() as u64)
            }

            fn block_get(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
                Ok(self.$field.blocks.get(hash.as_bytes()).cloned())
            }

            fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError> {
                Ok(self.$field.blocks.contains_key(hash.as_bytes()))
            }

            fn block_count(&self) -> Result<u64, StoreError> {
                Ok(self.$field.blocks.len() as u64)
            }

            fn block_random(&self) -> Result<Option<(BlockHash, Vec<u8>)>, StoreError> {
                Ok(self.$field.read().block_random())
            }

            fn pending_get(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
                Ok(self.$field.pending.get(&key.to_bytes()).copied())
            }

            fn pending_exists(&self, key: &PendingKey) -> Result<bool, StoreError> {
                Ok(self.$field.pending.contains_key(&key.to_bytes()))
            }

            fn pending_iter_account(
                &self,
                account: &Account,
            ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
                Ok(self.$field.read().pending_iter_account(account))
            }

            fn pending_count(&self) -> Result<u64, StoreError> {
                Ok(self.$field.pending.len() as u64)
            }

            fn unchecked_get(
                &self,
                dependency: &BlockHash,
            ) -> Result<Vec<(UncheckedKey, UncheckedInfo)>, StoreError> {
                Ok(self.$field.read().unchecked_get(dependency))
            }

            fn unchecked_count(&self) -> Result<u64, StoreError> {
                Ok(self.$field.unchecked.len() as u64)
            }

            fn frontier_get(&self, hash: &BlockHash) -> Result<Option<Account>, StoreError> {
                Ok(self.$field.frontiers.get(hash.as_bytes()).copied())
            }

            fn rep_weight_get(&self, representative: &Account) -> Result<Amount, StoreError> {
                Ok(self
                    .$field
                    .representation
                    .get(representative.as_bytes())
                    .copied()
                    .unwrap_or(Amount::ZERO))
            }

            fn rep_weights_iter(&self) -> Result<Vec<(Account, Amount)>, StoreError> {
                Ok(self
                    .$field
                    .representation
                    .iter()
                    .map(|(k, v)| (Account::new(*k), *v))
                    .collect())
            }

            fn confirmation_height_get(
                &self,
                account: &Account,
            ) -> Result<Option<ConfirmationHeightInfo>, StoreError> {
                Ok(self
                    .$field
                    .confirmation_height
                    .get(account.as_bytes())
                    .copied())
            }

            fn final_vote_get(&self, root: &Root) -> Result<Option<BlockHash>, StoreError> {
                Ok(self.$field.final_votes.get(root.as_bytes()).copied())
            }

            fn online_weight_iter(&self) -> Result<Vec<(Timestamp, Amount)>, StoreError> {
                Ok(self
                    .$field
                    .online_weight
                    .iter()
                    .map(|(k, v)| (Timestamp::new(*k), *v))
                    .collect())
            }

            fn peers_iter(&self) -> Result<Vec<(String, Timestamp)>, StoreError> {
                Ok(self
                    .$field
                    .peers
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect())
            }

            fn version_get(&self) -> Result<u32, StoreError> {
                Ok(self.$field.version)
            }

            fn renew(&mut self) -> Result<(), StoreError> {
                self.renew_impl()
            }
        }
    };
}

/// Snapshot read transaction.
pub struct MemReadTransaction<'a> {
    store: &'a MemStore,
    snapshot: MemState,
}

impl MemReadTransaction<'_> {
    fn renew_impl(&mut self) -> Result<(), StoreError> {
        self.snapshot = self.store.state.lock().unwrap().clone();
        Ok(())
    }
}

impl_read_txn!(MemReadTransaction, snapshot);

/// Staged write transaction; holds the writer lock for its lifetime.
pub struct MemWriteTransaction<'a> {
    guard: MutexGuard<'a, MemState>,
    staged: MemState,
}

impl MemWriteTransaction<'_> {
    fn renew_impl(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl_read_txn!(MemWriteTransaction, staged);

impl WriteTransaction for MemWriteTransaction<'_> {
    fn account_put(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        self.staged
            .accounts
            .insert(*account.as_bytes(), info.clone());
        Ok(())
    }

    fn account_del(&mut self, account: &Account) -> Result<(), StoreError> {
        self.staged.accounts.remove(account.as_bytes());
        Ok(())
    }

    fn block_put(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError> {
        self.staged.blocks.insert(*hash.as_bytes(), bytes.to_vec());
        Ok(())
    }

    fn block_del(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.staged.blocks.remove(hash.as_bytes());
        Ok(())
    }

    fn pending_put(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        self.staged.pending.insert(key.to_bytes(), *info);
        Ok(())
    }

    fn pending_del(&mut self, key: &PendingKey) -> Result<(), StoreError> {
        self.staged.pending.remove(&key.to_bytes());
        Ok(())
    }

    fn unchecked_put(
        &mut self,
        key: &UncheckedKey,
        info: &UncheckedInfo,
    ) -> Result<(), StoreError> {
        self.staged.unchecked.insert(key.to_bytes(), info.clone());
        Ok(())
    }

    fn unchecked_del(&mut self, key: &UncheckedKey) -> Result<(), StoreError> {
        self.staged.unchecked.remove(&key.to_bytes());
        Ok(())
    }

    fn frontier_put(&mut self, hash: &BlockHash, account: &Account) -> Result<(), StoreError> {
        self.staged.frontiers.insert(*hash.as_bytes(), *account);
        Ok(())
    }

    fn frontier_del(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.staged.frontiers.remove(hash.as_bytes());
        Ok(())
    }

    fn rep_weight_put(
        &mut self,
        representative: &Account,
        weight: Amount,
    ) -> Result<(), StoreError> {
        if weight.is_zero() {
            self.staged.representation.remove(representative.as_bytes());
        } else {
            self.staged
                .representation
                .insert(*representative.as_bytes(), weight);
        }
        Ok(())
    }

    fn confirmation_height_put(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        self.staged
            .confirmation_height
            .insert(*account.as_bytes(), *info);
        Ok(())
    }

    fn confirmation_height_del(&mut self, account: &Account) -> Result<(), StoreError> {
        self.staged.confirmation_height.remove(account.as_bytes());
        Ok(())
    }

    fn final_vote_put(&mut self, root: &Root, hash: &BlockHash) -> Result<(), StoreError> {
        self.staged.final_votes.insert(*root.as_bytes(), *hash);
        Ok(())
    }

    fn final_vote_del(&mut self, root: &Root) -> Result<(), StoreError> {
        self.staged.final_votes.remove(root.as_bytes());
        Ok(())
    }

    fn online_weight_put(
        &mut self,
        sample_time: Timestamp,
        weight: Amount,
    ) -> Result<(), StoreError> {
        self.staged
            .online_weight
            .insert(sample_time.as_secs(), weight);
        Ok(())
    }

    fn online_weight_del(&mut self, sample_time: Timestamp) -> Result<(), StoreError> {
        self.staged.online_weight.remove(&sample_time.as_secs());
        Ok(())
    }

    fn peer_put(&mut self, endpoint: &str, last_contact: Timestamp) -> Result<(), StoreError> {
        self.staged.peers.insert(endpoint.to_string(), last_contact);
        Ok(())
    }

    fn peer_del(&mut self, endpoint: &str) -> Result<(), StoreError> {
        self.staged.peers.remove(endpoint);
        Ok(())
    }

    fn version_put(&mut self, version: u32) -> Result<(), StoreError> {
        self.staged.version = version;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

/// The in-memory store.
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState::default()),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemStore {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>, StoreError> {
        let snapshot = self.state.lock().unwrap().clone();
        Ok(Box::new(MemReadTransaction {
            store: self,
            snapshot,
        }))
    }

    fn tx_begin_write(
        &self,
        _tables: &[Table],
    ) -> Result<Box<dyn WriteTransaction + '_>, StoreError> {
        let guard = self.state.lock().unwrap();
        let staged = guard.clone();
        Ok(Box::new(MemWriteTransaction { guard, staged }))
    }
}
