//! The state-transition function.
//!
//! `process` validates one block against the store and, on success, applies
//! its effects to `accounts`, `blocks`, `pending`, `frontiers` and
//! `representation` inside the caller's write transaction. `rollback`
//! reverses blocks from an account head back to a target, recursing through
//! dependent receives on other chains, and refuses to cross a cemented
//! height.

use crate::block::{Block, LinkInterpretation, SignerKind};
use crate::genesis::genesis_for;
use crate::sideband::{BlockDetails, Sideband, StoredBlock};
use cobalt_crypto::verify_signature;
use cobalt_store::{
    AccountInfo, ConfirmationHeightInfo, PendingInfo, PendingKey, ReadTransaction, StoreError,
    WriteTransaction,
};
use cobalt_types::{Account, Amount, BlockHash, Epoch, Epochs, NetworkProfile, Timestamp};
use cobalt_work::{threshold, work_value, WorkSubtype};

/// Outcome of processing one block. Everything except `Progress` leaves the
/// transaction untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    Progress,
    BadSignature,
    Old,
    NegativeSpend,
    Fork,
    Unreceivable,
    GapPrevious,
    GapSource,
    GapEpochOpenPending,
    OpenedBurnAccount,
    BalanceMismatch,
    RepresentativeMismatch,
    BlockPosition,
    InsufficientWork,
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("block not found")]
    BlockNotFound,
    #[error("rollback would cross a cemented height")]
    Cemented,
    #[error("inconsistent chain: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolved per-network constants: the profile plus the concrete genesis.
pub struct LedgerConstants {
    pub profile: NetworkProfile,
    pub genesis_account: Account,
    pub genesis_block: Block,
    pub epochs: Epochs,
}

impl LedgerConstants {
    pub fn for_profile(profile: NetworkProfile) -> Self {
        let genesis = genesis_for(&profile);
        let epochs = Epochs::new(genesis.account, genesis.account);
        Self {
            profile,
            genesis_account: genesis.account,
            genesis_block: genesis.block,
            epochs,
        }
    }
}

/// Classification computed while validating a state block.
struct StateOutcome {
    height: u64,
    interpretation: LinkInterpretation,
    is_epoch: bool,
    effective_epoch: Epoch,
    source_epoch: Epoch,
    signed_by_epoch_signer: bool,
    /// Receivable consumed by a receive, if any.
    consumed_pending: Option<(PendingKey, PendingInfo)>,
    /// Receivable produced by a send, if any.
    produced_pending: Option<(PendingKey, PendingInfo)>,
}

pub struct Ledger {
    pub constants: LedgerConstants,
}

impl Ledger {
    pub fn new(constants: LedgerConstants) -> Self {
        Self { constants }
    }

    /// Seed an empty store with the genesis block, fully cemented.
    pub fn initialize(&self, txn: &mut dyn WriteTransaction) -> Result<(), StoreError> {
        if txn.block_count()? > 0 {
            return Ok(());
        }
        let account = self.constants.genesis_account;
        let amount = self.constants.profile.genesis_amount;
        let hash = self.constants.genesis_block.hash();
        let stored = StoredBlock {
            block: self.constants.genesis_block.clone(),
            sideband: Sideband {
                height: 1,
                timestamp: Timestamp::now(),
                successor: BlockHash::ZERO,
                account,
                balance: amount,
                details: BlockDetails {
                    epoch: Epoch::Epoch0,
                    is_send: false,
                    is_receive: true,
                    is_epoch: false,
                },
                source_epoch: Epoch::Epoch0,
            },
        };
        txn.block_put(&hash, &stored.to_bytes())?;
        txn.frontier_put(&hash, &account)?;
        txn.account_put(
            &account,
            &AccountInfo {
                head: hash,
                open_block: hash,
                representative: account,
                balance: amount,
                modified: Timestamp::now(),
                block_count: 1,
                epoch: Epoch::Epoch0,
                confirmation_height: 1,
            },
        )?;
        txn.confirmation_height_put(&account, &ConfirmationHeightInfo::new(1, hash))?;
        txn.rep_weight_put(&account, amount)?;
        tracing::info!(genesis = %hash, network = self.constants.profile.id.as_str(), "ledger initialized");
        Ok(())
    }

    // ── queries ─────────────────────────────────────────────────────────

    pub fn stored_block(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<Option<StoredBlock>, StoreError> {
        txn.block_get(hash)?
            .map(|bytes| {
                StoredBlock::from_bytes(&bytes).map_err(|e| StoreError::Corruption {
                    table: "blocks",
                    detail: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn block_account(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.stored_block(txn, hash)?.map(|s| s.sideband.account))
    }

    pub fn balance(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<Option<Amount>, StoreError> {
        Ok(self.stored_block(txn, hash)?.map(|s| s.sideband.balance))
    }

    pub fn block_successor(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<Option<BlockHash>, StoreError> {
        Ok(self.stored_block(txn, hash)?.and_then(|s| {
            (!s.sideband.successor.is_zero()).then_some(s.sideband.successor)
        }))
    }

    /// Vote weight delegated to a representative.
    pub fn weight(&self, txn: &dyn ReadTransaction, rep: &Account) -> Result<Amount, StoreError> {
        txn.rep_weight_get(rep)
    }

    /// Whether a block is at or below its account's cemented height. Stable
    /// within a transaction: once true it stays true for that snapshot.
    pub fn block_confirmed(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<bool, StoreError> {
        let Some(stored) = self.stored_block(txn, hash)? else {
            return Ok(false);
        };
        let cemented = txn
            .confirmation_height_get(&stored.sideband.account)?
            .map(|c| c.height)
            .unwrap_or(0);
        Ok(stored.sideband.height <= cemented)
    }

    /// The representative in effect at a block: the block's own field, or
    /// the nearest ancestor that carries one.
    pub fn representative_of(
        &self,
        txn: &dyn ReadTransaction,
        hash: &BlockHash,
    ) -> Result<Option<Account>, StoreError> {
        let mut current = *hash;
        loop {
            let Some(stored) = self.stored_block(txn, &current)? else {
                return Ok(None);
            };
            if let Some(rep) = stored.block.representative_field() {
                return Ok(Some(rep));
            }
            let previous = stored.block.previous();
            if previous.is_zero() {
                return Ok(None);
            }
            current = previous;
        }
    }

    // ── process ─────────────────────────────────────────────────────────

    pub fn process(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
    ) -> Result<ProcessResult, StoreError> {
        let hash = block.hash();

        // Cheap work pre-check against the lowest plausible threshold; the
        // exact per-epoch threshold is re-checked once the subtype is known.
        if !self.work_ok(block, Epoch::Epoch2, WorkSubtype::Receive)
            && !self.work_ok(block, Epoch::Epoch0, WorkSubtype::Receive)
        {
            return Ok(ProcessResult::InsufficientWork);
        }

        if txn.block_exists(&hash)? {
            return Ok(ProcessResult::Old);
        }

        let previous_hash = block.previous();
        let previous = if previous_hash.is_zero() {
            None
        } else {
            match self.stored_block(txn, &previous_hash)? {
                Some(stored) => Some(stored),
                None => return Ok(ProcessResult::GapPrevious),
            }
        };

        let result = match block {
            Block::Send(_) | Block::Receive(_) | Block::Change(_) => {
                self.process_legacy_chained(txn, block, hash, previous.as_ref().unwrap())?
            }
            Block::Open(_) => self.process_legacy_open(txn, block, hash)?,
            Block::State(_) | Block::State2(_) => {
                self.process_state(txn, block, hash, previous.as_ref())?
            }
        };
        if result == ProcessResult::Progress {
            tracing::debug!(%hash, kind = block.block_type().as_str(), "block applied");
        }
        Ok(result)
    }

    fn work_ok(&self, block: &Block, epoch: Epoch, subtype: WorkSubtype) -> bool {
        work_value(&block.root(), block.work())
            >= threshold(&self.constants.profile.work, epoch, subtype)
    }

    /// Legacy send/receive/change: the signing account comes from the
    /// previous block's sideband.
    fn process_legacy_chained(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        hash: BlockHash,
        previous: &StoredBlock,
    ) -> Result<ProcessResult, StoreError> {
        if !self.work_ok(block, Epoch::Epoch0, WorkSubtype::Send) {
            return Ok(ProcessResult::InsufficientWork);
        }
        let account = previous.sideband.account;
        if !verify_signature(hash.as_bytes(), block.signature(), &account.public_key()) {
            return Ok(ProcessResult::BadSignature);
        }
        let Some(info) = txn.account_get(&account)? else {
            return Err(StoreError::Corruption {
                table: "accounts",
                detail: format!("missing info for account of stored block {account}"),
            });
        };
        // Legacy encodings are only valid on pre-upgrade chains.
        if info.epoch != Epoch::Epoch0 {
            return Ok(ProcessResult::BlockPosition);
        }
        if block.previous() != info.head {
            return Ok(ProcessResult::Fork);
        }

        let mut new_balance = info.balance;
        let mut new_rep = info.representative;
        let mut details = BlockDetails {
            epoch: Epoch::Epoch0,
            ..Default::default()
        };
        let mut source_epoch = Epoch::Epoch0;

        match block {
            Block::Send(b) => {
                if b.balance > info.balance {
                    return Ok(ProcessResult::NegativeSpend);
                }
                let amount = info.balance - b.balance;
                new_balance = b.balance;
                details.is_send = true;
                txn.pending_put(
                    &PendingKey::new(b.destination, hash),
                    &PendingInfo {
                        source: account,
                        amount,
                        epoch: Epoch::Epoch0,
                    },
                )?;
            }
            Block::Receive(b) => {
                if !txn.block_exists(&b.source)? {
                    return Ok(ProcessResult::GapSource);
                }
                let key = PendingKey::new(account, b.source);
                let Some(pending) = txn.pending_get(&key)? else {
                    return Ok(ProcessResult::Unreceivable);
                };
                // Receivables from upgraded chains need a state receive.
                if pending.epoch != Epoch::Epoch0 {
                    return Ok(ProcessResult::Unreceivable);
                }
                new_balance = info.balance.saturating_add(pending.amount);
                details.is_receive = true;
                source_epoch = pending.epoch;
                txn.pending_del(&key)?;
            }
            Block::Change(b) => {
                new_rep = b.representative;
            }
            _ => unreachable!("open and state blocks take other paths"),
        }

        self.move_weight(txn, Some((info.representative, info.balance)), new_rep, new_balance)?;
        self.append_block(
            txn,
            block,
            hash,
            Sideband {
                height: info.next_height(),
                timestamp: Timestamp::now(),
                successor: BlockHash::ZERO,
                account,
                balance: new_balance,
                details,
                source_epoch,
            },
        )?;
        txn.account_put(
            &account,
            &AccountInfo {
                head: hash,
                representative: new_rep,
                balance: new_balance,
                modified: Timestamp::now(),
                block_count: info.block_count + 1,
                ..info
            },
        )?;
        Ok(ProcessResult::Progress)
    }

    fn process_legacy_open(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        hash: BlockHash,
    ) -> Result<ProcessResult, StoreError> {
        let Block::Open(b) = block else {
            unreachable!()
        };
        if !self.work_ok(block, Epoch::Epoch0, WorkSubtype::Receive) {
            return Ok(ProcessResult::InsufficientWork);
        }
        if b.account.is_zero() {
            return Ok(ProcessResult::OpenedBurnAccount);
        }
        if !verify_signature(hash.as_bytes(), block.signature(), &b.account.public_key()) {
            return Ok(ProcessResult::BadSignature);
        }
        if txn.account_get(&b.account)?.is_some() {
            return Ok(ProcessResult::Fork);
        }
        if !txn.block_exists(&b.source)? {
            return Ok(ProcessResult::GapSource);
        }
        let key = PendingKey::new(b.account, b.source);
        let Some(pending) = txn.pending_get(&key)? else {
            return Ok(ProcessResult::Unreceivable);
        };
        if pending.epoch != Epoch::Epoch0 {
            return Ok(ProcessResult::Unreceivable);
        }
        txn.pending_del(&key)?;

        self.move_weight(txn, None, b.representative, pending.amount)?;
        let stored = StoredBlock {
            block: block.clone(),
            sideband: Sideband {
                height: 1,
                timestamp: Timestamp::now(),
                successor: BlockHash::ZERO,
                account: b.account,
                balance: pending.amount,
                details: BlockDetails {
                    epoch: Epoch::Epoch0,
                    is_send: false,
                    is_receive: true,
                    is_epoch: false,
                },
                source_epoch: pending.epoch,
            },
        };
        txn.block_put(&hash, &stored.to_bytes())?;
        txn.frontier_put(&hash, &b.account)?;
        txn.account_put(
            &b.account,
            &AccountInfo {
                head: hash,
                open_block: hash,
                representative: b.representative,
                balance: pending.amount,
                modified: Timestamp::now(),
                block_count: 1,
                epoch: Epoch::Epoch0,
                confirmation_height: 0,
            },
        )?;
        Ok(ProcessResult::Progress)
    }

    fn process_state(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        hash: BlockHash,
        previous: Option<&StoredBlock>,
    ) -> Result<ProcessResult, StoreError> {
        let account = block.account_field().expect("state blocks carry account");
        let representative = block
            .representative_field()
            .expect("state blocks carry representative");
        let balance = block.balance_field().expect("state blocks carry balance");
        let link = block.link_field().expect("state blocks carry link");
        let previous_hash = block.previous();

        if account.is_zero() {
            return Ok(ProcessResult::OpenedBurnAccount);
        }

        // Signature before any fork/position decision: the account's own
        // key, or the epoch signer when the link carries an upgrade marker.
        // The type-specific stage pins down which of the two must have
        // signed.
        let signed_by_account =
            verify_signature(hash.as_bytes(), block.signature(), &account.public_key());
        let signed_by_epoch_signer = self
            .constants
            .epochs
            .epoch_of_link(&link)
            .and_then(|epoch| self.constants.epochs.signer(epoch))
            .map(|signer| {
                verify_signature(hash.as_bytes(), block.signature(), &signer.public_key())
            })
            .unwrap_or(false);
        if !signed_by_account && !signed_by_epoch_signer {
            return Ok(ProcessResult::BadSignature);
        }

        let info = txn.account_get(&account)?;
        if previous_hash.is_zero() {
            if info.is_some() {
                return Ok(ProcessResult::Fork);
            }
        } else {
            let Some(previous) = previous else {
                return Ok(ProcessResult::GapPrevious);
            };
            // The referenced previous exists (the caller resolved it). If
            // it sits on another account's chain, nothing is missing: this
            // is a forged continuity claim competing for that root.
            if previous.sideband.account != account {
                return Ok(ProcessResult::Fork);
            }
            let Some(info) = &info else {
                return Err(StoreError::Corruption {
                    table: "accounts",
                    detail: format!("missing info for account of stored block {account}"),
                });
            };
            if previous_hash != info.head {
                return Ok(ProcessResult::Fork);
            }
        }

        let prev_balance = info.as_ref().map(|i| i.balance).unwrap_or(Amount::ZERO);
        let is_epoch =
            self.constants.epochs.is_epoch_link(&link) && balance == prev_balance;

        let outcome = if is_epoch {
            match self.validate_epoch(
                txn,
                account,
                representative,
                &link,
                &info,
                signed_by_epoch_signer,
            )? {
                Ok(outcome) => outcome,
                Err(result) => return Ok(result),
            }
        } else {
            match self.validate_state_transfer(
                txn,
                hash,
                account,
                balance,
                &link,
                &info,
                signed_by_account,
            )? {
                Ok(outcome) => outcome,
                Err(result) => return Ok(result),
            }
        };

        // Exact work threshold now that the subtype is known.
        let subtype = match outcome.interpretation {
            LinkInterpretation::Send => WorkSubtype::Send,
            LinkInterpretation::Noop if !outcome.is_epoch => WorkSubtype::Send,
            _ => WorkSubtype::Receive,
        };
        if !self.work_ok(block, outcome.effective_epoch, subtype) {
            return Ok(ProcessResult::InsufficientWork);
        }

        if let Block::State2(b2) = block {
            if b2.height != outcome.height {
                return Ok(ProcessResult::BlockPosition);
            }
            if b2.flags.link_interpretation != outcome.interpretation {
                return Ok(ProcessResult::BalanceMismatch);
            }
            if b2.flags.is_upgrade != outcome.is_epoch {
                return Ok(ProcessResult::BlockPosition);
            }
            if b2.flags.version != outcome.effective_epoch {
                return Ok(ProcessResult::BlockPosition);
            }
            let declared_epoch_signer = b2.flags.signer == SignerKind::EpochSigner;
            if declared_epoch_signer != outcome.signed_by_epoch_signer {
                return Ok(ProcessResult::BadSignature);
            }
        }

        // Apply.
        if let Some((key, _)) = &outcome.consumed_pending {
            txn.pending_del(key)?;
        }
        if let Some((key, pending)) = &outcome.produced_pending {
            txn.pending_put(key, pending)?;
        }
        self.move_weight(
            txn,
            info.as_ref().map(|i| (i.representative, i.balance)),
            representative,
            balance,
        )?;
        let sideband = Sideband {
            height: outcome.height,
            timestamp: Timestamp::now(),
            successor: BlockHash::ZERO,
            account,
            balance,
            details: BlockDetails {
                epoch: outcome.effective_epoch,
                is_send: outcome.interpretation == LinkInterpretation::Send,
                is_receive: outcome.interpretation == LinkInterpretation::Receive,
                is_epoch: outcome.is_epoch,
            },
            source_epoch: outcome.source_epoch,
        };
        if info.is_some() {
            self.append_block(txn, block, hash, sideband)?;
        } else {
            let stored = StoredBlock {
                block: block.clone(),
                sideband,
            };
            txn.block_put(&hash, &stored.to_bytes())?;
        }
        txn.account_put(
            &account,
            &AccountInfo {
                head: hash,
                open_block: info
                    .as_ref()
                    .map(|i| i.open_block)
                    .unwrap_or(hash),
                representative,
                balance,
                modified: Timestamp::now(),
                block_count: outcome.height,
                epoch: outcome.effective_epoch,
                confirmation_height: info
                    .as_ref()
                    .map(|i| i.confirmation_height)
                    .unwrap_or(0),
            },
        )?;
        Ok(ProcessResult::Progress)
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_epoch(
        &self,
        txn: &mut dyn WriteTransaction,
        account: Account,
        representative: Account,
        link: &cobalt_types::Link,
        info: &Option<AccountInfo>,
        signed_by_epoch_signer: bool,
    ) -> Result<Result<StateOutcome, ProcessResult>, StoreError> {
        let epoch = self
            .constants
            .epochs
            .epoch_of_link(link)
            .expect("caller checked the link is an epoch marker");

        match info {
            Some(info) => {
                if info.epoch.successor() != Some(epoch) {
                    return Ok(Err(ProcessResult::BlockPosition));
                }
                if representative != info.representative {
                    return Ok(Err(ProcessResult::RepresentativeMismatch));
                }
                Ok(Ok(StateOutcome {
                    height: info.next_height(),
                    interpretation: LinkInterpretation::Noop,
                    is_epoch: true,
                    effective_epoch: epoch,
                    source_epoch: Epoch::Epoch0,
                    signed_by_epoch_signer,
                    consumed_pending: None,
                    produced_pending: None,
                }))
            }
            None => {
                // Epoch open: creates the account with zero balance so a
                // later receive lands directly in the new epoch.
                if !representative.is_zero() {
                    return Ok(Err(ProcessResult::RepresentativeMismatch));
                }
                if txn.pending_iter_account(&account)?.is_empty() {
                    return Ok(Err(ProcessResult::GapEpochOpenPending));
                }
                Ok(Ok(StateOutcome {
                    height: 1,
                    interpretation: LinkInterpretation::Noop,
                    is_epoch: true,
                    effective_epoch: epoch,
                    source_epoch: Epoch::Epoch0,
                    signed_by_epoch_signer,
                    consumed_pending: None,
                    produced_pending: None,
                }))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_state_transfer(
        &self,
        txn: &mut dyn WriteTransaction,
        hash: BlockHash,
        account: Account,
        balance: Amount,
        link: &cobalt_types::Link,
        info: &Option<AccountInfo>,
        signed_by_account: bool,
    ) -> Result<Result<StateOutcome, ProcessResult>, StoreError> {
        // Transfers must be signed by the account itself; an epoch-signer
        // signature only authorizes upgrade blocks.
        if !signed_by_account {
            return Ok(Err(ProcessResult::BadSignature));
        }

        match info {
            Some(info) => {
                let height = info.next_height();
                if balance < info.balance {
                    // Send: link is the destination.
                    let amount = info.balance - balance;
                    Ok(Ok(StateOutcome {
                        height,
                        interpretation: LinkInterpretation::Send,
                        is_epoch: false,
                        effective_epoch: info.epoch,
                        source_epoch: Epoch::Epoch0,
                        signed_by_epoch_signer: false,
                        consumed_pending: None,
                        produced_pending: Some((
                            PendingKey::new(link.as_account(), hash),
                            PendingInfo {
                                source: account,
                                amount,
                                epoch: info.epoch,
                            },
                        )),
                    }))
                } else if balance > info.balance {
                    // Receive: link is the source send.
                    if link.is_zero() {
                        return Ok(Err(ProcessResult::BalanceMismatch));
                    }
                    let source = link.as_block_hash();
                    if !txn.block_exists(&source)? {
                        return Ok(Err(ProcessResult::GapSource));
                    }
                    let key = PendingKey::new(account, source);
                    let Some(pending) = txn.pending_get(&key)? else {
                        return Ok(Err(ProcessResult::Unreceivable));
                    };
                    if balance - info.balance != pending.amount {
                        return Ok(Err(ProcessResult::BalanceMismatch));
                    }
                    let effective_epoch = info.epoch.max(pending.epoch);
                    Ok(Ok(StateOutcome {
                        height,
                        interpretation: LinkInterpretation::Receive,
                        is_epoch: false,
                        effective_epoch,
                        source_epoch: pending.epoch,
                        signed_by_epoch_signer: false,
                        consumed_pending: Some((key, pending)),
                        produced_pending: None,
                    }))
                } else {
                    // Noop: representative change only.
                    if !link.is_zero() {
                        return Ok(Err(ProcessResult::BalanceMismatch));
                    }
                    Ok(Ok(StateOutcome {
                        height,
                        interpretation: LinkInterpretation::Noop,
                        is_epoch: false,
                        effective_epoch: info.epoch,
                        source_epoch: Epoch::Epoch0,
                        signed_by_epoch_signer: false,
                        consumed_pending: None,
                        produced_pending: None,
                    }))
                }
            }
            None => {
                // Open: must receive an existing receivable.
                let source = link.as_block_hash();
                if source.is_zero() || !txn.block_exists(&source)? {
                    return Ok(Err(ProcessResult::GapSource));
                }
                let key = PendingKey::new(account, source);
                let Some(pending) = txn.pending_get(&key)? else {
                    return Ok(Err(ProcessResult::Unreceivable));
                };
                if balance != pending.amount {
                    return Ok(Err(ProcessResult::BalanceMismatch));
                }
                Ok(Ok(StateOutcome {
                    height: 1,
                    interpretation: LinkInterpretation::Receive,
                    is_epoch: false,
                    effective_epoch: pending.epoch,
                    source_epoch: pending.epoch,
                    signed_by_epoch_signer: false,
                    consumed_pending: Some((key, pending)),
                    produced_pending: None,
                }))
            }
        }
    }

    /// Store the block, link the previous block's successor to it, and
    /// maintain the legacy frontier index.
    fn append_block(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        hash: BlockHash,
        sideband: Sideband,
    ) -> Result<(), StoreError> {
        let stored = StoredBlock {
            block: block.clone(),
            sideband,
        };
        txn.block_put(&hash, &stored.to_bytes())?;
        let previous_hash = block.previous();
        self.set_successor(txn, &previous_hash, hash)?;
        txn.frontier_del(&previous_hash)?;
        if block.is_legacy() {
            txn.frontier_put(&hash, &sideband.account)?;
        }
        Ok(())
    }

    fn set_successor(
        &self,
        txn: &mut dyn WriteTransaction,
        hash: &BlockHash,
        successor: BlockHash,
    ) -> Result<(), StoreError> {
        let Some(mut stored) = self.stored_block(txn, hash)? else {
            return Err(StoreError::Corruption {
                table: "blocks",
                detail: "successor target missing".into(),
            });
        };
        stored.sideband.successor = successor;
        txn.block_put(hash, &stored.to_bytes())
    }

    /// `representation[old_rep] -= old_balance; representation[new_rep] +=
    /// new_balance` — in the same transaction as the block that caused it.
    fn move_weight(
        &self,
        txn: &mut dyn WriteTransaction,
        old: Option<(Account, Amount)>,
        new_rep: Account,
        new_balance: Amount,
    ) -> Result<(), StoreError> {
        if let Some((old_rep, old_balance)) = old {
            let weight = txn.rep_weight_get(&old_rep)?.saturating_sub(old_balance);
            txn.rep_weight_put(&old_rep, weight)?;
        }
        if !new_rep.is_zero() || !new_balance.is_zero() {
            let weight = txn.rep_weight_get(&new_rep)?.saturating_add(new_balance);
            txn.rep_weight_put(&new_rep, weight)?;
        }
        Ok(())
    }

    // ── rollback ────────────────────────────────────────────────────────

    /// Undo blocks from the account's head back to (and including) `target`.
    /// Receives on other chains that depend on rolled-back sends are rolled
    /// back first. Returns the undone hashes, heads first.
    pub fn rollback(
        &self,
        txn: &mut dyn WriteTransaction,
        target: &BlockHash,
    ) -> Result<Vec<BlockHash>, RollbackError> {
        let mut rolled = Vec::new();
        self.rollback_inner(txn, target, &mut rolled, 0)?;
        Ok(rolled)
    }

    fn rollback_inner(
        &self,
        txn: &mut dyn WriteTransaction,
        target: &BlockHash,
        rolled: &mut Vec<BlockHash>,
        depth: usize,
    ) -> Result<(), RollbackError> {
        if depth > 64 {
            return Err(RollbackError::Corrupt("rollback recursion too deep".into()));
        }
        let Some(target_stored) = self.stored_block(txn, target)? else {
            return Err(RollbackError::BlockNotFound);
        };
        let account = target_stored.sideband.account;
        let cemented = txn
            .confirmation_height_get(&account)?
            .map(|c| c.height)
            .unwrap_or(0);
        if target_stored.sideband.height <= cemented {
            return Err(RollbackError::Cemented);
        }

        loop {
            let Some(info) = txn.account_get(&account)? else {
                return Err(RollbackError::Corrupt("account vanished mid-rollback".into()));
            };
            let head = info.head;
            self.rollback_one(txn, &head, &info, rolled, depth)?;
            if head == *target {
                return Ok(());
            }
        }
    }

    fn rollback_one(
        &self,
        txn: &mut dyn WriteTransaction,
        hash: &BlockHash,
        info: &AccountInfo,
        rolled: &mut Vec<BlockHash>,
        depth: usize,
    ) -> Result<(), RollbackError> {
        let Some(stored) = self.stored_block(txn, hash)? else {
            return Err(RollbackError::BlockNotFound);
        };
        let account = stored.sideband.account;

        if stored.sideband.details.is_send {
            let destination = match &stored.block {
                Block::Send(b) => b.destination,
                block => block
                    .link_field()
                    .map(|l| l.as_account())
                    .ok_or_else(|| RollbackError::Corrupt("send without destination".into()))?,
            };
            let key = PendingKey::new(destination, *hash);
            if txn.pending_get(&key)?.is_none() {
                // Already received: the dependent receive (and everything
                // above it) must go first.
                let receive = self
                    .find_receive(txn, &destination, hash)?
                    .ok_or_else(|| RollbackError::Corrupt("receive not found for send".into()))?;
                self.rollback_inner(txn, &receive, rolled, depth + 1)?;
            }
            txn.pending_del(&key)?;
        }

        if stored.sideband.details.is_receive {
            let source = match &stored.block {
                Block::Receive(b) => b.source,
                Block::Open(b) => b.source,
                block => block
                    .link_field()
                    .map(|l| l.as_block_hash())
                    .ok_or_else(|| RollbackError::Corrupt("receive without source".into()))?,
            };
            let source_account = self
                .block_account(txn, &source)?
                .ok_or_else(|| RollbackError::Corrupt("source block missing".into()))?;
            let previous_balance = match self.stored_block(txn, &stored.block.previous())? {
                Some(previous) => previous.sideband.balance,
                None => Amount::ZERO,
            };
            let amount = stored.sideband.balance.saturating_sub(previous_balance);
            txn.pending_put(
                &PendingKey::new(account, source),
                &PendingInfo {
                    source: source_account,
                    amount,
                    epoch: stored.sideband.source_epoch,
                },
            )?;
        }

        let previous_hash = stored.block.previous();
        txn.block_del(hash)?;
        txn.frontier_del(hash)?;

        if previous_hash.is_zero() {
            // Rolling back the open block removes the account entirely.
            self.move_weight_reverse(txn, info.representative, info.balance, None)?;
            txn.account_del(&account)?;
            txn.confirmation_height_del(&account)?;
        } else {
            let previous = self
                .stored_block(txn, &previous_hash)?
                .ok_or_else(|| RollbackError::Corrupt("previous block missing".into()))?;
            let previous_rep = self
                .representative_of(txn, &previous_hash)?
                .ok_or_else(|| RollbackError::Corrupt("previous representative missing".into()))?;
            self.move_weight_reverse(
                txn,
                info.representative,
                info.balance,
                Some((previous_rep, previous.sideband.balance)),
            )?;
            self.set_successor(txn, &previous_hash, BlockHash::ZERO)?;
            if previous.block.is_legacy() {
                txn.frontier_put(&previous_hash, &account)?;
            }
            txn.account_put(
                &account,
                &AccountInfo {
                    head: previous_hash,
                    representative: previous_rep,
                    balance: previous.sideband.balance,
                    modified: Timestamp::now(),
                    block_count: info.block_count - 1,
                    epoch: previous.sideband.details.epoch,
                    ..info.clone()
                },
            )?;
        }
        rolled.push(*hash);
        tracing::debug!(%hash, %account, "block rolled back");
        Ok(())
    }

    fn move_weight_reverse(
        &self,
        txn: &mut dyn WriteTransaction,
        current_rep: Account,
        current_balance: Amount,
        restored: Option<(Account, Amount)>,
    ) -> Result<(), StoreError> {
        let weight = txn
            .rep_weight_get(&current_rep)?
            .saturating_sub(current_balance);
        txn.rep_weight_put(&current_rep, weight)?;
        if let Some((rep, balance)) = restored {
            let weight = txn.rep_weight_get(&rep)?.saturating_add(balance);
            txn.rep_weight_put(&rep, weight)?;
        }
        Ok(())
    }

    /// Find the block on `account`'s chain that received `send_hash`.
    fn find_receive(
        &self,
        txn: &dyn ReadTransaction,
        account: &Account,
        send_hash: &BlockHash,
    ) -> Result<Option<BlockHash>, RollbackError> {
        let Some(info) = txn.account_get(account)? else {
            return Ok(None);
        };
        let mut current = info.head;
        loop {
            let Some(stored) = self.stored_block(txn, &current)? else {
                return Ok(None);
            };
            if stored.sideband.details.is_receive {
                let source = match &stored.block {
                    Block::Receive(b) => Some(b.source),
                    Block::Open(b) => Some(b.source),
                    block => block.link_field().map(|l| l.as_block_hash()),
                };
                if source.as_ref() == Some(send_hash) {
                    return Ok(Some(current));
                }
            }
            let previous = stored.block.previous();
            if previous.is_zero() {
                return Ok(None);
            }
            current = previous;
        }
    }
}
