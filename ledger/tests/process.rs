//! Ledger state-transition tests on the dev network profile.

use cobalt_crypto::{generate_keypair, keypair_from_private, sign_message};
use cobalt_ledger::{
    Block, ChangeBlock, Ledger, LedgerConstants, LinkInterpretation, ProcessResult, ReceiveBlock,
    RollbackError, SendBlock, SignerKind, State2Block, StateBlock, StateFlags,
};
use cobalt_store::{MemStore, PendingKey, ReadTransaction, Store, WriteTransaction};
use cobalt_types::epoch::{EPOCH_1_LINK, EPOCH_2_LINK};
use cobalt_types::network::DEV_GENESIS_KEY;
use cobalt_types::{
    Account, Amount, BlockHash, Epoch, KeyPair, Link, NetworkProfile, PrivateKey, Signature,
};
use cobalt_work::{generate_blocking, threshold, WorkSubtype};

fn setup() -> (MemStore, Ledger) {
    let store = MemStore::new();
    let ledger = Ledger::new(LedgerConstants::for_profile(NetworkProfile::dev()));
    let mut txn = store.tx_begin_write(&[]).unwrap();
    ledger.initialize(txn.as_mut()).unwrap();
    txn.commit().unwrap();
    (store, ledger)
}

fn genesis_keys() -> KeyPair {
    keypair_from_private(PrivateKey(DEV_GENESIS_KEY))
}

fn finish(ledger: &Ledger, mut block: Block, keys: &KeyPair, epoch: Epoch, subtype: WorkSubtype) -> Block {
    block.set_signature(sign_message(block.hash().as_bytes(), &keys.private));
    let required = threshold(&ledger.constants.profile.work, epoch, subtype);
    block.set_work(generate_blocking(&block.root(), required));
    block
}

fn state_send(
    ledger: &Ledger,
    keys: &KeyPair,
    previous: BlockHash,
    representative: Account,
    new_balance: Amount,
    destination: Account,
) -> Block {
    let block = Block::State(StateBlock {
        account: Account::from(keys.public),
        previous,
        representative,
        balance: new_balance,
        link: Link::from(destination),
        signature: Signature::ZERO,
        work: 0,
    });
    finish(ledger, block, keys, Epoch::Epoch0, WorkSubtype::Send)
}

fn state_open(
    ledger: &Ledger,
    keys: &KeyPair,
    representative: Account,
    balance: Amount,
    source: BlockHash,
) -> Block {
    let block = Block::State(StateBlock {
        account: Account::from(keys.public),
        previous: BlockHash::ZERO,
        representative,
        balance,
        link: Link::from(source),
        signature: Signature::ZERO,
        work: 0,
    });
    finish(ledger, block, keys, Epoch::Epoch0, WorkSubtype::Receive)
}

fn process(store: &MemStore, ledger: &Ledger, block: &Block) -> ProcessResult {
    let mut txn = store.tx_begin_write(&[]).unwrap();
    let result = ledger.process(txn.as_mut(), block).unwrap();
    txn.commit().unwrap();
    result
}

/// With no receivable outstanding, `sum(representation)` must equal the
/// total supply — every raw is some account's balance delegated somewhere.
fn assert_weight_conservation(store: &MemStore) {
    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.pending_count().unwrap(), 0);
    let weights: u128 = read
        .rep_weights_iter()
        .unwrap()
        .iter()
        .map(|(_, w)| w.raw())
        .sum();
    assert_eq!(weights, Amount::MAX.raw());
}

#[test]
fn initialize_seeds_cemented_genesis() {
    let (store, ledger) = setup();
    let read = store.tx_begin_read().unwrap();
    let genesis = ledger.constants.genesis_account;
    let info = read.account_get(&genesis).unwrap().unwrap();
    assert_eq!(info.balance, Amount::MAX);
    assert_eq!(info.block_count, 1);
    assert_eq!(info.confirmation_height, 1);
    assert_eq!(read.block_count().unwrap(), 1);
    assert_eq!(read.rep_weight_get(&genesis).unwrap(), Amount::MAX);
    let height = read.confirmation_height_get(&genesis).unwrap().unwrap();
    assert_eq!(height.height, 1);
    assert_eq!(height.frontier, ledger.constants.genesis_block.hash());
}

#[test]
fn initialize_twice_is_a_noop() {
    let (store, ledger) = setup();
    let mut txn = store.tx_begin_write(&[]).unwrap();
    ledger.initialize(txn.as_mut()).unwrap();
    txn.commit().unwrap();
    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.block_count().unwrap(), 1);
}

#[test]
fn send_then_receive_round_trip() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;
    let receiver = generate_keypair();
    let receiver_account = Account::from(receiver.public);

    let amount = Amount::new(100);
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        genesis_account,
        Amount::MAX.saturating_sub(amount),
        receiver_account,
    );
    let open = state_open(&ledger, &receiver, receiver_account, amount, send.hash());

    // Receive arriving ahead of its send is a gap, not an error.
    assert_eq!(process(&store, &ledger, &open), ProcessResult::GapSource);

    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);
    {
        let read = store.tx_begin_read().unwrap();
        let pending = read
            .pending_get(&PendingKey::new(receiver_account, send.hash()))
            .unwrap()
            .unwrap();
        assert_eq!(pending.amount, amount);
        assert_eq!(pending.source, genesis_account);
        assert_eq!(read.pending_count().unwrap(), 1);
    }

    assert_eq!(process(&store, &ledger, &open), ProcessResult::Progress);
    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.pending_count().unwrap(), 0);
    let info = read.account_get(&receiver_account).unwrap().unwrap();
    assert_eq!(info.balance, amount);
    assert_eq!(info.block_count, 1);
    drop(read);
    assert_weight_conservation(&store);
}

#[test]
fn reprocessing_a_block_is_old() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([9u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Old);
}

#[test]
fn competing_sends_fork() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let head = ledger.constants.genesis_block.hash();
    let a = state_send(
        &ledger,
        &genesis,
        head,
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([1u8; 32]),
    );
    let b = state_send(
        &ledger,
        &genesis,
        head,
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(2)),
        Account::new([2u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &a), ProcessResult::Progress);
    assert_eq!(process(&store, &ledger, &b), ProcessResult::Fork);
}

#[test]
fn state_block_claiming_foreign_previous_is_fork() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([9u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);

    // A properly signed block whose previous points into the genesis chain
    // but whose account field claims another chain. The referenced block
    // exists, so nothing is missing: this must contest the root, not park
    // in unchecked forever.
    let forger = generate_keypair();
    let forged = finish(
        &ledger,
        Block::State(StateBlock {
            account: Account::from(forger.public),
            previous: send.hash(),
            representative: Account::from(forger.public),
            balance: Amount::new(5),
            link: Link::ZERO,
            signature: Signature::ZERO,
            work: 0,
        }),
        &forger,
        Epoch::Epoch0,
        WorkSubtype::Send,
    );
    assert_eq!(process(&store, &ledger, &forged), ProcessResult::Fork);
}

#[test]
fn bad_signature_reported_before_fork() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let head = ledger.constants.genesis_block.hash();
    let good = state_send(
        &ledger,
        &genesis,
        head,
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([1u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &good), ProcessResult::Progress);

    // A second block at the same root with a broken signature: the
    // signature verdict must win over the fork classification.
    let mut bad = state_send(
        &ledger,
        &genesis,
        head,
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(2)),
        Account::new([2u8; 32]),
    );
    bad.set_signature(Signature([0x42; 64]));
    assert_eq!(process(&store, &ledger, &bad), ProcessResult::BadSignature);
}

#[test]
fn tampered_signature_rejected() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let mut send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([9u8; 32]),
    );
    send.set_signature(Signature([0x55; 64]));
    assert_eq!(process(&store, &ledger, &send), ProcessResult::BadSignature);
}

#[test]
fn zero_work_rejected() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let mut send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([9u8; 32]),
    );
    send.set_work(0);
    assert_eq!(
        process(&store, &ledger, &send),
        ProcessResult::InsufficientWork
    );
}

#[test]
fn unknown_previous_is_gap() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let send = state_send(
        &ledger,
        &genesis,
        BlockHash::new([0xAB; 32]),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([9u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::GapPrevious);
}

#[test]
fn legacy_send_and_negative_spend() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;
    let receiver = generate_keypair();
    let receiver_account = Account::from(receiver.public);

    let amount = Amount::new(500);
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        genesis_account,
        Amount::MAX.saturating_sub(amount),
        receiver_account,
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);
    let open = state_open(&ledger, &receiver, receiver_account, amount, send.hash());
    assert_eq!(process(&store, &ledger, &open), ProcessResult::Progress);

    // Legacy send claiming more than the balance is a negative spend.
    let overdraw = finish(
        &ledger,
        Block::Send(SendBlock {
            previous: open.hash(),
            destination: genesis_account,
            balance: Amount::new(1000),
            signature: Signature::ZERO,
            work: 0,
        }),
        &receiver,
        Epoch::Epoch0,
        WorkSubtype::Send,
    );
    assert_eq!(
        process(&store, &ledger, &overdraw),
        ProcessResult::NegativeSpend
    );

    // A proper legacy send of 100 back to genesis.
    let legacy = finish(
        &ledger,
        Block::Send(SendBlock {
            previous: open.hash(),
            destination: genesis_account,
            balance: Amount::new(400),
            signature: Signature::ZERO,
            work: 0,
        }),
        &receiver,
        Epoch::Epoch0,
        WorkSubtype::Send,
    );
    assert_eq!(process(&store, &ledger, &legacy), ProcessResult::Progress);

    // And the matching legacy receive on the genesis chain.
    let receive = finish(
        &ledger,
        Block::Receive(ReceiveBlock {
            previous: send.hash(),
            source: legacy.hash(),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch0,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &receive), ProcessResult::Progress);

    let read = store.tx_begin_read().unwrap();
    let info = read.account_get(&genesis_account).unwrap().unwrap();
    assert_eq!(
        info.balance,
        Amount::MAX.saturating_sub(Amount::new(400))
    );
    drop(read);
    assert_weight_conservation(&store);
}

#[test]
fn double_receive_is_unreceivable() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let receiver = generate_keypair();
    let receiver_account = Account::from(receiver.public);
    let amount = Amount::new(10);

    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(amount),
        receiver_account,
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);
    let open = state_open(&ledger, &receiver, receiver_account, amount, send.hash());
    assert_eq!(process(&store, &ledger, &open), ProcessResult::Progress);

    // A second receive of the same send on the same chain.
    let again = finish(
        &ledger,
        Block::State(StateBlock {
            account: receiver_account,
            previous: open.hash(),
            representative: receiver_account,
            balance: amount.saturating_add(amount),
            link: Link::from(send.hash()),
            signature: Signature::ZERO,
            work: 0,
        }),
        &receiver,
        Epoch::Epoch0,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &again), ProcessResult::Unreceivable);
}

#[test]
fn receive_with_wrong_amount_is_balance_mismatch() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let receiver = generate_keypair();
    let receiver_account = Account::from(receiver.public);

    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(100)),
        receiver_account,
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);

    let open = state_open(
        &ledger,
        &receiver,
        receiver_account,
        Amount::new(150),
        send.hash(),
    );
    assert_eq!(
        process(&store, &ledger, &open),
        ProcessResult::BalanceMismatch
    );
}

#[test]
fn representative_change_moves_weight() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;
    let new_rep = Account::new([0x77; 32]);

    let change = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: ledger.constants.genesis_block.hash(),
            representative: new_rep,
            balance: Amount::MAX,
            link: Link::ZERO,
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch0,
        WorkSubtype::Send,
    );
    assert_eq!(process(&store, &ledger, &change), ProcessResult::Progress);

    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.rep_weight_get(&new_rep).unwrap(), Amount::MAX);
    assert_eq!(
        read.rep_weight_get(&genesis_account).unwrap(),
        Amount::ZERO
    );
    drop(read);
    assert_weight_conservation(&store);
}

#[test]
fn legacy_change_moves_weight() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let new_rep = Account::new([0x66; 32]);
    let change = finish(
        &ledger,
        Block::Change(ChangeBlock {
            previous: ledger.constants.genesis_block.hash(),
            representative: new_rep,
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch0,
        WorkSubtype::Send,
    );
    assert_eq!(process(&store, &ledger, &change), ProcessResult::Progress);
    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.rep_weight_get(&new_rep).unwrap(), Amount::MAX);
}

#[test]
fn epoch_upgrade_chain() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;

    let epoch1 = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: ledger.constants.genesis_block.hash(),
            representative: genesis_account,
            balance: Amount::MAX,
            link: Link::new(EPOCH_1_LINK),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch1,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &epoch1), ProcessResult::Progress);
    {
        let read = store.tx_begin_read().unwrap();
        let info = read.account_get(&genesis_account).unwrap().unwrap();
        assert_eq!(info.epoch, Epoch::Epoch1);
        assert_eq!(info.balance, Amount::MAX);
    }

    // Skipping straight to epoch 2 from epoch 0 is impossible, and
    // re-upgrading to epoch 1 is a position error.
    let epoch1_again = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: epoch1.hash(),
            representative: genesis_account,
            balance: Amount::MAX,
            link: Link::new(EPOCH_1_LINK),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch1,
        WorkSubtype::Receive,
    );
    assert_eq!(
        process(&store, &ledger, &epoch1_again),
        ProcessResult::BlockPosition
    );

    let epoch2 = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: epoch1.hash(),
            representative: genesis_account,
            balance: Amount::MAX,
            link: Link::new(EPOCH_2_LINK),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch2,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &epoch2), ProcessResult::Progress);
    let read = store.tx_begin_read().unwrap();
    assert_eq!(
        read.account_get(&genesis_account).unwrap().unwrap().epoch,
        Epoch::Epoch2
    );
}

#[test]
fn epoch_block_needs_authorized_signer() {
    let (store, ledger) = setup();
    let genesis_account = ledger.constants.genesis_account;
    let intruder = generate_keypair();

    let epoch = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: ledger.constants.genesis_block.hash(),
            representative: genesis_account,
            balance: Amount::MAX,
            link: Link::new(EPOCH_1_LINK),
            signature: Signature::ZERO,
            work: 0,
        }),
        &intruder,
        Epoch::Epoch1,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &epoch), ProcessResult::BadSignature);
}

#[test]
fn legacy_block_after_upgrade_is_position_error() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;

    let epoch1 = finish(
        &ledger,
        Block::State(StateBlock {
            account: genesis_account,
            previous: ledger.constants.genesis_block.hash(),
            representative: genesis_account,
            balance: Amount::MAX,
            link: Link::new(EPOCH_1_LINK),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch1,
        WorkSubtype::Receive,
    );
    assert_eq!(process(&store, &ledger, &epoch1), ProcessResult::Progress);

    let legacy = finish(
        &ledger,
        Block::Send(SendBlock {
            previous: epoch1.hash(),
            destination: Account::new([5u8; 32]),
            balance: Amount::new(0),
            signature: Signature::ZERO,
            work: 0,
        }),
        &genesis,
        Epoch::Epoch1,
        WorkSubtype::Send,
    );
    assert_eq!(
        process(&store, &ledger, &legacy),
        ProcessResult::BlockPosition
    );
}

#[test]
fn state2_requires_consistent_declared_fields() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;
    let destination = Account::new([3u8; 32]);
    let balance = Amount::MAX.saturating_sub(Amount::new(7));

    let make = |height: u64, interpretation: LinkInterpretation| {
        finish(
            &ledger,
            Block::State2(State2Block {
                account: genesis_account,
                previous: ledger.constants.genesis_block.hash(),
                representative: genesis_account,
                balance,
                link: Link::from(destination),
                height,
                flags: StateFlags {
                    signer: SignerKind::SelfSigned,
                    link_interpretation: interpretation,
                    is_upgrade: false,
                    version: Epoch::Epoch0,
                },
                signature: Signature::ZERO,
                work: 0,
            }),
            &genesis,
            Epoch::Epoch0,
            WorkSubtype::Send,
        )
    };

    assert_eq!(
        process(&store, &ledger, &make(3, LinkInterpretation::Send)),
        ProcessResult::BlockPosition
    );
    assert_eq!(
        process(&store, &ledger, &make(2, LinkInterpretation::Receive)),
        ProcessResult::BalanceMismatch
    );
    assert_eq!(
        process(&store, &ledger, &make(2, LinkInterpretation::Send)),
        ProcessResult::Progress
    );
}

#[test]
fn rollback_restores_prior_state() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;

    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        genesis_account,
        Amount::MAX.saturating_sub(Amount::new(42)),
        Account::new([8u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);

    let mut txn = store.tx_begin_write(&[]).unwrap();
    let rolled = ledger.rollback(txn.as_mut(), &send.hash()).unwrap();
    txn.commit().unwrap();
    assert_eq!(rolled, vec![send.hash()]);

    let read = store.tx_begin_read().unwrap();
    assert_eq!(read.block_count().unwrap(), 1);
    assert_eq!(read.pending_count().unwrap(), 0);
    let info = read.account_get(&genesis_account).unwrap().unwrap();
    assert_eq!(info.head, ledger.constants.genesis_block.hash());
    assert_eq!(info.balance, Amount::MAX);
    assert_eq!(info.block_count, 1);
    assert_eq!(read.rep_weight_get(&genesis_account).unwrap(), Amount::MAX);
    drop(read);
    assert_weight_conservation(&store);
}

#[test]
fn rollback_refuses_cemented_blocks() {
    let (store, ledger) = setup();
    let mut txn = store.tx_begin_write(&[]).unwrap();
    let result = ledger.rollback(txn.as_mut(), &ledger.constants.genesis_block.hash());
    assert!(matches!(result, Err(RollbackError::Cemented)));
}

#[test]
fn rollback_of_received_send_cascades() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let genesis_account = ledger.constants.genesis_account;
    let receiver = generate_keypair();
    let receiver_account = Account::from(receiver.public);
    let amount = Amount::new(9);

    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        genesis_account,
        Amount::MAX.saturating_sub(amount),
        receiver_account,
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);
    let open = state_open(&ledger, &receiver, receiver_account, amount, send.hash());
    assert_eq!(process(&store, &ledger, &open), ProcessResult::Progress);

    let mut txn = store.tx_begin_write(&[]).unwrap();
    let rolled = ledger.rollback(txn.as_mut(), &send.hash()).unwrap();
    txn.commit().unwrap();
    assert_eq!(rolled, vec![open.hash(), send.hash()]);

    let read = store.tx_begin_read().unwrap();
    assert!(read.account_get(&receiver_account).unwrap().is_none());
    assert_eq!(read.block_count().unwrap(), 1);
    assert_eq!(read.pending_count().unwrap(), 0);
    assert_eq!(read.rep_weight_get(&genesis_account).unwrap(), Amount::MAX);
    drop(read);
    assert_weight_conservation(&store);
}

#[test]
fn block_confirmed_tracks_cemented_height() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([4u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);

    let read = store.tx_begin_read().unwrap();
    assert!(ledger
        .block_confirmed(read.as_ref(), &ledger.constants.genesis_block.hash())
        .unwrap());
    assert!(!ledger.block_confirmed(read.as_ref(), &send.hash()).unwrap());
}

#[test]
fn successor_links_maintained() {
    let (store, ledger) = setup();
    let genesis = genesis_keys();
    let send = state_send(
        &ledger,
        &genesis,
        ledger.constants.genesis_block.hash(),
        ledger.constants.genesis_account,
        Amount::MAX.saturating_sub(Amount::new(1)),
        Account::new([4u8; 32]),
    );
    assert_eq!(process(&store, &ledger, &send), ProcessResult::Progress);

    let read = store.tx_begin_read().unwrap();
    assert_eq!(
        ledger
            .block_successor(read.as_ref(), &ledger.constants.genesis_block.hash())
            .unwrap(),
        Some(send.hash())
    );
    assert_eq!(
        ledger.block_successor(read.as_ref(), &send.hash()).unwrap(),
        None
    );
}
