//! Subsystem ownership and lifecycle.
//!
//! The node owns the election engine and wires the control flow end to end:
//! inbound frames route through the message handler, publishes drain into
//! the block processor, and each committed batch activates elections for
//! the freshly applied blocks and observed forks. Votes tally into the
//! owned `ActiveElections` (early votes park in the vote cache and replay
//! when their election starts); quorum winners are forced over losing
//! chains where needed and handed to the cementing thread.
//!
//! Two cooperative owner threads: one drains the block processor (the only
//! writer of ledger tables), one drains the confirming set into the
//! cementing walker. Both park on a condvar and wake on enqueue or stop.
//! `stop` is idempotent and ordered: ingress first, then cementing, so no
//! producer outlives its consumer.

use crate::block_processor::{BlockProcessor, BlockSource, ProcessedEvent};
use crate::confirmation_height::{CementEvent, CementMode, ConfirmationHeightProcessor};
use crate::confirming_set::ConfirmingSet;
use crate::message_handler::{MessageHandler, Routed};
use cobalt_consensus::rep_crawler::Representative;
use cobalt_consensus::{
    ActiveElections, AggregatorReply, ConfirmReqSolicitor, ElectionStatus, OnlineReps,
    OnlineWeightSampler, RequestAggregator, Solicitation, VoteCache,
};
use cobalt_ledger::{Block, Ledger, ProcessResult, Vote};
use cobalt_network::PeerContainer;
use cobalt_protocol::ProtocolError;
use cobalt_store::{ReadTransaction, Store, StoreError, Table, WriteTransaction};
use cobalt_types::{Amount, BlockHash, Root, Timestamp};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

const MAX_ACTIVE_ELECTIONS: usize = 8192;

/// The election engine and its satellites, guarded as one unit so vote
/// routing, cache replay and aggregation see a consistent picture.
struct ConsensusState {
    elections: ActiveElections,
    vote_cache: VoteCache,
    aggregator: RequestAggregator,
    online: OnlineReps,
    sampler: OnlineWeightSampler,
}

struct Shared {
    store: Arc<dyn Store>,
    ledger: Arc<Ledger>,
    processor: Mutex<BlockProcessor>,
    processor_signal: Condvar,
    confirming: Mutex<ConfirmingSet>,
    confirming_signal: Condvar,
    cementer: ConfirmationHeightProcessor,
    consensus: Mutex<ConsensusState>,
    handler: Mutex<MessageHandler>,
    processed: Mutex<VecDeque<ProcessedEvent>>,
    cemented: Mutex<VecDeque<CementEvent>>,
    stopped: AtomicBool,
}

/// The running core. Network callers feed it through `handle_message`;
/// local (wallet) blocks come in through `add_block`.
pub struct Node {
    shared: Arc<Shared>,
    processing_thread: Option<JoinHandle<()>>,
    cementing_thread: Option<JoinHandle<()>>,
}

impl Node {
    pub fn start(
        store: Arc<dyn Store>,
        ledger: Arc<Ledger>,
        processor: BlockProcessor,
        cementer: ConfirmationHeightProcessor,
    ) -> Self {
        let profile = ledger.constants.profile.clone();
        let shared = Arc::new(Shared {
            store,
            ledger,
            processor: Mutex::new(processor),
            processor_signal: Condvar::new(),
            confirming: Mutex::new(ConfirmingSet::new()),
            confirming_signal: Condvar::new(),
            cementer,
            consensus: Mutex::new(ConsensusState {
                elections: ActiveElections::new(MAX_ACTIVE_ELECTIONS),
                vote_cache: VoteCache::new(),
                aggregator: RequestAggregator::new(),
                online: OnlineReps::new(),
                sampler: OnlineWeightSampler::new(
                    profile.online_weight_minimum,
                    profile.online_weight_quorum,
                ),
            }),
            handler: Mutex::new(MessageHandler::new(profile)),
            processed: Mutex::new(VecDeque::new()),
            cemented: Mutex::new(VecDeque::new()),
            stopped: AtomicBool::new(false),
        });

        let processing = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("block processing".into())
                .spawn(move || processing_loop(&shared))
                .expect("spawn block processing thread")
        };
        let cementing = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("confirmation height".into())
                .spawn(move || cementing_loop(&shared))
                .expect("spawn confirmation height thread")
        };

        Self {
            shared,
            processing_thread: Some(processing),
            cementing_thread: Some(cementing),
        }
    }

    /// Enqueue an ingress block. False means back-pressure dropped it.
    pub fn add_block(&self, block: Block, source: BlockSource) -> bool {
        let accepted = self
            .shared
            .processor
            .lock()
            .unwrap()
            .add(block, source);
        if accepted {
            self.shared.processor_signal.notify_one();
        }
        accepted
    }

    /// Queue a replacement block decided by fork resolution.
    pub fn force_block(&self, block: Block) {
        self.shared.processor.lock().unwrap().force(block);
        self.shared.processor_signal.notify_one();
    }

    /// Hand a quorum winner to the cementing thread.
    pub fn confirm(&self, hash: BlockHash) -> bool {
        confirm_hash(&self.shared, hash)
    }

    /// Route one inbound frame. Publishes, votes and confirm_reqs are
    /// consumed here; handshake, telemetry and bootstrap traffic is handed
    /// back for the connection layer.
    pub fn handle_message(
        &self,
        from: SocketAddr,
        bytes: &[u8],
        peers: &mut PeerContainer,
        now: Timestamp,
    ) -> Result<Option<Routed>, ProtocolError> {
        let routed = self
            .shared
            .handler
            .lock()
            .unwrap()
            .handle(from, bytes, peers, now)?;
        match routed {
            Some(Routed::Block(block)) => {
                self.add_block(block, BlockSource::Network);
                Ok(None)
            }
            Some(Routed::Vote(vote)) => {
                // Bad vote signatures are dropped silently.
                if vote.validate() {
                    if let Err(err) = self.process_vote(&vote, now) {
                        tracing::error!(%err, "vote processing failed");
                    }
                }
                Ok(None)
            }
            Some(Routed::ConfirmReq(pairs)) => {
                self.add_confirm_req(&from.to_string(), pairs);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Tally a vote across the elections covering its hashes. Legs with no
    /// election yet park in the vote cache. Returns true when the whole
    /// vote was a replay.
    pub fn process_vote(&self, vote: &Vote, now: Timestamp) -> Result<bool, StoreError> {
        let txn = self.shared.store.tx_begin_read()?;
        let weight = self.shared.ledger.weight(txn.as_ref(), &vote.account)?;

        let mut consensus = self.shared.consensus.lock().unwrap();
        let state = &mut *consensus;
        state.online.observe(vote.account, now);
        let delta = quorum_delta(state, &self.shared.ledger, txn.as_ref());
        let (outcome, confirmed) = state.elections.vote(vote, weight, delta, now);
        for hash in &outcome.indeterminate {
            state.vote_cache.insert(*hash, vote, weight, now);
        }
        drop(consensus);
        drop(txn);

        for status in &confirmed {
            self.settle_confirmed(status)?;
        }
        Ok(outcome.replay)
    }

    /// A quorum winner: cement it if it is the stored chain, otherwise
    /// force it over the loser (the forced apply confirms it afterwards).
    fn settle_confirmed(&self, status: &ElectionStatus) -> Result<(), StoreError> {
        let winner_hash = status.winner.hash();
        let occupant = {
            let txn = self.shared.store.tx_begin_read()?;
            stored_occupant(&self.shared.ledger, txn.as_ref(), &status.winner)?
        };
        if occupant == Some(winner_hash) {
            confirm_hash(&self.shared, winner_hash);
        } else {
            tracing::debug!(winner = %winner_hash, "quorum winner replaces stored chain");
            self.force_block(status.winner.clone());
        }
        Ok(())
    }

    /// Queue a peer's confirm_req pairs for the next aggregator flush.
    pub fn add_confirm_req(&self, channel: &str, pairs: Vec<(BlockHash, Root)>) -> bool {
        self.shared
            .consensus
            .lock()
            .unwrap()
            .aggregator
            .add_request(channel, pairs)
    }

    /// Drain the aggregator buckets, answering from the vote cache. Hashes
    /// with no cached vote come back in the reply's `unknown` list.
    pub fn flush_confirm_reqs(&self, now: Timestamp) -> Vec<AggregatorReply> {
        let mut consensus = self.shared.consensus.lock().unwrap();
        let state = &mut *consensus;
        let vote_cache = &state.vote_cache;
        state
            .aggregator
            .flush(now, |hash, _| vote_cache.find(hash).into_iter().next())
    }

    /// One confirm_req escalation pass over the active elections, in
    /// descending adjusted-difficulty order.
    pub fn confirm_req_pass(
        &self,
        reps: &[Representative],
        min_rep_weight: Amount,
        fallback_peers: &[String],
    ) -> Vec<Solicitation> {
        let consensus = self.shared.consensus.lock().unwrap();
        ConfirmReqSolicitor::prepare(
            &consensus.elections.solicitation_order(),
            reps,
            min_rep_weight,
            fallback_peers,
        )
    }

    /// Periodic maintenance: election timers, online-rep aging, vote-cache
    /// TTL. Returns the roots of elections that expired unconfirmed.
    pub fn tick(&self, now: Timestamp) -> Vec<Root> {
        let mut consensus = self.shared.consensus.lock().unwrap();
        consensus.online.purge(now);
        consensus.vote_cache.cleanup(now);
        consensus.elections.tick(now)
    }

    pub fn election_active(&self, root: &Root) -> bool {
        self.shared.consensus.lock().unwrap().elections.active(root)
    }

    pub fn election_count(&self) -> usize {
        self.shared.consensus.lock().unwrap().elections.len()
    }

    /// Drain block-processing results observed since the last call.
    pub fn take_processed(&self) -> Vec<ProcessedEvent> {
        self.shared.processed.lock().unwrap().drain(..).collect()
    }

    /// Drain cementing events observed since the last call.
    pub fn take_cemented(&self) -> Vec<CementEvent> {
        self.shared.cemented.lock().unwrap().drain(..).collect()
    }

    /// Pin this node's final vote for a root. The first pin wins: a later
    /// pin for a different hash on the same root is refused until the root
    /// is cleared, which keeps the final-vote guarantee across restarts.
    pub fn record_final_vote(&self, root: Root, hash: BlockHash) -> Result<bool, StoreError> {
        let mut txn = self.shared.store.tx_begin_write(&[Table::FinalVotes])?;
        match txn.final_vote_get(&root)? {
            Some(existing) => Ok(existing == hash),
            None => {
                txn.final_vote_put(&root, &hash)?;
                txn.commit()?;
                Ok(true)
            }
        }
    }

    /// Forget the pinned final vote for a cleared election.
    pub fn clear_final_vote(&self, root: Root) -> Result<(), StoreError> {
        let mut txn = self.shared.store.tx_begin_write(&[Table::FinalVotes])?;
        txn.final_vote_del(&root)?;
        txn.commit()
    }

    /// Ordered, idempotent shutdown: ingress stops before cementing.
    pub fn stop(&mut self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.processor_signal.notify_all();
        self.shared.confirming_signal.notify_all();
        if let Some(handle) = self.processing_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.cementing_thread.take() {
            let _ = handle.join();
        }
        tracing::info!("node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}

fn confirm_hash(shared: &Shared, hash: BlockHash) -> bool {
    let accepted = shared.confirming.lock().unwrap().add(hash);
    if accepted {
        shared.confirming_signal.notify_one();
    }
    accepted
}

/// The block currently occupying this block's root, if any.
fn stored_occupant(
    ledger: &Ledger,
    txn: &dyn ReadTransaction,
    block: &Block,
) -> Result<Option<BlockHash>, StoreError> {
    let previous = block.previous();
    if !previous.is_zero() {
        return ledger.block_successor(txn, &previous);
    }
    let Some(account) = block.account_field() else {
        return Ok(None);
    };
    Ok(txn.account_get(&account)?.map(|info| info.open_block))
}

fn quorum_delta(state: &ConsensusState, ledger: &Ledger, txn: &dyn ReadTransaction) -> Amount {
    let online = state
        .online
        .online_weight(|rep| ledger.weight(txn, rep).unwrap_or(Amount::ZERO));
    state.sampler.delta(online)
}

fn processing_loop(shared: &Shared) {
    let mut processor = shared.processor.lock().unwrap();
    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        if processor.backlog() == 0 {
            processor = shared.processor_signal.wait(processor).unwrap();
            continue;
        }
        match processor.process_batch() {
            Ok(events) => {
                if !events.is_empty() {
                    // Post-commit: the transaction is durable, so observers
                    // and election creation see committed state.
                    activate_elections(shared, &mut processor, &events);
                    shared.processed.lock().unwrap().extend(events);
                }
            }
            Err(err) => {
                // A failing transaction aborts; repeating failures mean the
                // store is unusable and the loop stops to preserve on-disk
                // consistency.
                tracing::error!(%err, "block processing batch failed");
                shared.stopped.store(true, Ordering::SeqCst);
                shared.confirming_signal.notify_all();
                return;
            }
        }
    }
}

/// Deferred post-commit work for one batch: start elections for applied
/// blocks, extend the contested election on forks, replay cached votes,
/// and queue forced winners for cementing.
fn activate_elections(shared: &Shared, processor: &mut BlockProcessor, events: &[ProcessedEvent]) {
    let now = Timestamp::now();
    let txn = match shared.store.tx_begin_read() {
        Ok(txn) => txn,
        Err(err) => {
            tracing::error!(%err, "election activation skipped");
            return;
        }
    };
    let mut consensus = shared.consensus.lock().unwrap();
    let state = &mut *consensus;

    for event in events {
        match (event.result, event.source) {
            // A forced block only arrives from a decided election: cement
            // it as soon as it lands.
            (ProcessResult::Progress, BlockSource::Forced) => {
                confirm_hash(shared, event.block.hash());
            }
            (ProcessResult::Progress, _) => {
                let hash = event.block.hash();
                if state.elections.insert(event.block.clone(), now) {
                    replay_cached_votes(shared, processor, state, txn.as_ref(), &hash, now);
                }
            }
            (ProcessResult::Fork, source) if source != BlockSource::Forced => {
                // Seed the election with the stored occupant of the root,
                // then add the challenger as a candidate.
                if let Ok(Some(occupant)) =
                    stored_occupant(&shared.ledger, txn.as_ref(), &event.block)
                {
                    if let Ok(Some(stored)) = shared.ledger.stored_block(txn.as_ref(), &occupant)
                    {
                        if state.elections.insert(stored.block, now) {
                            replay_cached_votes(
                                shared,
                                processor,
                                state,
                                txn.as_ref(),
                                &occupant,
                                now,
                            );
                        }
                    }
                }
                let challenger = event.block.hash();
                state.elections.publish(event.block.clone(), now);
                replay_cached_votes(shared, processor, state, txn.as_ref(), &challenger, now);
            }
            _ => {}
        }
    }
}

/// Drain the vote cache for a hash that just became electable and tally
/// the parked votes. Winners confirmed by the replay settle immediately:
/// the already-stored winner goes straight to cementing, a fork winner is
/// forced through the processor we already hold.
fn replay_cached_votes(
    shared: &Shared,
    processor: &mut BlockProcessor,
    state: &mut ConsensusState,
    txn: &dyn ReadTransaction,
    hash: &BlockHash,
    now: Timestamp,
) {
    for vote in state.vote_cache.drain(hash) {
        let weight = shared
            .ledger
            .weight(txn, &vote.account)
            .unwrap_or(Amount::ZERO);
        state.online.observe(vote.account, now);
        let delta = quorum_delta(state, &shared.ledger, txn);
        let (_, confirmed) = state.elections.vote(&vote, weight, delta, now);
        for status in confirmed {
            let winner_hash = status.winner.hash();
            match stored_occupant(&shared.ledger, txn, &status.winner) {
                Ok(Some(occupant)) if occupant == winner_hash => {
                    confirm_hash(shared, winner_hash);
                }
                Ok(_) => processor.force(status.winner.clone()),
                Err(err) => tracing::error!(%err, "occupant lookup failed"),
            }
        }
    }
}

fn cementing_loop(shared: &Shared) {
    let mut confirming = shared.confirming.lock().unwrap();
    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        if confirming.is_empty() {
            confirming = shared.confirming_signal.wait(confirming).unwrap();
            continue;
        }
        let batch = confirming.next_batch();
        drop(confirming);
        for hash in batch {
            match shared.cementer.cement(&hash, CementMode::Bounded) {
                Ok(events) => {
                    let cemented: u64 = events
                        .iter()
                        .filter(|e| matches!(e, CementEvent::Cemented { .. }))
                        .count() as u64;
                    let mut out = shared.cemented.lock().unwrap();
                    out.extend(events.iter().cloned());
                    drop(out);
                    // The cemented roots are decided: elections covering
                    // them terminate as externally confirmed.
                    let mut consensus = shared.consensus.lock().unwrap();
                    let now = Timestamp::now();
                    for event in &events {
                        if let CementEvent::Cemented { frontier, .. } = event {
                            if let Ok(Some(stored)) = shared
                                .store
                                .tx_begin_read()
                                .and_then(|txn| shared.ledger.stored_block(txn.as_ref(), frontier))
                            {
                                consensus
                                    .elections
                                    .confirm_external(&stored.block.root(), now);
                            }
                        }
                    }
                    drop(consensus);
                    shared
                        .confirming
                        .lock()
                        .unwrap()
                        .record_cemented(cemented);
                }
                Err(err) => {
                    tracing::error!(%hash, %err, "cementing failed");
                }
            }
        }
        confirming = shared.confirming.lock().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_crypto::{keypair_from_private, sign_message};
    use cobalt_ledger::{LedgerConstants, StateBlock};
    use cobalt_messages::Message;
    use cobalt_protocol::serialize_message;
    use cobalt_store::MemStore;
    use cobalt_types::network::DEV_GENESIS_KEY;
    use cobalt_types::{
        Account, Epoch, KeyPair, Link, NetworkProfile, PrivateKey, Signature,
    };
    use cobalt_work::{generate_blocking, threshold, WorkSubtype};
    use std::time::{Duration, Instant};

    fn build_node() -> (Node, Arc<MemStore>, Arc<Ledger>) {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(Ledger::new(LedgerConstants::for_profile(
            NetworkProfile::dev(),
        )));
        let mut txn = store.tx_begin_write(&[]).unwrap();
        ledger.initialize(txn.as_mut()).unwrap();
        txn.commit().unwrap();

        let processor = BlockProcessor::new(
            Arc::clone(&ledger),
            Arc::<MemStore>::clone(&store) as Arc<dyn Store>,
            256,
            1024,
            Duration::from_millis(500),
            65_536,
        );
        let cementer = ConfirmationHeightProcessor::new(
            Arc::clone(&ledger),
            Arc::<MemStore>::clone(&store) as Arc<dyn Store>,
            16_384,
            4096,
        );
        let node = Node::start(
            Arc::<MemStore>::clone(&store) as Arc<dyn Store>,
            Arc::clone(&ledger),
            processor,
            cementer,
        );
        (node, store, ledger)
    }

    fn genesis_keys() -> KeyPair {
        keypair_from_private(PrivateKey(DEV_GENESIS_KEY))
    }

    fn state_send(
        ledger: &Ledger,
        keys: &KeyPair,
        previous: BlockHash,
        new_balance: Amount,
        destination: Account,
    ) -> Block {
        let account = Account::from(keys.public);
        let mut block = Block::State(StateBlock {
            account,
            previous,
            representative: account,
            balance: new_balance,
            link: Link::from(destination),
            signature: Signature::ZERO,
            work: 0,
        });
        block.set_signature(sign_message(block.hash().as_bytes(), &keys.private));
        block.set_work(generate_blocking(
            &block.root(),
            threshold(
                &ledger.constants.profile.work,
                Epoch::Epoch0,
                WorkSubtype::Send,
            ),
        ));
        block
    }

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = poll() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out waiting for the node");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn processes_and_cements_through_the_threads() {
        let (mut node, store, ledger) = build_node();
        let genesis = genesis_keys();
        let genesis_account = ledger.constants.genesis_account;

        let send = state_send(
            &ledger,
            &genesis,
            ledger.constants.genesis_block.hash(),
            Amount::MAX.saturating_sub(Amount::new(3)),
            Account::new([6u8; 32]),
        );

        assert!(node.add_block(send.clone(), BlockSource::Local));
        let events = wait_for(|| {
            let events = node.take_processed();
            (!events.is_empty()).then_some(events)
        });
        assert_eq!(events[0].result, ProcessResult::Progress);
        // The committed block opened an election.
        assert!(node.election_active(&send.root()));

        assert!(node.confirm(send.hash()));
        wait_for(|| {
            let events = node.take_cemented();
            events
                .iter()
                .any(|e| matches!(e, CementEvent::Cemented { height: 2, .. }))
                .then_some(())
        });

        let read = store.tx_begin_read().unwrap();
        assert_eq!(
            read.confirmation_height_get(&genesis_account)
                .unwrap()
                .unwrap()
                .height,
            2
        );
        drop(read);
        node.stop();
    }

    #[test]
    fn quorum_votes_resolve_a_fork_end_to_end() {
        let (mut node, store, ledger) = build_node();
        let genesis = genesis_keys();
        let head = ledger.constants.genesis_block.hash();

        let s1 = state_send(
            &ledger,
            &genesis,
            head,
            Amount::MAX.saturating_sub(Amount::new(1)),
            Account::new([1u8; 32]),
        );
        let s2 = state_send(
            &ledger,
            &genesis,
            head,
            Amount::MAX.saturating_sub(Amount::new(2)),
            Account::new([2u8; 32]),
        );

        node.add_block(s1.clone(), BlockSource::Network);
        node.add_block(s2.clone(), BlockSource::Network);
        wait_for(|| {
            let events = node.take_processed();
            events
                .iter()
                .any(|e| e.result == ProcessResult::Fork)
                .then_some(())
        });
        // Both forks now contest one election under the shared root.
        assert!(node.election_active(&s1.root()));

        // Quorum lands on the fork that lost the ledger race: the node must
        // roll the stored chain back, force the winner and cement it.
        let vote = Vote::new(&genesis, 1, vec![s2.hash()]);
        let replay = node.process_vote(&vote, Timestamp::now()).unwrap();
        assert!(!replay);

        wait_for(|| {
            let read = store.tx_begin_read().unwrap();
            (read.block_exists(&s2.hash()).unwrap() && !read.block_exists(&s1.hash()).unwrap())
                .then_some(())
        });
        wait_for(|| {
            let read = store.tx_begin_read().unwrap();
            read.confirmation_height_get(&ledger.constants.genesis_account)
                .unwrap()
                .filter(|info| info.height == 2 && info.frontier == s2.hash())
                .map(|_| ())
        });
        node.stop();
    }

    #[test]
    fn early_vote_is_cached_and_replayed_when_the_block_arrives() {
        let (mut node, store, ledger) = build_node();
        let genesis = genesis_keys();
        let send = state_send(
            &ledger,
            &genesis,
            ledger.constants.genesis_block.hash(),
            Amount::MAX.saturating_sub(Amount::new(7)),
            Account::new([3u8; 32]),
        );

        // The vote beats its block: no election yet, so it parks.
        let vote = Vote::new(&genesis, 1, vec![send.hash()]);
        let replay = node.process_vote(&vote, Timestamp::now()).unwrap();
        assert!(replay);
        assert_eq!(node.election_count(), 0);

        // The block lands; the cached vote replays and confirms at once.
        node.add_block(send.clone(), BlockSource::Network);
        wait_for(|| {
            let read = store.tx_begin_read().unwrap();
            read.confirmation_height_get(&ledger.constants.genesis_account)
                .unwrap()
                .filter(|info| info.frontier == send.hash())
                .map(|_| ())
        });
        node.stop();
    }

    #[test]
    fn confirm_reqs_aggregate_and_answer_from_the_vote_cache() {
        let (mut node, _store, _ledger) = build_node();
        let genesis = genesis_keys();
        let known = BlockHash::new([0xAA; 32]);
        let unknown = BlockHash::new([0xBB; 32]);

        // Park a vote for `known` in the cache via the indeterminate path.
        let vote = Vote::new(&genesis, 1, vec![known]);
        node.process_vote(&vote, Timestamp::new(100)).unwrap();

        assert!(node.add_confirm_req(
            "peer1",
            vec![
                (known, Root::new([0xAA; 32])),
                (unknown, Root::new([0xBB; 32])),
            ],
        ));
        let replies = node.flush_confirm_reqs(Timestamp::new(101));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].channel, "peer1");
        assert_eq!(replies[0].votes.len(), 1);
        assert_eq!(replies[0].votes[0].hashes, vec![known]);
        assert_eq!(replies[0].unknown, vec![unknown]);
        node.stop();
    }

    #[test]
    fn handle_message_routes_publishes_and_returns_handshakes() {
        let (mut node, _store, ledger) = build_node();
        let genesis = genesis_keys();
        let profile = ledger.constants.profile.clone();
        let mut peers = PeerContainer::new("8.8.8.8:7075".parse().unwrap(), 17);
        let from: SocketAddr = "94.4.4.4:7075".parse().unwrap();

        let send = state_send(
            &ledger,
            &genesis,
            ledger.constants.genesis_block.hash(),
            Amount::MAX.saturating_sub(Amount::new(5)),
            Account::new([4u8; 32]),
        );
        let bytes = serialize_message(&profile, &Message::Publish(send.clone()));
        let routed = node
            .handle_message(from, &bytes, &mut peers, Timestamp::now())
            .unwrap();
        assert!(routed.is_none());
        let events = wait_for(|| {
            let events = node.take_processed();
            (!events.is_empty()).then_some(events)
        });
        assert_eq!(events[0].result, ProcessResult::Progress);
        assert_eq!(events[0].block.hash(), send.hash());

        // Handshakes are not consumed here; the connection layer owns them.
        let handshake = Message::NodeIdHandshake(cobalt_messages::NodeIdHandshake {
            query: Some([0x11; 32]),
            response: None,
        });
        let bytes = serialize_message(&profile, &handshake);
        let routed = node
            .handle_message(from, &bytes, &mut peers, Timestamp::now())
            .unwrap();
        assert!(matches!(routed, Some(Routed::Handshake(_))));
        node.stop();
    }

    #[test]
    fn final_votes_pin_per_root() {
        let (mut node, _store, _ledger) = build_node();
        let root = Root::new([1u8; 32]);
        let a = BlockHash::new([0xAA; 32]);
        let b = BlockHash::new([0xBB; 32]);

        assert!(node.record_final_vote(root, a).unwrap());
        // Re-pinning the same target is fine; a different target is not.
        assert!(node.record_final_vote(root, a).unwrap());
        assert!(!node.record_final_vote(root, b).unwrap());

        node.clear_final_vote(root).unwrap();
        assert!(node.record_final_vote(root, b).unwrap());
        node.stop();
    }

    #[test]
    fn stop_is_idempotent_and_drops_clean() {
        let (mut node, _store, _ledger) = build_node();
        node.stop();
        node.stop();
        // Drop runs stop() again.
    }

    #[test]
    fn stopped_node_stops_threads_even_with_queued_work() {
        let (mut node, _store, ledger) = build_node();
        let genesis = genesis_keys();
        let block = state_send(
            &ledger,
            &genesis,
            ledger.constants.genesis_block.hash(),
            Amount::MAX,
            Account::ZERO,
        );
        node.add_block(block, BlockSource::Network);
        node.stop();
    }
}
