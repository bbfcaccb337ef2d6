//! Active elections container — routes blocks and votes to per-root
//! elections and harvests confirmations for cementing.

use crate::election::{Election, ElectionState, VoteCode};
use cobalt_ledger::{Block, Vote};
use cobalt_types::{Amount, BlockHash, Root, Timestamp};
use std::collections::{HashMap, HashSet, VecDeque};

/// Bounded double-keyed ring of recently decided roots, consulted to
/// short-circuit restarts and answer late confirm_reqs.
const RECENTLY_CONFIRMED_CAPACITY: usize = 8192;

/// A confirmed election ready for cementing.
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub root: Root,
    pub winner: Block,
    pub tally: Amount,
    pub duration_secs: u64,
}

/// Result of routing one vote through the container.
#[derive(Clone, Debug, Default)]
pub struct VoteOutcome {
    /// True when no leg of the vote advanced any election.
    pub replay: bool,
    /// Legs that were counted.
    pub processed: usize,
    /// Legs that matched no active election (vote-cache candidates).
    pub indeterminate: Vec<BlockHash>,
}

/// Container for all ongoing elections, keyed by root, with a hash→root
/// index so votes (which carry hashes) route without a ledger lookup.
pub struct ActiveElections {
    roots: HashMap<Root, Election>,
    blocks: HashMap<BlockHash, Root>,
    recently_confirmed: VecDeque<(Root, BlockHash)>,
    recently_confirmed_index: HashSet<Root>,
    max_elections: usize,
}

impl ActiveElections {
    pub fn new(max_elections: usize) -> Self {
        Self {
            roots: HashMap::new(),
            blocks: HashMap::new(),
            recently_confirmed: VecDeque::with_capacity(RECENTLY_CONFIRMED_CAPACITY),
            recently_confirmed_index: HashSet::new(),
            max_elections,
        }
    }

    /// Start an election for the block's root, or add the block as a fork
    /// candidate to the existing one. Returns true when a new election was
    /// created.
    pub fn insert(&mut self, block: Block, now: Timestamp) -> bool {
        let root = block.root();
        let hash = block.hash();
        if self.recently_confirmed_index.contains(&root) {
            // Already decided; the node floods the canonical block instead.
            return false;
        }
        if let Some(election) = self.roots.get_mut(&root) {
            if election.add_candidate(block) {
                self.blocks.insert(hash, root);
            }
            return false;
        }
        if self.roots.len() >= self.max_elections {
            tracing::debug!(%root, "election container full, dropping insert");
            return false;
        }
        self.roots.insert(root, Election::new(block, now));
        self.blocks.insert(hash, root);
        true
    }

    /// Re-publish of a fork block: identical routing to `insert`, kept as a
    /// named operation for the processor's fork path.
    pub fn publish(&mut self, block: Block, now: Timestamp) -> bool {
        self.insert(block, now)
    }

    pub fn active(&self, root: &Root) -> bool {
        self.roots.contains_key(root)
    }

    pub fn active_hash(&self, hash: &BlockHash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn election(&self, root: &Root) -> Option<&Election> {
        self.roots.get(root)
    }

    pub fn election_mut(&mut self, root: &Root) -> Option<&mut Election> {
        self.roots.get_mut(root)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn recently_confirmed(&self, root: &Root) -> bool {
        self.recently_confirmed_index.contains(root)
    }

    /// Route a vote to the elections covering its hashes. `weight` is the
    /// voter's current representative weight; `delta` the quorum threshold.
    /// Newly confirmed elections are returned for cementing.
    pub fn vote(
        &mut self,
        vote: &Vote,
        weight: Amount,
        delta: Amount,
        now: Timestamp,
    ) -> (VoteOutcome, Vec<ElectionStatus>) {
        let mut outcome = VoteOutcome {
            replay: true,
            ..Default::default()
        };
        let mut confirmed = Vec::new();
        for hash in &vote.hashes {
            let Some(root) = self.blocks.get(hash).copied() else {
                outcome.indeterminate.push(*hash);
                continue;
            };
            let Some(election) = self.roots.get_mut(&root) else {
                outcome.indeterminate.push(*hash);
                continue;
            };
            match election.vote(vote.account, vote.sequence, *hash, weight, now) {
                VoteCode::Vote => {
                    outcome.replay = false;
                    outcome.processed += 1;
                    if let Some((winner, tally)) = election.try_confirm(delta, now) {
                        let status = ElectionStatus {
                            root,
                            winner: election
                                .candidate(&winner)
                                .expect("winner is a candidate")
                                .clone(),
                            tally,
                            duration_secs: election.duration_secs(now),
                        };
                        confirmed.push(status);
                    }
                }
                VoteCode::Replay => {}
                VoteCode::Indeterminate => outcome.indeterminate.push(*hash),
            }
        }
        // Sweep elections that confirmed under this vote into the ring.
        for status in &confirmed {
            self.erase_internal(&status.root, true);
        }
        (outcome, confirmed)
    }

    /// Confirmation-height signal: the root was cemented without a local
    /// quorum. The election terminates as expired-confirmed.
    pub fn confirm_external(&mut self, root: &Root, now: Timestamp) {
        if let Some(election) = self.roots.get_mut(root) {
            election.expire_confirmed(now);
        }
        self.erase_internal(root, true);
    }

    /// Remove the election for a root without recording a decision.
    pub fn erase(&mut self, root: &Root) {
        self.erase_internal(root, false);
    }

    fn erase_internal(&mut self, root: &Root, confirmed: bool) {
        let Some(election) = self.roots.remove(root) else {
            return;
        };
        self.blocks.retain(|_, r| r != root);
        if confirmed {
            if self.recently_confirmed.len() >= RECENTLY_CONFIRMED_CAPACITY {
                if let Some((old_root, _)) = self.recently_confirmed.pop_front() {
                    self.recently_confirmed_index.remove(&old_root);
                }
            }
            let winner = election
                .winner()
                .map(|(hash, _)| hash)
                .unwrap_or(BlockHash::ZERO);
            self.recently_confirmed.push_back((*root, winner));
            self.recently_confirmed_index.insert(*root);
        }
    }

    /// Update an election's work multiplier for solicitation ordering.
    pub fn update_difficulty(&mut self, hash: &BlockHash, multiplier: f64) {
        if let Some(root) = self.blocks.get(hash) {
            if let Some(election) = self.roots.get_mut(root) {
                election.multiplier = election.multiplier.max(multiplier);
            }
        }
    }

    /// Run timers: activate passive elections past their request delay and
    /// drop elections past their TTL. Returns expired roots.
    pub fn tick(&mut self, now: Timestamp) -> Vec<Root> {
        let mut expired = Vec::new();
        for (root, election) in &mut self.roots {
            if election.tick(now) {
                expired.push(*root);
            }
        }
        for root in &expired {
            tracing::debug!(%root, "election expired unconfirmed");
            self.erase_internal(root, false);
        }
        expired
    }

    /// Elections currently in the `Active` state, ordered by descending
    /// multiplier — the solicitation order.
    pub fn solicitation_order(&self) -> Vec<(Root, BlockHash, f64)> {
        let mut active: Vec<(Root, BlockHash, f64)> = self
            .roots
            .values()
            .filter(|e| e.state == ElectionState::Active)
            .filter_map(|e| winner_or_any(e).map(|hash| (e.root, hash, e.multiplier)))
            .collect();
        active.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        active
    }
}

/// The current winner, or the lowest candidate hash before votes arrive.
fn winner_or_any(election: &Election) -> Option<BlockHash> {
    election.winner().map(|(hash, _)| hash).or_else(|| {
        let mut hashes: Vec<BlockHash> = election.candidate_hashes().collect();
        hashes.sort();
        hashes.into_iter().next()
    })
}
