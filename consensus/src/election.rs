//! Election state machine — one election per contested root.
//!
//! An election tallies representative votes over every candidate block seen
//! for its root. A block is confirmed when its tally reaches the quorum
//! delta. Votes are superseded by strictly greater sequences; a vote with
//! the final sequence pins the account's weight to its target forever.

use cobalt_ledger::{Block, FINAL_VOTE_SEQUENCE};
use cobalt_types::{Account, Amount, BlockHash, Root, Timestamp};
use std::collections::HashMap;

/// Seconds an election idles in `Passive` before soliciting votes.
pub const ELECTION_REQUEST_DELAY_SECS: u64 = 5;
/// Hard cap on election age without quorum.
pub const ELECTION_TIME_TO_LIVE_SECS: u64 = 300;

/// The lifecycle state of an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionState {
    /// Created, waiting for a first vote or the request delay.
    Passive,
    /// Broadcasting confirm_req and tallying.
    Active,
    /// Reached quorum locally. Terminal; the winner goes to cementing.
    Confirmed,
    /// Confirmed externally via the confirmation-height signal. Terminal.
    ExpiredConfirmed,
    /// Aged out without quorum. Terminal; dropped from the container.
    ExpiredUnconfirmed,
}

/// Result of feeding one (account, sequence, hash) into an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteCode {
    /// Counted.
    Vote,
    /// Not strictly newer than the stored vote, or pinned by a final vote.
    Replay,
    /// The hash is not a candidate here.
    Indeterminate,
}

#[derive(Clone, Debug)]
struct VoteEntry {
    sequence: u64,
    hash: BlockHash,
    weight: Amount,
}

/// A single consensus election.
#[derive(Clone, Debug)]
pub struct Election {
    pub root: Root,
    pub state: ElectionState,
    candidates: HashMap<BlockHash, Block>,
    last_votes: HashMap<Account, VoteEntry>,
    created: Timestamp,
    state_changed: Timestamp,
    /// Work multiplier of the strongest candidate; orders solicitation.
    pub multiplier: f64,
}

impl Election {
    pub fn new(block: Block, now: Timestamp) -> Self {
        let root = block.root();
        let mut candidates = HashMap::new();
        candidates.insert(block.hash(), block);
        Self {
            root,
            state: ElectionState::Passive,
            candidates,
            last_votes: HashMap::new(),
            created: now,
            state_changed: now,
            multiplier: 1.0,
        }
    }

    /// Add a competing block for the same root. The winner may change as
    /// votes arrive. Returns false if the hash was already a candidate.
    pub fn add_candidate(&mut self, block: Block) -> bool {
        if self.is_terminal() {
            return false;
        }
        let hash = block.hash();
        self.candidates.insert(hash, block).is_none()
    }

    pub fn candidate(&self, hash: &BlockHash) -> Option<&Block> {
        self.candidates.get(hash)
    }

    pub fn candidate_hashes(&self) -> impl Iterator<Item = BlockHash> + '_ {
        self.candidates.keys().copied()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ElectionState::Confirmed
                | ElectionState::ExpiredConfirmed
                | ElectionState::ExpiredUnconfirmed
        )
    }

    /// Feed one vote leg into the election.
    pub fn vote(
        &mut self,
        account: Account,
        sequence: u64,
        hash: BlockHash,
        weight: Amount,
        now: Timestamp,
    ) -> VoteCode {
        if !self.candidates.contains_key(&hash) {
            return VoteCode::Indeterminate;
        }
        if self.is_terminal() {
            return VoteCode::Replay;
        }
        if let Some(existing) = self.last_votes.get(&account) {
            // A final vote pins the account; everything later is a replay,
            // and equal-or-lower sequences are replays regardless.
            if existing.sequence == FINAL_VOTE_SEQUENCE || sequence <= existing.sequence {
                return VoteCode::Replay;
            }
        }
        self.last_votes.insert(
            account,
            VoteEntry {
                sequence,
                hash,
                weight,
            },
        );
        if self.state == ElectionState::Passive {
            self.state = ElectionState::Active;
            self.state_changed = now;
        }
        VoteCode::Vote
    }

    /// Per-candidate weight sums across the latest vote of each account.
    pub fn tally(&self) -> HashMap<BlockHash, Amount> {
        let mut tally: HashMap<BlockHash, Amount> = HashMap::new();
        for entry in self.last_votes.values() {
            let sum = tally.entry(entry.hash).or_insert(Amount::ZERO);
            *sum = sum.saturating_add(entry.weight);
        }
        tally
    }

    /// Weight pinned by final votes, per candidate.
    pub fn final_tally(&self) -> HashMap<BlockHash, Amount> {
        let mut tally: HashMap<BlockHash, Amount> = HashMap::new();
        for entry in self
            .last_votes
            .values()
            .filter(|e| e.sequence == FINAL_VOTE_SEQUENCE)
        {
            let sum = tally.entry(entry.hash).or_insert(Amount::ZERO);
            *sum = sum.saturating_add(entry.weight);
        }
        tally
    }

    /// The candidate with the highest tally. Ties break on hash order so
    /// the result is deterministic across nodes with identical votes.
    pub fn winner(&self) -> Option<(BlockHash, Amount)> {
        self.tally()
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
    }

    /// Confirm if the leading candidate's tally reaches `delta`.
    pub fn try_confirm(&mut self, delta: Amount, now: Timestamp) -> Option<(BlockHash, Amount)> {
        if self.is_terminal() {
            return None;
        }
        let (winner, tally) = self.winner()?;
        if tally >= delta {
            self.state = ElectionState::Confirmed;
            self.state_changed = now;
            tracing::debug!(root = %self.root, %winner, %tally, "election confirmed");
            Some((winner, tally))
        } else {
            None
        }
    }

    /// Timer transitions: passive→active after the request delay, any
    /// non-terminal state→expired_unconfirmed after the TTL. Returns true
    /// if the election just expired.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self
            .created
            .has_expired(ELECTION_TIME_TO_LIVE_SECS, now)
        {
            self.state = ElectionState::ExpiredUnconfirmed;
            self.state_changed = now;
            return true;
        }
        if self.state == ElectionState::Passive
            && self.created.has_expired(ELECTION_REQUEST_DELAY_SECS, now)
        {
            self.state = ElectionState::Active;
            self.state_changed = now;
        }
        false
    }

    /// External confirmation signal: the root was cemented before local
    /// quorum arrived.
    pub fn expire_confirmed(&mut self, now: Timestamp) {
        if !self.is_terminal() {
            self.state = ElectionState::ExpiredConfirmed;
            self.state_changed = now;
        }
    }

    pub fn duration_secs(&self, now: Timestamp) -> u64 {
        self.created.elapsed_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_ledger::{SendBlock, StateBlock};
    use cobalt_types::{Link, Signature};

    fn make_block(previous: u8, balance: u128) -> Block {
        Block::State(StateBlock {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([previous; 32]),
            representative: Account::new([2u8; 32]),
            balance: Amount::new(balance),
            link: Link::new([3u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        })
    }

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn new_election_is_passive_with_one_candidate() {
        let block = make_block(1, 10);
        let election = Election::new(block.clone(), ts(100));
        assert_eq!(election.state, ElectionState::Passive);
        assert_eq!(election.candidate_count(), 1);
        assert_eq!(election.root, block.root());
    }

    #[test]
    fn first_vote_activates() {
        let block = make_block(1, 10);
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        let code = election.vote(rep(9), 1, hash, Amount::new(100), ts(101));
        assert_eq!(code, VoteCode::Vote);
        assert_eq!(election.state, ElectionState::Active);
    }

    #[test]
    fn vote_for_unknown_hash_is_indeterminate() {
        let mut election = Election::new(make_block(1, 10), ts(100));
        let code = election.vote(
            rep(9),
            1,
            BlockHash::new([0xEE; 32]),
            Amount::new(1),
            ts(101),
        );
        assert_eq!(code, VoteCode::Indeterminate);
    }

    #[test]
    fn equal_or_lower_sequence_is_replay() {
        let block = make_block(1, 10);
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        assert_eq!(
            election.vote(rep(9), 5, hash, Amount::new(100), ts(101)),
            VoteCode::Vote
        );
        assert_eq!(
            election.vote(rep(9), 5, hash, Amount::new(100), ts(102)),
            VoteCode::Replay
        );
        assert_eq!(
            election.vote(rep(9), 4, hash, Amount::new(100), ts(103)),
            VoteCode::Replay
        );
        assert_eq!(
            election.vote(rep(9), 6, hash, Amount::new(100), ts(104)),
            VoteCode::Vote
        );
    }

    #[test]
    fn tally_follows_latest_votes_across_forks() {
        let a = make_block(1, 10);
        let b = make_block(1, 20);
        assert_eq!(a.root(), b.root());
        let (ha, hb) = (a.hash(), b.hash());
        let mut election = Election::new(a, ts(100));
        assert!(election.add_candidate(b));

        election.vote(rep(1), 1, ha, Amount::new(300), ts(101));
        election.vote(rep(2), 1, hb, Amount::new(200), ts(102));
        assert_eq!(election.winner(), Some((ha, Amount::new(300))));

        // Rep 1 switches to b with a newer sequence; winner flips.
        election.vote(rep(1), 2, hb, Amount::new(300), ts(103));
        assert_eq!(election.winner(), Some((hb, Amount::new(500))));
        assert!(election.tally().get(&ha).is_none());
    }

    #[test]
    fn monotone_tally_under_increasing_sequences() {
        let block = make_block(1, 10);
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        let mut last = Amount::ZERO;
        for (i, weight) in [100u128, 150, 220].iter().enumerate() {
            election.vote(rep(i as u8 + 1), 1, hash, Amount::new(*weight), ts(101));
            let tally = *election.tally().get(&hash).unwrap();
            assert!(tally >= last);
            last = tally;
        }
    }

    #[test]
    fn final_vote_pins_account_weight() {
        let a = make_block(1, 10);
        let b = make_block(1, 20);
        let (ha, hb) = (a.hash(), b.hash());
        let mut election = Election::new(a, ts(100));
        election.add_candidate(b);

        election.vote(rep(1), FINAL_VOTE_SEQUENCE, ha, Amount::new(400), ts(101));
        assert_eq!(
            election.final_tally().get(&ha),
            Some(&Amount::new(400))
        );

        // Nothing this account sends later can move its weight.
        assert_eq!(
            election.vote(rep(1), FINAL_VOTE_SEQUENCE, hb, Amount::new(400), ts(102)),
            VoteCode::Replay
        );
        assert_eq!(election.tally().get(&ha), Some(&Amount::new(400)));
        assert!(election.tally().get(&hb).is_none());
    }

    #[test]
    fn quorum_confirms() {
        let block = make_block(1, 10);
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        election.vote(rep(1), 1, hash, Amount::new(600), ts(101));
        assert!(election.try_confirm(Amount::new(670), ts(102)).is_none());
        election.vote(rep(2), 1, hash, Amount::new(100), ts(103));
        let (winner, tally) = election.try_confirm(Amount::new(670), ts(104)).unwrap();
        assert_eq!(winner, hash);
        assert_eq!(tally, Amount::new(700));
        assert_eq!(election.state, ElectionState::Confirmed);
        // Confirmation is terminal and one-shot.
        assert!(election.try_confirm(Amount::new(1), ts(105)).is_none());
    }

    #[test]
    fn tick_transitions() {
        let mut election = Election::new(make_block(1, 10), ts(100));
        assert!(!election.tick(ts(104)));
        assert_eq!(election.state, ElectionState::Passive);
        assert!(!election.tick(ts(100 + ELECTION_REQUEST_DELAY_SECS)));
        assert_eq!(election.state, ElectionState::Active);
        assert!(election.tick(ts(100 + ELECTION_TIME_TO_LIVE_SECS)));
        assert_eq!(election.state, ElectionState::ExpiredUnconfirmed);
    }

    #[test]
    fn expired_election_rejects_votes() {
        let block = make_block(1, 10);
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        election.tick(ts(100 + ELECTION_TIME_TO_LIVE_SECS));
        assert_eq!(
            election.vote(rep(1), 1, hash, Amount::new(5), ts(500)),
            VoteCode::Replay
        );
    }

    #[test]
    fn expire_confirmed_is_terminal() {
        let mut election = Election::new(make_block(1, 10), ts(100));
        election.expire_confirmed(ts(101));
        assert_eq!(election.state, ElectionState::ExpiredConfirmed);
        assert!(!election.add_candidate(make_block(1, 30)));
    }

    #[test]
    fn winner_tie_breaks_deterministically() {
        let a = make_block(1, 10);
        let b = make_block(1, 20);
        let (ha, hb) = (a.hash(), b.hash());
        let mut election = Election::new(a, ts(100));
        election.add_candidate(b);
        election.vote(rep(1), 1, ha, Amount::new(100), ts(101));
        election.vote(rep(2), 1, hb, Amount::new(100), ts(101));
        let expected = ha.max(hb);
        assert_eq!(election.winner().unwrap().0, expected);
    }

    // Legacy blocks share the election machinery.
    #[test]
    fn legacy_send_candidates_work() {
        let block = Block::Send(SendBlock {
            previous: BlockHash::new([7u8; 32]),
            destination: Account::new([8u8; 32]),
            balance: Amount::new(5),
            signature: Signature::ZERO,
            work: 0,
        });
        let hash = block.hash();
        let mut election = Election::new(block, ts(100));
        assert_eq!(
            election.vote(rep(1), 1, hash, Amount::new(10), ts(101)),
            VoteCode::Vote
        );
    }
}
