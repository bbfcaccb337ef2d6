//! Confirm-req solicitation — one escalation pass over the active elections.
//!
//! Each pass walks elections in descending adjusted-difficulty order and
//! fans `confirm_req(hash, root)` out to the known principal reps, batching
//! pairs per channel. With no usable reps the pass falls back to a bounded
//! set of random peers. The caller owns pacing and the bandwidth limiter.

use crate::rep_crawler::Representative;
use cobalt_types::{Amount, BlockHash, Root};
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Pairs per confirm_req message.
pub const CONFIRM_REQ_HASHES_MAX: usize = 7;
/// Reps addressed per election per pass.
pub const MAX_CONFIRM_REPRESENTATIVES: usize = 30;
/// Random-peer fallback bound per pass.
pub const MAX_FALLBACK_PEERS: usize = 32;

/// One confirm_req message to one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solicitation {
    pub channel: String,
    pub pairs: Vec<(BlockHash, Root)>,
}

pub struct ConfirmReqSolicitor;

impl ConfirmReqSolicitor {
    /// Build the messages for one pass.
    ///
    /// `elections` must already be in descending adjusted-difficulty order
    /// (see `ActiveElections::solicitation_order`). `reps` are the known
    /// representatives with channels; those under `min_rep_weight` are
    /// ignored. `fallback_peers` are random peer channels used when no rep
    /// qualifies.
    pub fn prepare(
        elections: &[(Root, BlockHash, f64)],
        reps: &[Representative],
        min_rep_weight: Amount,
        fallback_peers: &[String],
    ) -> Vec<Solicitation> {
        let mut queues: HashMap<String, Vec<(BlockHash, Root)>> = HashMap::new();

        let usable: Vec<&Representative> =
            reps.iter().filter(|r| r.weight >= min_rep_weight).collect();

        if usable.is_empty() {
            let mut rng = rand::thread_rng();
            let mut peers = fallback_peers.to_vec();
            peers.shuffle(&mut rng);
            peers.truncate(MAX_FALLBACK_PEERS);
            for (root, hash, _) in elections {
                for peer in &peers {
                    queues.entry(peer.clone()).or_default().push((*hash, *root));
                }
            }
        } else {
            for (root, hash, _) in elections {
                for rep in usable.iter().take(MAX_CONFIRM_REPRESENTATIVES) {
                    queues
                        .entry(rep.channel.clone())
                        .or_default()
                        .push((*hash, *root));
                }
            }
        }

        let mut messages = Vec::new();
        for (channel, pairs) in queues {
            for chunk in pairs.chunks(CONFIRM_REQ_HASHES_MAX) {
                messages.push(Solicitation {
                    channel: channel.clone(),
                    pairs: chunk.to_vec(),
                });
            }
        }
        messages
    }
}
