// Dispute tracking - per-transaction vote state during a consensus round
//
// A transaction becomes disputed when a trie diff shows the local
// candidate set and a peer's proposed set disagree about it. Votes
// accumulate per peer and the local position is re-evaluated against a
// threshold that tightens as the round ages.

use crate::hash::Hash256;
use crate::identity::NodeId;
use crate::trie::{DeltaChange, TrieDelta};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisputeError {
    #[error("Invalid vote schedule: {0}")]
    InvalidSchedule(String),
}

/// Required-agreement schedule over the life of a round.
///
/// Percentages are whole numbers out of 100. The required agreement
/// never decreases as the round progresses, so a settled vote cannot
/// flap from the threshold alone.
#[derive(Debug, Clone)]
pub struct VoteSchedule {
    init_cutoff: u32,
    mid_cutoff: u32,
    late_cutoff: u32,
    init_pct: u32,
    mid_pct: u32,
    late_pct: u32,
    stuck_pct: u32,
}

impl Default for VoteSchedule {
    fn default() -> Self {
        Self {
            init_cutoff: 50,
            mid_cutoff: 75,
            late_cutoff: 90,
            init_pct: 50,
            mid_pct: 65,
            late_pct: 70,
            stuck_pct: 90,
        }
    }
}

impl VoteSchedule {
    pub fn with_cutoffs(mut self, init: u32, mid: u32, late: u32) -> Self {
        self.init_cutoff = init;
        self.mid_cutoff = mid;
        self.late_cutoff = late;
        self
    }

    pub fn with_thresholds(mut self, init: u32, mid: u32, late: u32, stuck: u32) -> Self {
        self.init_pct = init;
        self.mid_pct = mid;
        self.late_pct = late;
        self.stuck_pct = stuck;
        self
    }

    /// Check that the schedule is monotone in both axes
    pub fn validate(&self) -> Result<(), DisputeError> {
        if !(self.init_cutoff <= self.mid_cutoff && self.mid_cutoff <= self.late_cutoff) {
            return Err(DisputeError::InvalidSchedule(
                "cutoffs must be non-decreasing".to_string(),
            ));
        }
        if !(self.init_pct <= self.mid_pct
            && self.mid_pct <= self.late_pct
            && self.late_pct <= self.stuck_pct)
        {
            return Err(DisputeError::InvalidSchedule(
                "thresholds must be non-decreasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Agreement percentage required at a point in the round
    pub fn required_agreement(&self, percent_elapsed: u32) -> u32 {
        if percent_elapsed <= self.init_cutoff {
            self.init_pct
        } else if percent_elapsed <= self.mid_cutoff {
            self.mid_pct
        } else if percent_elapsed <= self.late_cutoff {
            self.late_pct
        } else {
            self.stuck_pct
        }
    }
}

/// Vote state for one disputed transaction
#[derive(Debug, Clone)]
pub struct DisputedTransaction {
    tx_id: Hash256,
    tx_bytes: Vec<u8>,
    our_vote: bool,
    votes: HashMap<NodeId, bool>,
    yays: u32,
    nays: u32,
}

impl DisputedTransaction {
    pub fn new(tx_id: Hash256, tx_bytes: Vec<u8>, our_vote: bool) -> Self {
        Self {
            tx_id,
            tx_bytes,
            our_vote,
            votes: HashMap::new(),
            yays: 0,
            nays: 0,
        }
    }

    pub fn tx_id(&self) -> &Hash256 {
        &self.tx_id
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn our_vote(&self) -> bool {
        self.our_vote
    }

    pub fn yays(&self) -> u32 {
        self.yays
    }

    pub fn nays(&self) -> u32 {
        self.nays
    }

    pub fn peer_vote(&self, peer: &NodeId) -> Option<bool> {
        self.votes.get(peer).copied()
    }

    /// Record or overwrite a peer's position
    pub fn set_vote(&mut self, peer: NodeId, vote: bool) {
        match self.votes.insert(peer, vote) {
            Some(previous) if previous == vote => {}
            Some(_) => {
                // Vote flipped, move the tally across
                if vote {
                    self.nays -= 1;
                    self.yays += 1;
                } else {
                    self.yays -= 1;
                    self.nays += 1;
                }
                tracing::debug!("Peer {} changed vote on {} to {}", peer, self.tx_id, vote);
            }
            None => {
                if vote {
                    self.yays += 1;
                } else {
                    self.nays += 1;
                }
            }
        }
    }

    /// Forget a peer's position, used when a peer leaves the round
    pub fn un_vote(&mut self, peer: &NodeId) {
        if let Some(vote) = self.votes.remove(peer) {
            if vote {
                self.yays -= 1;
            } else {
                self.nays -= 1;
            }
        }
    }

    /// Re-evaluate our own position against the schedule.
    ///
    /// Returns true if our vote flipped. Absent peers are abstentions;
    /// the ratio is taken over recorded votes only.
    pub fn update_our_vote(
        &mut self,
        percent_elapsed: u32,
        we_are_proposing: bool,
        schedule: &VoteSchedule,
    ) -> bool {
        // Unanimous agreement with our position cannot move
        if self.our_vote && self.nays == 0 {
            return false;
        }
        if !self.our_vote && self.yays == 0 {
            return false;
        }

        let new_vote = if we_are_proposing {
            let required = schedule.required_agreement(percent_elapsed);
            let agreement = self.yays * 100 / (self.yays + self.nays);
            agreement >= required
        } else {
            // When not proposing, just track the majority
            self.yays > self.nays
        };

        if new_vote == self.our_vote {
            return false;
        }

        self.our_vote = new_vote;
        tracing::debug!(
            "Changed our vote on {} to {} ({} yes / {} no at {}% elapsed)",
            self.tx_id,
            new_vote,
            self.yays,
            self.nays,
            percent_elapsed
        );
        true
    }
}

/// All disputes for one consensus round
#[derive(Debug, Default)]
pub struct DisputeSet {
    schedule: VoteSchedule,
    disputes: HashMap<Hash256, DisputedTransaction>,
}

impl DisputeSet {
    pub fn new(schedule: VoteSchedule) -> Self {
        Self {
            schedule,
            disputes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.disputes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disputes.is_empty()
    }

    pub fn get(&self, tx_id: &Hash256) -> Option<&DisputedTransaction> {
        self.disputes.get(tx_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisputedTransaction> {
        self.disputes.values()
    }

    pub fn tx_ids(&self) -> impl Iterator<Item = &Hash256> {
        self.disputes.keys()
    }

    /// Fold a diff between our candidate set and a peer's proposed set
    /// into the dispute set. Keys only we hold start as our yes and the
    /// peer's no; keys only the peer holds, the reverse; keys held with
    /// different bytes count as yes from both.
    pub fn seed_from_delta(&mut self, peer: NodeId, delta: &TrieDelta) {
        for (tx_id, change) in delta.iter() {
            let (tx_bytes, ours, peers) = match change {
                DeltaChange::LeftOnly(bytes) => (bytes.clone(), true, false),
                DeltaChange::RightOnly(bytes) => (bytes.clone(), false, true),
                DeltaChange::Differ { left, .. } => (left.clone(), true, true),
            };

            let dispute = self
                .disputes
                .entry(*tx_id)
                .or_insert_with(|| DisputedTransaction::new(*tx_id, tx_bytes, ours));
            dispute.set_vote(peer, peers);
        }
    }

    /// Record one peer's position on one disputed transaction
    pub fn set_peer_vote(&mut self, tx_id: &Hash256, peer: NodeId, vote: bool) {
        if let Some(dispute) = self.disputes.get_mut(tx_id) {
            dispute.set_vote(peer, vote);
        }
    }

    /// Drop a departed peer from every dispute
    pub fn remove_peer(&mut self, peer: &NodeId) {
        for dispute in self.disputes.values_mut() {
            dispute.un_vote(peer);
        }
    }

    /// Re-evaluate every dispute, returning how many votes flipped
    pub fn update_our_votes(&mut self, percent_elapsed: u32, we_are_proposing: bool) -> usize {
        let mut changed = 0;
        for dispute in self.disputes.values_mut() {
            if dispute.update_our_vote(percent_elapsed, we_are_proposing, &self.schedule) {
                changed += 1;
            }
        }
        changed
    }

    /// Transaction ids we currently vote to include
    pub fn favored_ids(&self) -> Vec<Hash256> {
        self.disputes
            .values()
            .filter(|d| d.our_vote())
            .map(|d| *d.tx_id())
            .collect()
    }
}
