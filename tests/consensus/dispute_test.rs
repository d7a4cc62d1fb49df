// Dispute Tests
// Vote tracking and the time-tightening agreement threshold

use bftledger::consensus::{DisputedTransaction, DisputeSet, VoteSchedule};
use bftledger::hash::Hash256;
use bftledger::identity::NodeId;
use bftledger::storage::MemoryStore;
use bftledger::trie::{MerkleTrie, TrieVersion};

fn tx(n: u32) -> Hash256 {
    Hash256::tagged(b"tx:", &n.to_be_bytes())
}

// ============================================================================
// VOTE SCHEDULE
// ============================================================================

#[test]
fn test_default_schedule_is_valid_and_monotone() {
    let schedule = VoteSchedule::default();
    schedule.validate().unwrap();

    let mut last = 0;
    for elapsed in 0..=120 {
        let required = schedule.required_agreement(elapsed);
        assert!(required >= last, "threshold decreased at {}%", elapsed);
        last = required;
    }
}

#[test]
fn test_default_schedule_breakpoints() {
    let schedule = VoteSchedule::default();
    assert_eq!(schedule.required_agreement(0), 50);
    assert_eq!(schedule.required_agreement(50), 50);
    assert_eq!(schedule.required_agreement(51), 65);
    assert_eq!(schedule.required_agreement(75), 65);
    assert_eq!(schedule.required_agreement(90), 70);
    assert_eq!(schedule.required_agreement(95), 90);
}

#[test]
fn test_validate_rejects_decreasing_thresholds() {
    let schedule = VoteSchedule::default().with_thresholds(80, 70, 90, 95);
    assert!(schedule.validate().is_err());
}

// ============================================================================
// PEER VOTES
// ============================================================================

#[test]
fn test_set_vote_tallies_and_is_idempotent() {
    let mut dispute = DisputedTransaction::new(tx(1), b"tx".to_vec(), false);
    let peer = NodeId::random();

    dispute.set_vote(peer, true);
    dispute.set_vote(peer, true);
    assert_eq!(dispute.yays(), 1);
    assert_eq!(dispute.nays(), 0);
}

#[test]
fn test_vote_change_moves_tally() {
    let mut dispute = DisputedTransaction::new(tx(1), b"tx".to_vec(), false);
    let peer = NodeId::random();

    dispute.set_vote(peer, true);
    dispute.set_vote(peer, false);
    assert_eq!(dispute.yays(), 0);
    assert_eq!(dispute.nays(), 1);
}

#[test]
fn test_un_vote_forgets_a_peer() {
    let mut dispute = DisputedTransaction::new(tx(1), b"tx".to_vec(), false);
    let peer = NodeId::random();

    dispute.set_vote(peer, true);
    dispute.un_vote(&peer);
    assert_eq!(dispute.yays(), 0);
    assert!(dispute.peer_vote(&peer).is_none());

    // Unknown peer is a no-op
    dispute.un_vote(&NodeId::random());
    assert_eq!(dispute.nays(), 0);
}

// ============================================================================
// OUR VOTE
// ============================================================================

fn with_votes(our_vote: bool, yes: usize, no: usize) -> DisputedTransaction {
    let mut dispute = DisputedTransaction::new(tx(1), b"tx".to_vec(), our_vote);
    for _ in 0..yes {
        dispute.set_vote(NodeId::random(), true);
    }
    for _ in 0..no {
        dispute.set_vote(NodeId::random(), false);
    }
    dispute
}

#[test]
fn test_seven_of_ten_flips_us_early_in_the_round() {
    let schedule = VoteSchedule::default();
    let mut dispute = with_votes(false, 7, 3);

    assert!(dispute.update_our_vote(50, true, &schedule));
    assert!(dispute.our_vote());
}

#[test]
fn test_seven_of_ten_is_not_enough_late_in_the_round() {
    let schedule = VoteSchedule::default();
    let mut dispute = with_votes(false, 7, 3);

    assert!(!dispute.update_our_vote(95, true, &schedule));
    assert!(!dispute.our_vote());
}

#[test]
fn test_unanimous_agreement_never_moves() {
    let schedule = VoteSchedule::default();
    let mut dispute = with_votes(true, 10, 0);

    for elapsed in [0, 50, 95, 100] {
        assert!(!dispute.update_our_vote(elapsed, true, &schedule));
        assert!(dispute.our_vote());
    }
}

#[test]
fn test_no_recorded_votes_is_abstention() {
    let schedule = VoteSchedule::default();
    let mut dispute = with_votes(false, 0, 0);

    assert!(!dispute.update_our_vote(50, true, &schedule));
    assert!(!dispute.our_vote());
}

#[test]
fn test_non_proposer_follows_the_majority() {
    let schedule = VoteSchedule::default();
    let mut dispute = with_votes(false, 6, 5);

    // A bare majority moves a non-proposing node even late in the round
    assert!(dispute.update_our_vote(95, false, &schedule));
    assert!(dispute.our_vote());
}

// ============================================================================
// DISPUTE SET
// ============================================================================

#[tokio::test]
async fn test_seed_from_delta_classifies_votes() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let mut ours = TrieVersion::empty();
    let mut theirs = TrieVersion::empty();

    // tx 1 only we hold, tx 2 only they hold, tx 3 differs
    ours = trie.insert(&ours, tx(1), b"one").await.unwrap();
    ours = trie.insert(&ours, tx(3), b"ours").await.unwrap();
    theirs = trie.insert(&theirs, tx(2), b"two").await.unwrap();
    theirs = trie.insert(&theirs, tx(3), b"theirs").await.unwrap();

    let delta = trie.compare(&ours, &theirs, 10).await.unwrap();

    let peer = NodeId::random();
    let mut disputes = DisputeSet::new(VoteSchedule::default());
    disputes.seed_from_delta(peer, &delta);

    assert_eq!(disputes.len(), 3);

    let only_ours = disputes.get(&tx(1)).unwrap();
    assert!(only_ours.our_vote());
    assert_eq!(only_ours.peer_vote(&peer), Some(false));

    let only_theirs = disputes.get(&tx(2)).unwrap();
    assert!(!only_theirs.our_vote());
    assert_eq!(only_theirs.peer_vote(&peer), Some(true));

    let differs = disputes.get(&tx(3)).unwrap();
    assert!(differs.our_vote());
    assert_eq!(differs.peer_vote(&peer), Some(true));
}

async fn single_dispute_set(peer: NodeId) -> DisputeSet {
    // Peer holds tx 1, we do not, so the seed is our no / peer yes
    let trie = MerkleTrie::new(MemoryStore::new());
    let ours = TrieVersion::empty();
    let theirs = trie
        .insert(&TrieVersion::empty(), tx(1), b"tx")
        .await
        .unwrap();

    let delta = trie.compare(&ours, &theirs, 10).await.unwrap();
    let mut disputes = DisputeSet::new(VoteSchedule::default());
    disputes.seed_from_delta(peer, &delta);
    disputes
}

#[tokio::test]
async fn test_remove_peer_clears_their_votes_everywhere() {
    let peer = NodeId::random();
    let mut disputes = single_dispute_set(peer).await;
    assert_eq!(disputes.get(&tx(1)).unwrap().yays(), 1);

    disputes.remove_peer(&peer);

    let dispute = disputes.get(&tx(1)).unwrap();
    assert_eq!(dispute.yays(), 0);
    assert_eq!(dispute.nays(), 0);
    assert!(dispute.peer_vote(&peer).is_none());
}

#[tokio::test]
async fn test_update_our_votes_counts_flips() {
    let mut disputes = single_dispute_set(NodeId::random()).await;
    for _ in 0..6 {
        disputes.set_peer_vote(&tx(1), NodeId::random(), true);
    }
    for _ in 0..3 {
        disputes.set_peer_vote(&tx(1), NodeId::random(), false);
    }

    // 7 yes / 3 no clears the early threshold and flips our no
    assert_eq!(disputes.update_our_votes(50, true), 1);
    assert!(disputes.get(&tx(1)).unwrap().our_vote());

    // Already flipped, nothing changes on a second pass
    assert_eq!(disputes.update_our_votes(50, true), 0);
}

#[tokio::test]
async fn test_favored_ids_tracks_our_votes() {
    let mut disputes = single_dispute_set(NodeId::random()).await;
    assert!(disputes.favored_ids().is_empty());

    for _ in 0..9 {
        disputes.set_peer_vote(&tx(1), NodeId::random(), true);
    }
    disputes.update_our_votes(50, true);

    assert_eq!(disputes.favored_ids(), vec![tx(1)]);
}
