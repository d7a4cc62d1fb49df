// Ledger proposals - signed position claims exchanged each round
//
// A proposal asserts "for the ledger after `previous_ledger`, I propose
// the transaction set whose root is `position`". Signatures cover a
// derived hash with a fixed field order and domain tag, so every peer
// reproduces the same bytes when verifying.

use crate::hash::Hash256;
use crate::identity::{Keypair, NodeId, PublicKey, Signature, Signer};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Sequence value marking a withdrawn proposal
pub const WITHDRAWN_SEQUENCE: u32 = u32::MAX;

const PROPOSAL_DOMAIN: &[u8] = b"PRP\0";

#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("Invalid signature from {0}")]
    InvalidSignature(NodeId),

    #[error("Proposal is not signed")]
    Unsigned,

    #[error("Failed to decode proposal: {0}")]
    DecodeError(String),
}

/// The hash a proposal signature covers. Field order is part of the
/// wire contract and must not change.
pub fn signing_hash(
    sequence: u32,
    close_time: u32,
    previous_ledger: &Hash256,
    position: &Hash256,
) -> Hash256 {
    let mut bytes = Vec::with_capacity(8 + 64);
    bytes.extend_from_slice(&sequence.to_be_bytes());
    bytes.extend_from_slice(&close_time.to_be_bytes());
    bytes.extend_from_slice(previous_ledger.as_bytes());
    bytes.extend_from_slice(position.as_bytes());
    Hash256::tagged(PROPOSAL_DOMAIN, &bytes)
}

// ============ Wire Record ============

/// A proposal as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRecord {
    pub previous_ledger: Hash256,
    pub position: Hash256,
    pub public_key: PublicKey,
    pub sequence: u32,
    pub close_time: u32,
    pub signature: Signature,
}

/// Encodes and decodes proposal wire records.
///
/// Layout: previous ledger (32), position (32), public key (32),
/// sequence (u32 BE), close time (u32 BE), signature length (u16 BE),
/// signature bytes.
pub struct ProposalCodec;

impl ProposalCodec {
    const FIXED_LEN: usize = 32 + 32 + 32 + 4 + 4 + 2;

    pub fn encode(record: &ProposalRecord) -> Vec<u8> {
        let sig = record.signature.as_bytes();
        let mut bytes = Vec::with_capacity(Self::FIXED_LEN + sig.len());
        bytes.extend_from_slice(record.previous_ledger.as_bytes());
        bytes.extend_from_slice(record.position.as_bytes());
        bytes.extend_from_slice(record.public_key.as_bytes());
        bytes.extend_from_slice(&record.sequence.to_be_bytes());
        bytes.extend_from_slice(&record.close_time.to_be_bytes());
        bytes.extend_from_slice(&(sig.len() as u16).to_be_bytes());
        bytes.extend_from_slice(sig);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<ProposalRecord, ProposalError> {
        if bytes.len() < Self::FIXED_LEN {
            return Err(ProposalError::DecodeError(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }

        let previous_ledger = Hash256::from_slice(&bytes[0..32])
            .map_err(|e| ProposalError::DecodeError(e.to_string()))?;
        let position = Hash256::from_slice(&bytes[32..64])
            .map_err(|e| ProposalError::DecodeError(e.to_string()))?;
        let public_key = PublicKey::from_slice(&bytes[64..96])
            .map_err(|e| ProposalError::DecodeError(e.to_string()))?;
        let sequence = u32::from_be_bytes([bytes[96], bytes[97], bytes[98], bytes[99]]);
        let close_time = u32::from_be_bytes([bytes[100], bytes[101], bytes[102], bytes[103]]);
        let sig_len = u16::from_be_bytes([bytes[104], bytes[105]]) as usize;

        let sig_bytes = &bytes[Self::FIXED_LEN..];
        if sig_bytes.len() != sig_len {
            return Err(ProposalError::DecodeError(format!(
                "signature length: declared {}, got {}",
                sig_len,
                sig_bytes.len()
            )));
        }
        let signature = Signature::from_bytes(sig_bytes)
            .map_err(|e| ProposalError::DecodeError(e.to_string()))?;

        Ok(ProposalRecord {
            previous_ledger,
            position,
            public_key,
            sequence,
            close_time,
            signature,
        })
    }

    pub fn encode_hex(record: &ProposalRecord) -> String {
        hex::encode(Self::encode(record))
    }

    pub fn decode_hex(data: &str) -> Result<ProposalRecord, ProposalError> {
        let bytes = hex::decode(data).map_err(|e| ProposalError::DecodeError(e.to_string()))?;
        Self::decode(&bytes)
    }
}

// ============ Proposal ============

/// One participant's claimed position for the next ledger
#[derive(Debug, Clone)]
pub struct LedgerProposal {
    node_id: NodeId,
    public_key: PublicKey,
    previous_ledger: Hash256,
    position: Hash256,
    close_time: u32,
    sequence: u32,
    signature: Option<Signature>,
}

impl LedgerProposal {
    /// Build from a wire record, verifying the signature. A proposal
    /// that fails verification must never reach a vote tally.
    pub fn from_record(record: &ProposalRecord) -> Result<Self, ProposalError> {
        let node_id = NodeId::from_public_key(&record.public_key);
        let hash = signing_hash(
            record.sequence,
            record.close_time,
            &record.previous_ledger,
            &record.position,
        );

        if !Signer::verify(&record.public_key, hash.as_bytes(), &record.signature) {
            warn!("Rejected proposal with bad signature from {}", node_id);
            return Err(ProposalError::InvalidSignature(node_id));
        }

        Ok(Self {
            node_id,
            public_key: record.public_key,
            previous_ledger: record.previous_ledger,
            position: record.position,
            close_time: record.close_time,
            sequence: record.sequence,
            signature: Some(record.signature),
        })
    }

    /// Build and sign our own initial proposal for a round
    pub fn new_local(
        keypair: &Keypair,
        previous_ledger: Hash256,
        position: Hash256,
        close_time: u32,
    ) -> Self {
        let mut proposal = Self {
            node_id: keypair.node_id(),
            public_key: keypair.public_key(),
            previous_ledger,
            position,
            close_time,
            sequence: 0,
            signature: None,
        };
        proposal.sign(keypair);
        proposal
    }

    /// Sign the current position
    pub fn sign(&mut self, keypair: &Keypair) {
        let hash = self.signing_hash();
        self.signature = Some(Signer::sign(keypair, hash.as_bytes()));
    }

    pub fn signing_hash(&self) -> Hash256 {
        signing_hash(
            self.sequence,
            self.close_time,
            &self.previous_ledger,
            &self.position,
        )
    }

    /// Check the stored signature against the proposer's key
    pub fn verify(&self) -> bool {
        match &self.signature {
            Some(sig) => Signer::verify(&self.public_key, self.signing_hash().as_bytes(), sig),
            None => false,
        }
    }

    /// Move to a new position, bumping the sequence. Returns false if
    /// the proposal was already withdrawn, or if the bump would land on
    /// the withdrawal sentinel. The old signature no longer covers the
    /// new fields, so the proposal must be re-signed before it can go
    /// back on the wire.
    pub fn change_position(&mut self, new_position: Hash256, new_close_time: u32) -> bool {
        if self.is_withdrawn() || self.sequence == WITHDRAWN_SEQUENCE - 1 {
            return false;
        }
        self.position = new_position;
        self.close_time = new_close_time;
        self.sequence += 1;
        self.signature = None;
        debug!(
            "Proposal from {} moved to {} (seq {})",
            self.node_id, self.position, self.sequence
        );
        true
    }

    /// Withdraw from the round. Idempotent; a withdrawn proposal never
    /// changes again.
    pub fn bow_out(&mut self) {
        if !self.is_withdrawn() {
            self.sequence = WITHDRAWN_SEQUENCE;
            self.signature = None;
        }
    }

    pub fn is_withdrawn(&self) -> bool {
        self.sequence == WITHDRAWN_SEQUENCE
    }

    /// Produce the wire record. Fails if the current position has not
    /// been signed.
    pub fn to_record(&self) -> Result<ProposalRecord, ProposalError> {
        let signature = self.signature.ok_or(ProposalError::Unsigned)?;
        Ok(ProposalRecord {
            previous_ledger: self.previous_ledger,
            position: self.position,
            public_key: self.public_key,
            sequence: self.sequence,
            close_time: self.close_time,
            signature,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn previous_ledger(&self) -> &Hash256 {
        &self.previous_ledger
    }

    pub fn position(&self) -> &Hash256 {
        &self.position
    }

    pub fn close_time(&self) -> u32 {
        self.close_time
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

// Identity is (proposer, previous ledger); position and sequence evolve
impl PartialEq for LedgerProposal {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id && self.previous_ledger == other.previous_ledger
    }
}

impl Eq for LedgerProposal {}

// ============ Registry ============

/// Outcome of applying a received proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// Recorded as the peer's current position
    Applied,
    /// Sequence not newer than what we hold, discarded
    Stale,
    /// Built on a different previous ledger than this round
    WrongLedger,
}

/// Latest proposal per peer for one round
#[derive(Debug)]
pub struct ProposalRegistry {
    previous_ledger: Hash256,
    proposals: HashMap<NodeId, LedgerProposal>,
}

impl ProposalRegistry {
    pub fn new(previous_ledger: Hash256) -> Self {
        Self {
            previous_ledger,
            proposals: HashMap::new(),
        }
    }

    /// Apply a verified proposal. Out-of-order deliveries resolve by
    /// discarding anything not strictly newer than the held sequence.
    pub fn apply(&mut self, proposal: LedgerProposal) -> ProposalOutcome {
        if *proposal.previous_ledger() != self.previous_ledger {
            debug!(
                "Ignoring proposal from {} for ledger {}",
                proposal.node_id(),
                proposal.previous_ledger()
            );
            return ProposalOutcome::WrongLedger;
        }

        if let Some(existing) = self.proposals.get(proposal.node_id()) {
            if proposal.sequence() <= existing.sequence() {
                return ProposalOutcome::Stale;
            }
        }

        self.proposals.insert(*proposal.node_id(), proposal);
        ProposalOutcome::Applied
    }

    pub fn get(&self, peer: &NodeId) -> Option<&LedgerProposal> {
        self.proposals.get(peer)
    }

    pub fn remove(&mut self, peer: &NodeId) -> Option<LedgerProposal> {
        self.proposals.remove(peer)
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerProposal> {
        self.proposals.values()
    }

    /// Current position hash per peer, withdrawn proposals excluded
    pub fn positions(&self) -> Vec<(NodeId, Hash256)> {
        self.proposals
            .values()
            .filter(|p| !p.is_withdrawn())
            .map(|p| (*p.node_id(), *p.position()))
            .collect()
    }
}
