// Consensus - dispute tracking, proposals, and canonical ordering

mod canonical;
mod dispute;
mod proposal;

pub use canonical::{CandidateTransaction, CanonicalKey, CanonicalTxSet};
pub use dispute::{DisputedTransaction, DisputeError, DisputeSet, VoteSchedule};
pub use proposal::{
    signing_hash, LedgerProposal, ProposalCodec, ProposalError, ProposalOutcome, ProposalRecord,
    ProposalRegistry, WITHDRAWN_SEQUENCE,
};
