// Identity - validator keys, signatures, and peer identities

mod keypair;
mod signer;

pub use keypair::{Keypair, KeypairError, PublicKey};
pub use signer::{Signature, SignatureError, Signer};

use crate::hash::Hash256;
use std::fmt;

/// Stable identity of a peer, derived from its public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Hash256);

impl NodeId {
    /// Derive the identity for a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(Hash256::tagged(b"peer:", public_key.as_bytes()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Hash256::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Random identity, for tests and simulations
    pub fn random() -> Self {
        Self(Hash256::random())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}
