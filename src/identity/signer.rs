// Signing - detached Ed25519 signatures over message bytes

use super::keypair::{Keypair, PublicKey};
use ed25519_dalek::Signer as DalekSigner;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid signature length: expected 64, got {0}")]
    InvalidLength(usize),
}

/// Detached Ed25519 signature (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != 64 {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; 64];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..8]))
    }
}

/// Signs and verifies messages with validator keys
pub struct Signer;

impl Signer {
    /// Sign a message with the given keypair
    pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
        let sig = keypair.signing_key().sign(message);
        Signature(sig.to_bytes())
    }

    /// Verify a signature against a public key.
    ///
    /// Returns false for malformed keys as well as bad signatures, so
    /// callers get a single reject path for untrusted input.
    pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying) = public_key.verifying_key() else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        verifying.verify_strict(message, &sig).is_ok()
    }
}
