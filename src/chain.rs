//! Delegation chains: the anchor's public key followed by signed delegations, each one
//! signed by the key of the previous link.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::errors::ChainError;
use crate::hash::{hash_of_map, Value};
use crate::keys::KeyPair;
use crate::ser::ed25519_raw;
use crate::types::{Delegation, PublicKey, SignedDelegation, Timestamp};

/// Domain separator prepended to the delegation hash before signing.
pub const DELEGATION_DOMAIN: &[u8] = b"\x1Aic-request-auth-delegation";

/// Bytes a delegation's signature covers.
#[must_use]
pub fn delegation_signature_msg(delegation: &Delegation) -> Vec<u8> {
    let targets: Option<Vec<Value<'_>>> = delegation
        .targets
        .as_ref()
        .map(|ts| ts.iter().map(|p| Value::Bytes(p.as_slice())).collect());

    let mut fields = vec![
        ("pubkey", Value::Bytes(delegation.pubkey.as_bytes())),
        ("expiration", Value::U64(delegation.expiration)),
    ];
    if let Some(targets) = targets {
        fields.push(("targets", Value::Array(targets)));
    }

    let mut msg = Vec::with_capacity(DELEGATION_DOMAIN.len() + 32);
    msg.extend_from_slice(DELEGATION_DOMAIN);
    msg.extend_from_slice(&hash_of_map(&fields));
    msg
}

#[must_use]
pub fn sign_delegation(signer: &KeyPair, delegation: Delegation) -> SignedDelegation {
    let signature = signer
        .signing_key()
        .sign(&delegation_signature_msg(&delegation))
        .to_bytes()
        .to_vec();
    SignedDelegation {
        delegation,
        signature,
    }
}

fn verifying_key(encoded: &PublicKey, index: usize) -> Result<VerifyingKey, ChainError> {
    ed25519_raw(encoded.as_bytes())
        .and_then(|raw| VerifyingKey::from_bytes(&raw).ok())
        .ok_or(ChainError::InvalidPublicKey { index })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationChain {
    pub public_key: PublicKey,
    pub delegations: Vec<SignedDelegation>,
}

impl DelegationChain {
    #[must_use]
    pub const fn new(public_key: PublicKey, delegations: Vec<SignedDelegation>) -> Self {
        Self {
            public_key,
            delegations,
        }
    }

    /// The chain handed back by a successful handshake: exactly one link.
    #[must_use]
    pub fn single(user_key: PublicKey, delegation: SignedDelegation) -> Self {
        Self::new(user_key, vec![delegation])
    }

    /// Key the final link delegates to.
    #[must_use]
    pub fn session_key(&self) -> Option<&PublicKey> {
        self.delegations.last().map(|d| &d.delegation.pubkey)
    }

    /// Earliest expiration along the chain.
    #[must_use]
    pub fn expiration(&self) -> Option<Timestamp> {
        self.delegations.iter().map(|d| d.delegation.expiration).min()
    }

    /// Check every link's Ed25519 signature against the key before it.
    /// Expiry is left to the relying party.
    ///
    /// # Errors
    ///
    /// `ChainError::Empty` for a chain without delegations, `InvalidPublicKey` or
    /// `InvalidSignature` naming the first bad link otherwise.
    pub fn verify_signatures(&self) -> Result<(), ChainError> {
        if self.delegations.is_empty() {
            return Err(ChainError::Empty);
        }
        let mut signer = &self.public_key;
        for (index, link) in self.delegations.iter().enumerate() {
            let key = verifying_key(signer, index)?;
            let signature = Signature::from_slice(&link.signature)
                .map_err(|_| ChainError::InvalidSignature { index })?;
            key.verify(&delegation_signature_msg(&link.delegation), &signature)
                .map_err(|_| ChainError::InvalidSignature { index })?;
            signer = &link.delegation.pubkey;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive;
    use crate::principal::Principal;

    fn delegation(pubkey: PublicKey, expiration: Timestamp) -> Delegation {
        Delegation {
            pubkey,
            expiration,
            targets: None,
        }
    }

    #[test]
    fn two_link_chain_verifies() {
        let anchor = derive(b"anchor seed", &[1]);
        let middle = derive(b"anchor seed", &[2]);
        let session = derive(b"anchor seed", &[3]);

        let first = sign_delegation(&anchor, delegation(middle.public_key_der(), 20));
        let second = sign_delegation(&middle, delegation(session.public_key_der(), 10));
        let chain = DelegationChain::new(anchor.public_key_der(), vec![first, second]);

        assert_eq!(chain.verify_signatures(), Ok(()));
        assert_eq!(chain.session_key(), Some(&session.public_key_der()));
        assert_eq!(chain.expiration(), Some(10));
    }

    #[test]
    fn raw_keys_are_accepted() {
        let anchor = derive(b"seed", &[]);
        let link = sign_delegation(&anchor, delegation(PublicKey(vec![0; 32]), 1));
        let chain = DelegationChain::single(PublicKey(anchor.public_key().to_vec()), link);
        assert_eq!(chain.verify_signatures(), Ok(()));
    }

    #[test]
    fn tampering_is_detected() {
        let anchor = derive(b"seed", &[]);
        let mut link = sign_delegation(&anchor, delegation(PublicKey(vec![0; 32]), 1));
        link.delegation.expiration = 2;
        let chain = DelegationChain::single(anchor.public_key_der(), link);
        assert_eq!(
            chain.verify_signatures(),
            Err(ChainError::InvalidSignature { index: 0 })
        );
    }

    #[test]
    fn targets_are_signed() {
        let anchor = derive(b"seed", &[]);
        let mut d = delegation(PublicKey(vec![0; 32]), 1);
        d.targets = Some(vec![Principal::anonymous()]);
        let mut link = sign_delegation(&anchor, d);
        assert_eq!(
            DelegationChain::single(anchor.public_key_der(), link.clone()).verify_signatures(),
            Ok(())
        );
        link.delegation.targets = Some(vec![]);
        assert!(DelegationChain::single(anchor.public_key_der(), link)
            .verify_signatures()
            .is_err());
    }

    #[test]
    fn empty_chain_and_bad_key() {
        assert_eq!(
            DelegationChain::new(PublicKey(vec![0; 32]), vec![]).verify_signatures(),
            Err(ChainError::Empty)
        );
        let anchor = derive(b"seed", &[]);
        let link = sign_delegation(&anchor, delegation(PublicKey(vec![0; 32]), 1));
        assert_eq!(
            DelegationChain::single(PublicKey(vec![1, 2, 3]), link).verify_signatures(),
            Err(ChainError::InvalidPublicKey { index: 0 })
        );
    }
}
