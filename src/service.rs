//! The remote identity service, as seen from the provider.

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::errors::ServiceError;
use crate::principal::Principal;
use crate::types::{
    Anchor, Challenge, ChallengeResult, DeviceData, ProofOfWork, PublicKey,
    SessionKey, SignedDelegation, Timestamp,
};

/// Reply of `prepare_delegation`: the anchor's per-origin public key and the timestamp the
/// delegation was prepared under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedDelegation {
    pub user_key: PublicKey,
    pub timestamp: Timestamp,
}

impl PreparedDelegation {
    /// Decode the raw reply, which must be exactly `[userKey bytes, timestamp]`.
    ///
    /// # Errors
    ///
    /// `ServiceError::Malformed` for any other shape.
    pub fn from_reply(reply: &Json) -> Result<Self, ServiceError> {
        let malformed = |detail: &str| ServiceError::Malformed {
            method: "prepare_delegation",
            detail: detail.to_owned(),
        };
        let [key, timestamp] = reply
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| malformed("expected a (userKey, timestamp) pair"))?
        else {
            return Err(malformed("expected exactly two elements"));
        };
        let user_key: Vec<u8> = serde_json::from_value(key.clone())
            .map_err(|e| malformed(&format!("userKey: {e}")))?;
        let timestamp = timestamp
            .as_u64()
            .ok_or_else(|| malformed("timestamp is not a u64"))?;
        Ok(Self {
            user_key: PublicKey(user_key),
            timestamp,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GetDelegationResponse {
    SignedDelegation(SignedDelegation),
    /// Not finalized yet; ask again later.
    NoSuchDelegation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterResponse {
    Registered { anchor: Anchor },
    BadChallenge,
    CanisterFull,
}

/// Connection to the identity service. Owned by the session and handed to each flow.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Devices registered to `anchor`; empty if the anchor is unknown.
    async fn lookup(&self, anchor: Anchor) -> Result<Vec<DeviceData>, ServiceError>;

    /// The principal `anchor` appears as to `origin`.
    async fn get_principal(
        &self,
        anchor: Anchor,
        origin: &str,
    ) -> Result<Principal, ServiceError>;

    async fn prepare_delegation(
        &self,
        anchor: Anchor,
        origin: &str,
        session_key: &SessionKey,
        max_time_to_live: Option<u64>,
    ) -> Result<PreparedDelegation, ServiceError>;

    async fn get_delegation(
        &self,
        anchor: Anchor,
        origin: &str,
        session_key: &SessionKey,
        timestamp: Timestamp,
    ) -> Result<GetDelegationResponse, ServiceError>;

    async fn create_challenge(&self, pow: ProofOfWork) -> Result<Challenge, ServiceError>;

    async fn register(
        &self,
        device: DeviceData,
        challenge: ChallengeResult,
    ) -> Result<RegisterResponse, ServiceError>;
}
