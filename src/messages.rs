//! Cross-window messages exchanged between the relying page and the identity provider.
//!
//! JSON objects tagged by `kind`. Binary fields travel as arrays of byte values.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::chain::DelegationChain;
use crate::errors::{HandshakeFailure, MessageError};
use crate::types::{DelegationRequest, PublicKey, SignedDelegation};

pub const KIND_AUTHORIZE_CLIENT: &str = "authorize-client";
pub const KIND_AUTHORIZE_SUCCESS: &str = "authorize-client-success";
pub const KIND_AUTHORIZE_FAILURE: &str = "authorize-client-failure";
pub const KIND_AUTHORIZE_READY: &str = "authorize-ready";

const KNOWN_KINDS: [&str; 4] = [
    KIND_AUTHORIZE_CLIENT,
    KIND_AUTHORIZE_SUCCESS,
    KIND_AUTHORIZE_FAILURE,
    KIND_AUTHORIZE_READY,
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    #[serde(rename = "authorize-client", rename_all = "camelCase")]
    AuthorizeClient {
        session_public_key: PublicKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_time_to_live: Option<u64>,
    },

    #[serde(rename = "authorize-client-success", rename_all = "camelCase")]
    AuthorizeClientSuccess {
        delegations: Vec<SignedDelegation>,
        user_public_key: PublicKey,
    },

    #[serde(rename = "authorize-client-failure")]
    AuthorizeClientFailure { text: String },

    /// Liveness signal from the provider to its opener; carries nothing secret.
    #[serde(rename = "authorize-ready")]
    AuthorizeReady,
}

impl Message {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizeClient { .. } => KIND_AUTHORIZE_CLIENT,
            Self::AuthorizeClientSuccess { .. } => KIND_AUTHORIZE_SUCCESS,
            Self::AuthorizeClientFailure { .. } => KIND_AUTHORIZE_FAILURE,
            Self::AuthorizeReady => KIND_AUTHORIZE_READY,
        }
    }

    /// Decode an inbound JSON message, telling apart unknown kinds from malformed known ones.
    ///
    /// # Errors
    ///
    /// `MessageError::Json` if the text is not JSON, `MissingKind` if there is no string
    /// `kind`, `UnknownKind` for kinds this protocol does not define, `Malformed` otherwise.
    pub fn decode(text: &str) -> Result<Self, MessageError> {
        let value: Json = serde_json::from_str(text).map_err(MessageError::Json)?;
        Self::from_json(value)
    }

    /// # Errors
    ///
    /// Same as [`Message::decode`], minus the JSON syntax error.
    pub fn from_json(value: Json) -> Result<Self, MessageError> {
        let kind = value
            .get("kind")
            .and_then(Json::as_str)
            .ok_or(MessageError::MissingKind)?
            .to_owned();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            return Err(MessageError::UnknownKind(kind));
        }
        serde_json::from_value(value).map_err(|source| MessageError::Malformed { kind, source })
    }

    /// # Errors
    ///
    /// `MessageError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(MessageError::Encode)
    }

    /// The request carried by an `authorize-client` message.
    #[must_use]
    pub fn as_request(&self) -> Option<DelegationRequest> {
        match self {
            Self::AuthorizeClient {
                session_public_key,
                max_time_to_live,
            } => Some(DelegationRequest {
                session_key: session_public_key.clone(),
                max_time_to_live: *max_time_to_live,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn request(request: &DelegationRequest) -> Self {
        Self::AuthorizeClient {
            session_public_key: request.session_key.clone(),
            max_time_to_live: request.max_time_to_live,
        }
    }

    #[must_use]
    pub fn success(chain: DelegationChain) -> Self {
        Self::AuthorizeClientSuccess {
            delegations: chain.delegations,
            user_public_key: chain.public_key,
        }
    }

    #[must_use]
    pub fn failure(reason: &HandshakeFailure) -> Self {
        Self::AuthorizeClientFailure {
            text: reason.to_string(),
        }
    }

    /// The handshake's single response for a given outcome.
    #[must_use]
    pub fn response(outcome: Result<DelegationChain, HandshakeFailure>) -> Self {
        match outcome {
            Ok(chain) => Self::success(chain),
            Err(reason) => Self::failure(&reason),
        }
    }

    /// Rebuild the chain from an `authorize-client-success` message.
    #[must_use]
    pub fn into_chain(self) -> Option<DelegationChain> {
        match self {
            Self::AuthorizeClientSuccess {
                delegations,
                user_public_key,
            } => Some(DelegationChain::new(user_public_key, delegations)),
            _ => None,
        }
    }
}
