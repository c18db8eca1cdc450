use thiserror::Error;

use crate::types::Anchor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("principal too long: {len} bytes, at most 29")]
    TooLong { len: usize },

    #[error("principal text too short")]
    TooShort,

    #[error("principal text is not valid base32")]
    InvalidBase32,

    #[error("principal checksum mismatch")]
    ChecksumMismatch,

    #[error("principal text not in canonical form: {0}")]
    NotCanonical(String),
}

/// Failure talking to the remote service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response from {method}: {detail}")]
    Malformed { method: &'static str, detail: String },

    #[error("call rejected: {0}")]
    Rejected(String),
}

/// Terminal handshake failure. The `Display` text is what the relying page receives in
/// `authorize-client-failure`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    #[error("User did not grant access to {origin}.")]
    UserDeclined { origin: String },

    #[error("Error resolving the principal: {0}")]
    PrincipalLookup(ServiceError),

    #[error("Error preparing the delegation: {0}")]
    Prepare(ServiceError),

    #[error("Error retrieving the delegation: {0}")]
    Fetch(ServiceError),

    #[error("Failed to retrieve a delegation after {attempts} retries.")]
    Exhausted { attempts: u32 },

    #[error("Authorization was cancelled.")]
    Cancelled,

    #[error("Malformed authorize-client request: {0}")]
    MalformedRequest(String),

    #[error("Unexpected {event} while {state}.")]
    UnexpectedEvent {
        state: &'static str,
        event: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PowError {
    #[error("proof-of-work search cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },

    #[error("proof-of-work worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt value under {key}: {value}")]
    Corrupt { key: String, value: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("the CAPTCHA challenge wasn't successful")]
    BadChallenge,

    #[error("no space left for new anchors")]
    CanisterFull,

    #[error("registration cancelled by the user")]
    Cancelled,

    #[error(transparent)]
    Pow(#[from] PowError),

    #[error(transparent)]
    Remote(#[from] ServiceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("no anchor is stored on this device")]
    NoStoredAnchor,

    #[error("anchor {0} has no authentication devices")]
    UnknownAnchor(Anchor),

    #[error("anchor {0} has no recovery devices")]
    NoRecoveryDevice(Anchor),

    #[error("recovery phrase does not match the anchor's recovery device")]
    SeedPhraseMismatch,

    #[error(transparent)]
    Remote(#[from] ServiceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message has no kind")]
    MissingKind,

    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("message is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("message could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("window has no opener")]
    NoOpener,

    #[error("message channel closed")]
    Closed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("delegation chain is empty")]
    Empty,

    #[error("link {index}: public key is not a usable Ed25519 key")]
    InvalidPublicKey { index: usize },

    #[error("link {index}: signature does not verify")]
    InvalidSignature { index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid service id: {0}")]
    ServiceId(#[from] PrincipalError),

    #[error("retry policy needs at least one attempt")]
    NoAttempts,
}

/// What the provider does after a failure surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// Terminal and already reported; nothing to restart.
    None,
    /// Let the user start registration over.
    RetryRegistration,
    /// Generic "try again" prompt that restarts the whole login attempt.
    RestartLogin,
    /// Unknown state: show the error and reload the page.
    ReloadPage,
}

/// User-facing rendering of an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorView {
    pub title: String,
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorView {
    fn new(title: &str, message: &str, detail: Option<String>) -> Self {
        Self {
            title: title.to_owned(),
            message: message.to_owned(),
            detail,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Handshake(#[from] HandshakeFailure),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Pow(#[from] PowError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HandshakeFailure {
    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        match self {
            Self::UserDeclined { .. } | Self::Cancelled | Self::MalformedRequest(_) => {
                Recovery::None
            }
            Self::PrincipalLookup(_)
            | Self::Prepare(_)
            | Self::Fetch(_)
            | Self::Exhausted { .. } => Recovery::RestartLogin,
            Self::UnexpectedEvent { .. } => Recovery::ReloadPage,
        }
    }
}

impl RegistrationError {
    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        match self {
            Self::BadChallenge | Self::CanisterFull => Recovery::RetryRegistration,
            Self::Cancelled | Self::Pow(PowError::Cancelled { .. }) => Recovery::None,
            Self::Remote(_) => Recovery::RestartLogin,
            Self::Pow(PowError::Worker(_)) | Self::Storage(_) => Recovery::ReloadPage,
        }
    }
}

impl Error {
    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        match self {
            Self::Handshake(e) => e.recovery(),
            Self::Registration(e) => e.recovery(),
            Self::Login(LoginError::Storage(_))
            | Self::Pow(PowError::Worker(_))
            | Self::Storage(_)
            | Self::Message(_)
            | Self::Chain(_)
            | Self::Config(_) => Recovery::ReloadPage,
            Self::Login(_) | Self::Service(_) | Self::Channel(_) => Recovery::RestartLogin,
            Self::Pow(PowError::Cancelled { .. }) => Recovery::None,
        }
    }

    /// Title, message and optional detail shown to the user.
    #[must_use]
    pub fn view(&self) -> ErrorView {
        match self {
            Self::Registration(RegistrationError::CanisterFull) => ErrorView::new(
                "Failed to register",
                "Failed to register with Internet Identity, because there is no space left at the moment. We're working on increasing the capacity.",
                None,
            ),
            Self::Registration(RegistrationError::BadChallenge) => ErrorView::new(
                "Failed to register",
                "Failed to register with Internet Identity, because the CAPTCHA challenge wasn't successful",
                None,
            ),
            Self::Login(LoginError::UnknownAnchor(anchor)) => ErrorView {
                title: "Unknown Identity Anchor".to_owned(),
                message: format!(
                    "Failed to find an identity for the Identity Anchor {anchor}. Please check your Identity Anchor and try again."
                ),
                detail: None,
            },
            Self::Login(LoginError::SeedPhraseMismatch) => ErrorView::new(
                "Invalid Seed Phrase",
                "Failed to recover using this seedphrase. Did you enter it correctly?",
                None,
            ),
            Self::Login(LoginError::NoRecoveryDevice(_)) => ErrorView::new(
                "Failed to recover",
                "You do not have any recovery devices configured. Did you mean to authenticate with one of your devices instead?",
                None,
            ),
            Self::Handshake(HandshakeFailure::UserDeclined { origin }) => ErrorView {
                title: "Authorization declined".to_owned(),
                message: format!("Access to {origin} was not granted."),
                detail: None,
            },
            other => match other.recovery() {
                Recovery::RestartLogin => ErrorView::new(
                    "We couldn't reach Internet Identity",
                    "We failed to call the Internet Identity service, please try again.",
                    Some(other.to_string()),
                ),
                _ => ErrorView::new(
                    "Something went wrong",
                    "An unexpected error occurred. The page will be reloaded.",
                    Some(other.to_string()),
                ),
            },
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
