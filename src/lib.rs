#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Delegated-identity core of an identity provider.
//!
//! - [`keys`]: SLIP-0010 hardened Ed25519 derivation, plus recovery phrases.
//! - [`pow`]: CubeHash proof-of-work required before registration.
//! - [`handshake`] and [`negotiator`]: the `authorize-client` delegation handshake with a
//!   relying page, as a pure state machine and its async driver.
//! - [`session`]: login, recovery, registration and authorization over one service connection.
//!
// Fixed choices:
// - PoW hash: CubeHash160+16/32+160-256, 2 leading zero bytes
// - Keys: Ed25519, every derivation step hardened
// - Delegation signatures: Ed25519 over "\x1Aic-request-auth-delegation" || SHA-256 map hash

pub mod chain;
pub mod channel;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handshake;
pub mod hash;
pub mod keys;
pub mod messages;
pub mod negotiator;
pub mod nonce_cache;
pub mod pow;
pub mod principal;
pub mod registration;
pub mod ser;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;

pub use chain::{delegation_signature_msg, sign_delegation, DelegationChain};
pub use channel::{memory_pair, Envelope, MemoryEndpoint, MessageChannel, TargetOrigin};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ProtocolConfig, RetryPolicy};
pub use errors::{
    ChainError, ChannelError, ConfigError, Error, ErrorView, HandshakeFailure, LoginError,
    MessageError, PowError, PrincipalError, Recovery, RegistrationError, Result, ServiceError,
    StorageError,
};
pub use handshake::{transition, Effect, Event, Handshake, HandshakeContext, HandshakeState};
pub use keys::{derive, derive_child, master_key, ExtendedKey, KeyPair};
#[cfg(feature = "mnemonic")]
pub use keys::{from_mnemonic_without_validation, seed_from_mnemonic_without_validation};
pub use messages::Message;
pub use negotiator::{announce_ready, Confirmer, Negotiator, Outcome, StaticConfirmer};
pub use nonce_cache::NonceCache;
pub use pow::{PowSolver, DIFFICULTY};
pub use principal::Principal;
pub use registration::{CaptchaSolver, Registrar};
pub use service::{GetDelegationResponse, PreparedDelegation, RegisterResponse, RemoteService};
pub use session::{Authorization, Session, REDIRECT_PATH};
pub use storage::{AnchorStore, KeyValueStore, MemoryStore};
pub use types::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
