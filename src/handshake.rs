//! The `authorize-client` handshake as a pure state machine.
//!
//! ```text
//! Idle -> AwaitingOriginConfirmation -> Preparing -> Polling -> Succeeded
//!                  |                        |           |
//!                  +------------------------+-----------+--> Failed
//! ```
//!
//! [`transition`] never performs I/O. It returns the next state and the [`Effect`]s a driver
//! must carry out; the driver feeds the results back in as [`Event`]s. Both terminal states
//! emit exactly one [`Effect::Respond`], after which the handshake is finished.

use core::time::Duration;

use tracing::warn;

use crate::chain::DelegationChain;
use crate::config::{ProtocolConfig, RetryPolicy};
use crate::errors::{HandshakeFailure, ServiceError};
use crate::messages::Message;
use crate::principal::Principal;
use crate::service::PreparedDelegation;
use crate::types::{DelegationRequest, SessionKey, SignedDelegation, Timestamp};

/// Inputs the transition function reads besides the state and the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeContext {
    pub config: ProtocolConfig,
    /// Local time, only used to log how far the service's expiration runs past `now + ttl`.
    pub now: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingOriginConfirmation {
        origin: String,
        request: DelegationRequest,
    },
    Preparing {
        origin: String,
        request: DelegationRequest,
        ttl: u64,
    },
    Polling {
        origin: String,
        request: DelegationRequest,
        ttl: u64,
        prepared: PreparedDelegation,
        attempt: u32,
    },
    Succeeded {
        chain: DelegationChain,
    },
    Failed {
        reason: HandshakeFailure,
    },
}

impl HandshakeState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingOriginConfirmation { .. } => "awaiting-origin-confirmation",
            Self::Preparing { .. } => "preparing-delegation",
            Self::Polling { .. } => "polling-delegation",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Origin of the relying page this handshake answers to, once known.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::AwaitingOriginConfirmation { origin, .. }
            | Self::Preparing { origin, .. }
            | Self::Polling { origin, .. } => Some(origin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An `authorize-client` message arrived from `origin`.
    Request {
        origin: String,
        request: DelegationRequest,
    },
    PrincipalResolved(Principal),
    PrincipalLookupFailed(ServiceError),
    OriginConfirmed,
    OriginDeclined,
    Prepared(PreparedDelegation),
    PrepareFailed(ServiceError),
    DelegationReady(SignedDelegation),
    NotReady,
    FetchFailed(ServiceError),
    Cancelled,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::PrincipalResolved(_) => "principal-resolved",
            Self::PrincipalLookupFailed(_) => "principal-lookup-failed",
            Self::OriginConfirmed => "origin-confirmed",
            Self::OriginDeclined => "origin-declined",
            Self::Prepared(_) => "prepared",
            Self::PrepareFailed(_) => "prepare-failed",
            Self::DelegationReady(_) => "delegation-ready",
            Self::NotReady => "not-ready",
            Self::FetchFailed(_) => "fetch-failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Resolve the anchor's principal for `origin`.
    LookupPrincipal { origin: String },
    /// Show `origin` and `principal` to the user and ask for consent.
    ConfirmOrigin { origin: String, principal: Principal },
    PrepareDelegation {
        origin: String,
        session_key: SessionKey,
        max_time_to_live: u64,
    },
    /// Wait `delay`, then call `get_delegation`.
    FetchDelegation {
        origin: String,
        session_key: SessionKey,
        timestamp: Timestamp,
        attempt: u32,
        delay: Duration,
    },
    /// Post `message` to the relying page at `origin`.
    Respond { origin: String, message: Message },
}

fn fail(origin: String, reason: HandshakeFailure) -> (HandshakeState, Vec<Effect>) {
    let message = Message::failure(&reason);
    (
        HandshakeState::Failed { reason },
        vec![Effect::Respond { origin, message }],
    )
}

fn fetch(
    origin: String,
    request: DelegationRequest,
    ttl: u64,
    prepared: PreparedDelegation,
    attempt: u32,
    retry: &RetryPolicy,
) -> (HandshakeState, Vec<Effect>) {
    let effect = Effect::FetchDelegation {
        origin: origin.clone(),
        session_key: request.session_key.clone(),
        timestamp: prepared.timestamp,
        attempt,
        delay: retry.delay_before(attempt),
    };
    (
        HandshakeState::Polling {
            origin,
            request,
            ttl,
            prepared,
            attempt,
        },
        vec![effect],
    )
}

/// Advance the handshake by one event.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: HandshakeState,
    event: Event,
    ctx: &HandshakeContext,
) -> (HandshakeState, Vec<Effect>) {
    use HandshakeState as S;

    if state.is_terminal() {
        return (state, Vec::new());
    }

    match (state, event) {
        (S::Idle, Event::Request { origin, request }) => {
            if request.session_key.as_bytes().is_empty() {
                return fail(
                    origin,
                    HandshakeFailure::MalformedRequest("empty session public key".to_owned()),
                );
            }
            let effect = Effect::LookupPrincipal {
                origin: origin.clone(),
            };
            (
                S::AwaitingOriginConfirmation { origin, request },
                vec![effect],
            )
        }
        (S::Idle, event) => (
            S::Failed {
                reason: HandshakeFailure::UnexpectedEvent {
                    state: "idle",
                    event: event.name(),
                },
            },
            Vec::new(),
        ),

        (state, Event::Cancelled) => {
            let origin = state.origin().unwrap_or_default().to_owned();
            fail(origin, HandshakeFailure::Cancelled)
        }

        (S::AwaitingOriginConfirmation { origin, request }, Event::PrincipalResolved(principal)) => {
            let effect = Effect::ConfirmOrigin {
                origin: origin.clone(),
                principal,
            };
            (S::AwaitingOriginConfirmation { origin, request }, vec![effect])
        }
        (S::AwaitingOriginConfirmation { origin, .. }, Event::PrincipalLookupFailed(e)) => {
            fail(origin, HandshakeFailure::PrincipalLookup(e))
        }
        (S::AwaitingOriginConfirmation { origin, .. }, Event::OriginDeclined) => {
            let reason = HandshakeFailure::UserDeclined {
                origin: origin.clone(),
            };
            fail(origin, reason)
        }
        (S::AwaitingOriginConfirmation { origin, request }, Event::OriginConfirmed) => {
            let ttl = ctx.config.effective_ttl(request.max_time_to_live);
            let effect = Effect::PrepareDelegation {
                origin: origin.clone(),
                session_key: request.session_key.clone(),
                max_time_to_live: ttl,
            };
            (
                S::Preparing {
                    origin,
                    request,
                    ttl,
                },
                vec![effect],
            )
        }

        (
            S::Preparing {
                origin,
                request,
                ttl,
            },
            Event::Prepared(prepared),
        ) => fetch(origin, request, ttl, prepared, 0, &ctx.config.retry),
        (S::Preparing { origin, .. }, Event::PrepareFailed(e)) => {
            fail(origin, HandshakeFailure::Prepare(e))
        }

        (
            S::Polling {
                origin,
                request,
                ttl,
                prepared,
                attempt,
            },
            Event::NotReady,
        ) => {
            let next = attempt + 1;
            if next >= ctx.config.retry.max_attempts {
                let attempts = ctx.config.retry.max_attempts;
                return fail(origin, HandshakeFailure::Exhausted { attempts });
            }
            fetch(origin, request, ttl, prepared, next, &ctx.config.retry)
        }
        (
            S::Polling {
                origin,
                ttl,
                prepared,
                ..
            },
            Event::DelegationReady(signed),
        ) => {
            // the service stamps expiration with its own clock; the relying party enforces it
            let limit = ctx.now.saturating_add(ttl);
            if signed.delegation.expiration > limit {
                warn!(
                    expiration = signed.delegation.expiration,
                    limit,
                    "delegation expires later than local time allows, service clock is ahead"
                );
            }
            let chain = DelegationChain::single(prepared.user_key, signed);
            let message = Message::success(chain.clone());
            (
                S::Succeeded { chain },
                vec![Effect::Respond { origin, message }],
            )
        }
        (S::Polling { origin, .. }, Event::FetchFailed(e)) => {
            fail(origin, HandshakeFailure::Fetch(e))
        }

        (state, event) => {
            let reason = HandshakeFailure::UnexpectedEvent {
                state: state.name(),
                event: event.name(),
            };
            let origin = state.origin().unwrap_or_default().to_owned();
            fail(origin, reason)
        }
    }
}

/// Owns the current state and records every effect, for drivers that step one event at a time.
#[derive(Clone, Debug)]
pub struct Handshake {
    state: HandshakeState,
    ctx: HandshakeContext,
}

impl Handshake {
    #[must_use]
    pub const fn new(ctx: HandshakeContext) -> Self {
        Self {
            state: HandshakeState::Idle,
            ctx,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.ctx.now = now;
    }

    /// Apply `event` and return the effects to carry out.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let state = core::mem::replace(&mut self.state, HandshakeState::Idle);
        let (next, effects) = transition(state, event, &self.ctx);
        self.state = next;
        effects
    }

    /// Consume the handshake. A handshake that never reached a terminal state counts as a
    /// protocol failure.
    ///
    /// # Errors
    ///
    /// The failure reason, or `UnexpectedEvent` if the handshake is unfinished.
    pub fn into_outcome(self) -> Result<DelegationChain, HandshakeFailure> {
        match self.state {
            HandshakeState::Succeeded { chain } => Ok(chain),
            HandshakeState::Failed { reason } => Err(reason),
            other => Err(HandshakeFailure::UnexpectedEvent {
                state: other.name(),
                event: "end-of-effects",
            }),
        }
    }

    /// The final outcome, once terminal.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<&DelegationChain, &HandshakeFailure>> {
        match &self.state {
            HandshakeState::Succeeded { chain } => Some(Ok(chain)),
            HandshakeState::Failed { reason } => Some(Err(reason)),
            _ => None,
        }
    }
}
