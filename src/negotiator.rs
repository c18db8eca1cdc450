//! Async driver for the handshake state machine.
//!
//! Executes each [`Effect`] against the remote service, the user and the message channel,
//! strictly one at a time, and feeds the results back as [`Event`]s.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::chain::DelegationChain;
use crate::channel::{MessageChannel, TargetOrigin};
use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::errors::{ChannelError, HandshakeFailure};
use crate::handshake::{Effect, Event, Handshake, HandshakeContext};
use crate::messages::Message;
use crate::principal::Principal;
use crate::service::{GetDelegationResponse, RemoteService};
use crate::types::{Anchor, DelegationRequest};

/// Asks the user whether `origin` may act as `principal`.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, origin: &str, principal: &Principal) -> bool;
}

/// Answers every confirmation the same way.
#[derive(Clone, Copy, Debug)]
pub struct StaticConfirmer(pub bool);

#[async_trait]
impl Confirmer for StaticConfirmer {
    async fn confirm(&self, _origin: &str, _principal: &Principal) -> bool {
        self.0
    }
}

pub type Outcome = Result<DelegationChain, HandshakeFailure>;

pub struct Negotiator {
    anchor: Anchor,
    service: Arc<dyn RemoteService>,
    confirmer: Arc<dyn Confirmer>,
    clock: Arc<dyn Clock>,
    config: ProtocolConfig,
    cancel: Option<CancellationToken>,
}

impl Negotiator {
    #[must_use]
    pub fn new(
        anchor: Anchor,
        service: Arc<dyn RemoteService>,
        confirmer: Arc<dyn Confirmer>,
        clock: Arc<dyn Clock>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            anchor,
            service,
            confirmer,
            clock,
            config,
            cancel: None,
        }
    }

    /// Abort the handshake (including a pending backoff wait) when `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Wait for the first `authorize-client` message, answer it, and return the outcome.
    /// Other messages are ignored.
    ///
    /// Returns `None` if the channel closes before a request arrives.
    pub async fn serve<C>(&self, channel: &mut C) -> Option<Outcome>
    where
        C: MessageChannel + ?Sized,
    {
        while let Some(envelope) = channel.recv().await {
            if let Some(request) = envelope.message.as_request() {
                return Some(self.negotiate(&*channel, &envelope.origin, request).await);
            }
            warn!(
                kind = envelope.message.kind(),
                origin = %envelope.origin,
                "ignoring message that is not an authorize-client request"
            );
        }
        None
    }

    /// Run one handshake for `request`, posting the single response to `origin`.
    pub async fn negotiate<C>(&self, channel: &C, origin: &str, request: DelegationRequest) -> Outcome
    where
        C: MessageChannel + ?Sized,
    {
        let span = info_span!("handshake", anchor = %self.anchor, origin = %origin);
        self.drive(channel, origin, request).instrument(span).await
    }

    async fn drive<C>(&self, channel: &C, origin: &str, request: DelegationRequest) -> Outcome
    where
        C: MessageChannel + ?Sized,
    {
        info!(ttl = ?request.max_time_to_live, "handling authorize-client request");
        let mut handshake = Handshake::new(HandshakeContext {
            config: self.config.clone(),
            now: self.clock.now(),
        });

        let mut queue: VecDeque<Effect> = handshake
            .handle(Event::Request {
                origin: origin.to_owned(),
                request,
            })
            .into();
        while let Some(effect) = queue.pop_front() {
            if let Some(event) = self.execute(channel, effect).await {
                debug!(event = event.name(), state = handshake.state().name(), "handshake event");
                handshake.set_now(self.clock.now());
                queue.extend(handshake.handle(event));
            }
        }

        let outcome = handshake.into_outcome();
        match &outcome {
            Ok(chain) => info!(expiration = ?chain.expiration(), "delegation handed to relying page"),
            Err(reason) => info!(%reason, "handshake failed"),
        }
        outcome
    }

    /// Await `fut` unless cancellation wins first; `None` becomes [`Event::Cancelled`].
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => None,
                out = fut => Some(out),
            },
            None => Some(fut.await),
        }
    }

    async fn execute<C>(&self, channel: &C, effect: Effect) -> Option<Event>
    where
        C: MessageChannel + ?Sized,
    {
        let anchor = self.anchor;
        let event = match effect {
            Effect::LookupPrincipal { origin } => {
                let Some(result) = self
                    .cancellable(self.service.get_principal(anchor, &origin))
                    .await
                else {
                    return Some(Event::Cancelled);
                };
                match result {
                    Ok(principal) => Event::PrincipalResolved(principal),
                    Err(e) => Event::PrincipalLookupFailed(e),
                }
            }
            Effect::ConfirmOrigin { origin, principal } => {
                let Some(granted) = self
                    .cancellable(self.confirmer.confirm(&origin, &principal))
                    .await
                else {
                    return Some(Event::Cancelled);
                };
                if granted {
                    Event::OriginConfirmed
                } else {
                    Event::OriginDeclined
                }
            }
            Effect::PrepareDelegation {
                origin,
                session_key,
                max_time_to_live,
            } => {
                info!(max_time_to_live, "prepare_delegation");
                let Some(result) = self
                    .cancellable(self.service.prepare_delegation(
                        anchor,
                        &origin,
                        &session_key,
                        Some(max_time_to_live),
                    ))
                    .await
                else {
                    return Some(Event::Cancelled);
                };
                match result {
                    Ok(prepared) => Event::Prepared(prepared),
                    Err(e) => Event::PrepareFailed(e),
                }
            }
            Effect::FetchDelegation {
                origin,
                session_key,
                timestamp,
                attempt,
                delay,
            } => {
                if self.cancellable(tokio::time::sleep(delay)).await.is_none() {
                    return Some(Event::Cancelled);
                }
                info!(attempt, timestamp, "get_delegation");
                let Some(result) = self
                    .cancellable(self.service.get_delegation(anchor, &origin, &session_key, timestamp))
                    .await
                else {
                    return Some(Event::Cancelled);
                };
                match result {
                    Ok(GetDelegationResponse::SignedDelegation(signed)) => {
                        Event::DelegationReady(signed)
                    }
                    Ok(GetDelegationResponse::NoSuchDelegation) => {
                        debug!(attempt, "delegation not ready yet");
                        Event::NotReady
                    }
                    Err(e) => Event::FetchFailed(e),
                }
            }
            Effect::Respond { origin, message } => {
                self.respond(channel, &origin, message).await;
                return None;
            }
        };
        Some(event)
    }

    async fn respond<C>(&self, channel: &C, origin: &str, message: Message)
    where
        C: MessageChannel + ?Sized,
    {
        let kind = message.kind();
        if let Err(e) = channel
            .post(message, TargetOrigin::Exact(origin.to_owned()))
            .await
        {
            warn!(kind, error = %e, "could not deliver response to relying page");
        }
    }
}

/// Post the liveness signal to the opener with a wildcard target.
///
/// # Errors
///
/// `ChannelError::NoOpener` when the window was not opened by a relying page.
pub async fn announce_ready<C>(channel: &C) -> Result<(), ChannelError>
where
    C: MessageChannel + ?Sized,
{
    if !channel.has_opener() {
        return Err(ChannelError::NoOpener);
    }
    channel.post(Message::AuthorizeReady, TargetOrigin::Any).await
}
