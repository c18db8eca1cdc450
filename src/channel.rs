//! Typed cross-window message channel.
//!
//! The provider talks to its opener (the relying page) only through [`MessageChannel`], so
//! the handshake runs unchanged against a real window bridge or the in-memory pair below.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::ChannelError;
use crate::messages::Message;

/// Which origin a posted message may be delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `*`: any origin.
    Any,
    Exact(String),
}

impl TargetOrigin {
    #[must_use]
    pub fn parse(target: &str) -> Self {
        if target == "*" {
            Self::Any
        } else {
            Self::Exact(target.to_owned())
        }
    }

    #[must_use]
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(o) => o == origin,
        }
    }
}

/// A received message together with the origin of the window that posted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub origin: String,
    pub message: Message,
}

#[async_trait]
pub trait MessageChannel: Send {
    /// Whether a window opened this one.
    fn has_opener(&self) -> bool;

    /// Post to the peer window. Delivery is silently skipped when the peer's origin does
    /// not match `target`.
    ///
    /// # Errors
    ///
    /// `ChannelError::NoOpener` without a peer, `ChannelError::Closed` once the peer is gone.
    async fn post(&self, message: Message, target: TargetOrigin) -> Result<(), ChannelError>;

    /// Next inbound message, or `None` once the peer has gone away.
    async fn recv(&mut self) -> Option<Envelope>;
}

#[derive(Debug)]
struct Peer {
    origin: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// One end of an in-memory window pair.
#[derive(Debug)]
pub struct MemoryEndpoint {
    origin: String,
    peer: Option<Peer>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
}

/// Connect a provider window at `provider_origin` to its opener at `relying_origin`.
/// Returns `(provider, relying)`.
#[must_use]
pub fn memory_pair(provider_origin: &str, relying_origin: &str) -> (MemoryEndpoint, MemoryEndpoint) {
    let (to_provider, provider_inbox) = mpsc::unbounded_channel();
    let (to_relying, relying_inbox) = mpsc::unbounded_channel();
    let provider = MemoryEndpoint {
        origin: provider_origin.to_owned(),
        peer: Some(Peer {
            origin: relying_origin.to_owned(),
            tx: to_relying,
        }),
        inbox: provider_inbox,
    };
    let relying = MemoryEndpoint {
        origin: relying_origin.to_owned(),
        peer: Some(Peer {
            origin: provider_origin.to_owned(),
            tx: to_provider,
        }),
        inbox: relying_inbox,
    };
    (provider, relying)
}

impl MemoryEndpoint {
    /// A window the user navigated to directly: no opener, nothing to receive.
    #[must_use]
    pub fn detached(origin: &str) -> Self {
        let (_, inbox) = mpsc::unbounded_channel();
        Self {
            origin: origin.to_owned(),
            peer: None,
            inbox,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn peer_origin(&self) -> Option<&str> {
        self.peer.as_ref().map(|p| p.origin.as_str())
    }

    /// Drain whatever has already arrived without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.inbox.try_recv().ok()
    }
}

#[async_trait]
impl MessageChannel for MemoryEndpoint {
    fn has_opener(&self) -> bool {
        self.peer.is_some()
    }

    async fn post(&self, message: Message, target: TargetOrigin) -> Result<(), ChannelError> {
        let peer = self.peer.as_ref().ok_or(ChannelError::NoOpener)?;
        if !target.matches(&peer.origin) {
            debug!(kind = message.kind(), peer = %peer.origin, ?target, "target origin mismatch, dropped");
            return Ok(());
        }
        peer.tx
            .send(Envelope {
                origin: self.origin.clone(),
                message,
            })
            .map_err(|_| ChannelError::Closed)
    }

    async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}
