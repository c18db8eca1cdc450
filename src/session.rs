//! Top-level provider session: owns the service connection and the local anchor record, and
//! hands both to the login, registration and authorization flows.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::MessageChannel;
use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::errors::{ChannelError, Error, LoginError, StorageError};
use crate::keys::KeyPair;
use crate::negotiator::{announce_ready, Confirmer, Negotiator, Outcome};
use crate::registration::{CaptchaSolver, Registrar};
use crate::service::RemoteService;
use crate::storage::{AnchorStore, KeyValueStore};
use crate::types::{Anchor, DeviceData, KeyType, Purpose};

/// Where a window that was not opened by a relying page is sent.
pub const REDIRECT_PATH: &str = "/";

/// Result of loading the authorize page.
#[derive(Debug)]
pub enum Authorization {
    /// No opener: navigate to [`REDIRECT_PATH`] and reload.
    Redirect { to: &'static str },
    /// The relying page went away before sending a request.
    Abandoned,
    /// One handshake ran to completion; the relying page has its response.
    Completed(Outcome),
}

pub struct Session<S> {
    service: Arc<dyn RemoteService>,
    clock: Arc<dyn Clock>,
    config: ProtocolConfig,
    store: AnchorStore<S>,
    anchor: Option<Anchor>,
}

impl<S: KeyValueStore> Session<S> {
    /// Open a session, reading the persisted anchor once.
    ///
    /// # Errors
    ///
    /// `StorageError` if the stored anchor cannot be read.
    pub fn load(
        service: Arc<dyn RemoteService>,
        clock: Arc<dyn Clock>,
        config: ProtocolConfig,
        store: S,
    ) -> Result<Self, StorageError> {
        let store = AnchorStore::new(store);
        let anchor = store.anchor()?;
        info!(anchor = ?anchor, "session loaded");
        Ok(Self {
            service,
            clock,
            config,
            store,
            anchor,
        })
    }

    #[must_use]
    pub const fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    #[must_use]
    pub const fn store(&self) -> &AnchorStore<S> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Log in with the anchor stored on this device.
    ///
    /// # Errors
    ///
    /// `NoStoredAnchor` if registration is needed first, otherwise as [`Session::login_as`].
    pub async fn login(&mut self) -> Result<Anchor, LoginError> {
        let anchor = self.anchor.ok_or(LoginError::NoStoredAnchor)?;
        self.login_as(anchor).await
    }

    /// Log in with an anchor the user typed, remembering it on success.
    ///
    /// # Errors
    ///
    /// `UnknownAnchor` if it has no authentication device, `Remote` or `Storage` on I/O errors.
    pub async fn login_as(&mut self, anchor: Anchor) -> Result<Anchor, LoginError> {
        let devices = self.service.lookup(anchor).await?;
        if !devices.iter().any(|d| d.purpose == Purpose::Authentication) {
            warn!(%anchor, "anchor has no authentication devices");
            return Err(LoginError::UnknownAnchor(anchor));
        }
        self.remember(anchor)?;
        Ok(anchor)
    }

    /// Recover access to `anchor` with its recovery phrase.
    ///
    /// The phrase is not validated; a wrong phrase simply derives a key that does not match.
    ///
    /// # Errors
    ///
    /// `NoRecoveryDevice` without a seed-phrase recovery device, `SeedPhraseMismatch` if the
    /// derived key is not the registered one.
    #[cfg(feature = "mnemonic")]
    pub async fn recover_with_phrase(
        &mut self,
        anchor: Anchor,
        phrase: &str,
    ) -> Result<KeyPair, LoginError> {
        use crate::keys::from_mnemonic_without_validation;
        use crate::ser::ed25519_raw;
        use crate::types::IC_DERIVATION_PATH;

        let devices = self.service.lookup(anchor).await?;
        let expected = devices
            .iter()
            .find(|d| d.is_recovery() && d.wants_seed_phrase())
            .ok_or(LoginError::NoRecoveryDevice(anchor))?;

        let key = from_mnemonic_without_validation(phrase, &IC_DERIVATION_PATH);
        if ed25519_raw(expected.pubkey.as_bytes()) != Some(key.public_key()) {
            return Err(LoginError::SeedPhraseMismatch);
        }
        info!(%anchor, "recovered with seed phrase");
        self.remember(anchor)?;
        Ok(key)
    }

    /// Register a fresh device key under a new anchor and persist both.
    ///
    /// # Errors
    ///
    /// Any `RegistrationError`, or `StorageError` if persisting fails.
    pub async fn register(
        &mut self,
        alias: &str,
        captcha: &dyn CaptchaSolver,
        cancel: &CancellationToken,
    ) -> Result<Anchor, Error> {
        let key = KeyPair::generate();
        let device = DeviceData {
            alias: alias.to_owned(),
            pubkey: key.public_key_der(),
            credential_id: None,
            key_type: KeyType::Platform,
            purpose: Purpose::Authentication,
        };
        let registrar = Registrar::new(
            Arc::clone(&self.service),
            Arc::clone(&self.clock),
            self.config.clone(),
        );
        let anchor = registrar.register(device, captcha, cancel).await?;
        self.store.set_device_key(anchor, &key)?;
        self.remember(anchor)?;
        Ok(anchor)
    }

    /// A negotiator acting for the current anchor.
    ///
    /// # Errors
    ///
    /// `LoginError::NoStoredAnchor` before login or registration.
    pub fn negotiator(&self, confirmer: Arc<dyn Confirmer>) -> Result<Negotiator, LoginError> {
        let anchor = self.anchor.ok_or(LoginError::NoStoredAnchor)?;
        Ok(Negotiator::new(
            anchor,
            Arc::clone(&self.service),
            confirmer,
            Arc::clone(&self.clock),
            self.config.clone(),
        ))
    }

    /// Handle a load of the authorize page: signal readiness to the opener, then answer its
    /// `authorize-client` request.
    ///
    /// # Errors
    ///
    /// `LoginError::NoStoredAnchor` without an anchor, `ChannelError` if the ready signal
    /// cannot be posted.
    pub async fn authorize<C>(
        &self,
        channel: &mut C,
        confirmer: Arc<dyn Confirmer>,
        cancel: Option<CancellationToken>,
    ) -> Result<Authorization, Error>
    where
        C: MessageChannel + ?Sized,
    {
        if !channel.has_opener() {
            info!(to = REDIRECT_PATH, "no opener, redirecting");
            return Ok(Authorization::Redirect { to: REDIRECT_PATH });
        }
        let mut negotiator = self.negotiator(confirmer)?;
        if let Some(token) = cancel {
            negotiator = negotiator.with_cancellation(token);
        }
        match announce_ready(&*channel).await {
            Ok(()) => {}
            Err(ChannelError::NoOpener) => {
                return Ok(Authorization::Redirect { to: REDIRECT_PATH });
            }
            Err(e) => return Err(e.into()),
        }
        Ok(negotiator
            .serve(channel)
            .await
            .map_or(Authorization::Abandoned, Authorization::Completed))
    }

    /// Forget the anchor on this device.
    ///
    /// # Errors
    ///
    /// `StorageError` from the backend.
    pub fn logout(&mut self) -> Result<(), StorageError> {
        self.store.clear_anchor()?;
        self.anchor = None;
        info!("logged out");
        Ok(())
    }

    fn remember(&mut self, anchor: Anchor) -> Result<(), StorageError> {
        self.store.set_anchor(anchor)?;
        self.anchor = Some(anchor);
        Ok(())
    }
}
