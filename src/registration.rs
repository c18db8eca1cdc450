//! Registration of a new anchor: proof-of-work, CAPTCHA, `register`.
//!
//! `BadChallenge` and `CanisterFull` end the attempt and are shown to the user; nothing here
//! retries. Transport errors bubble up so the caller can restart the whole login attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::errors::RegistrationError;
use crate::pow::PowSolver;
use crate::service::{RegisterResponse, RemoteService};
use crate::types::{Anchor, Challenge, ChallengeResult, DeviceData};

/// Shows the puzzle to a human and returns the typed characters, or `None` if they gave up.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, challenge: &Challenge) -> Option<String>;
}

pub struct Registrar {
    service: Arc<dyn RemoteService>,
    clock: Arc<dyn Clock>,
    config: ProtocolConfig,
    solver: PowSolver,
}

impl Registrar {
    #[must_use]
    pub fn new(
        service: Arc<dyn RemoteService>,
        clock: Arc<dyn Clock>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            service,
            clock,
            config,
            solver: PowSolver::default(),
        }
    }

    /// Use a different proof-of-work solver.
    #[must_use]
    pub const fn with_solver(mut self, solver: PowSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Compute a proof-of-work for the current time and trade it for a challenge.
    ///
    /// # Errors
    ///
    /// `RegistrationError::Pow` if the search is cancelled or its worker dies,
    /// `RegistrationError::Remote` if `create_challenge` fails.
    pub async fn make_captcha(&self, cancel: &CancellationToken) -> Result<Challenge, RegistrationError> {
        let timestamp = self.clock.now();
        let pow = self
            .solver
            .solve_in_background(timestamp, self.config.service_id.clone(), cancel.clone())
            .await?;
        info!(timestamp = pow.timestamp, nonce = pow.nonce, "create_challenge");
        let challenge = self.service.create_challenge(pow).await?;
        Ok(challenge)
    }

    /// Register `device` as the first device of a new anchor.
    ///
    /// # Errors
    ///
    /// `BadChallenge` or `CanisterFull` as answered by the service, `Cancelled` if the user
    /// abandons the CAPTCHA, plus everything [`Registrar::make_captcha`] returns.
    pub async fn register(
        &self,
        device: DeviceData,
        captcha: &dyn CaptchaSolver,
        cancel: &CancellationToken,
    ) -> Result<Anchor, RegistrationError> {
        let span = info_span!("register", alias = %device.alias);
        async move {
            let challenge = self.make_captcha(cancel).await?;
            let chars = captcha
                .solve(&challenge)
                .await
                .ok_or(RegistrationError::Cancelled)?;
            let answer = ChallengeResult {
                key: challenge.challenge_key,
                chars,
            };
            match self.service.register(device, answer).await? {
                RegisterResponse::Registered { anchor } => {
                    info!(%anchor, "registered identity anchor");
                    Ok(anchor)
                }
                RegisterResponse::BadChallenge => {
                    warn!("registration rejected: bad challenge");
                    Err(RegistrationError::BadChallenge)
                }
                RegisterResponse::CanisterFull => {
                    warn!("registration rejected: no space left");
                    Err(RegistrationError::CanisterFull)
                }
            }
        }
        .instrument(span)
        .await
    }
}
