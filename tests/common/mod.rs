//! Scripted in-process identity service shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use idp_delegation::{
    pow, sign_delegation, Anchor, Challenge, ChallengeResult, Delegation, DeviceData,
    FixedClock, Clock, GetDelegationResponse, KeyPair, NonceCache, PreparedDelegation, Principal,
    ProofOfWork, ProtocolConfig, RegisterResponse, RemoteService, ServiceError, SessionKey, Timestamp,
};
use parking_lot::Mutex;
use tokio::time::Instant;

pub const ORIGIN: &str = "https://app.example";
pub const PROVIDER_ORIGIN: &str = "https://identity.example";
pub const NOW: Timestamp = 1_650_000_000_000_000_000;
pub const CAPTCHA_ANSWER: &str = "a";
pub const CHALLENGE_KEY: &str = "challenge-1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Lookup(Anchor),
    GetPrincipal { anchor: Anchor, origin: String },
    Prepare { anchor: Anchor, ttl: Option<u64>, at: Instant },
    Get { anchor: Anchor, timestamp: Timestamp, at: Instant },
    CreateChallenge(ProofOfWork),
    Register { alias: String, chars: String },
}

/// How `get_delegation` behaves.
#[derive(Clone, Copy, Debug)]
pub enum Readiness {
    /// "not ready" this many times, then the delegation.
    After(u32),
    Never,
}

struct Prepared {
    session_key: SessionKey,
    expiration: Timestamp,
}

struct State {
    readiness: Readiness,
    calls: Vec<Call>,
    prepared: HashMap<(Anchor, String), Prepared>,
    devices: HashMap<Anchor, Vec<DeviceData>>,
    nonces: NonceCache,
    next_anchor: u64,
    register_reply: Option<RegisterResponse>,
    prepare_error: Option<ServiceError>,
    get_error: Option<ServiceError>,
}

pub struct MockService {
    pub anchor_key: KeyPair,
    pub clock: Arc<FixedClock>,
    state: Mutex<State>,
}

impl MockService {
    pub fn new(readiness: Readiness) -> Self {
        Self {
            anchor_key: idp_delegation::derive(b"mock anchor key", &[0]),
            clock: Arc::new(FixedClock::new(NOW)),
            state: Mutex::new(State {
                readiness,
                calls: Vec::new(),
                prepared: HashMap::new(),
                devices: HashMap::new(),
                nonces: NonceCache::new(),
                next_anchor: 10_000,
                register_reply: None,
                prepare_error: None,
                get_error: None,
            }),
        }
    }

    pub fn with_devices(self, anchor: Anchor, devices: Vec<DeviceData>) -> Self {
        self.state.lock().devices.insert(anchor, devices);
        self
    }

    /// Answer every `register` with `reply` instead of registering.
    pub fn with_register_reply(self, reply: RegisterResponse) -> Self {
        self.state.lock().register_reply = Some(reply);
        self
    }

    pub fn with_prepare_error(self, error: ServiceError) -> Self {
        self.state.lock().prepare_error = Some(error);
        self
    }

    pub fn with_get_error(self, error: ServiceError) -> Self {
        self.state.lock().get_error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn prepare_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Prepare { .. }))
            .collect()
    }

    pub fn get_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Get { .. }))
            .collect()
    }

    pub fn devices(&self, anchor: Anchor) -> Vec<DeviceData> {
        self.state.lock().devices.get(&anchor).cloned().unwrap_or_default()
    }

    pub fn principal_for(anchor: Anchor) -> Principal {
        Principal::from_slice(&anchor.0.to_be_bytes()).unwrap()
    }
}

#[async_trait]
impl RemoteService for MockService {
    async fn lookup(&self, anchor: Anchor) -> Result<Vec<DeviceData>, ServiceError> {
        let mut st = self.state.lock();
        st.calls.push(Call::Lookup(anchor));
        Ok(st.devices.get(&anchor).cloned().unwrap_or_default())
    }

    async fn get_principal(&self, anchor: Anchor, origin: &str) -> Result<Principal, ServiceError> {
        self.state.lock().calls.push(Call::GetPrincipal {
            anchor,
            origin: origin.to_owned(),
        });
        Ok(Self::principal_for(anchor))
    }

    async fn prepare_delegation(
        &self,
        anchor: Anchor,
        origin: &str,
        session_key: &SessionKey,
        max_time_to_live: Option<u64>,
    ) -> Result<PreparedDelegation, ServiceError> {
        let mut st = self.state.lock();
        st.calls.push(Call::Prepare {
            anchor,
            ttl: max_time_to_live,
            at: Instant::now(),
        });
        if let Some(e) = st.prepare_error.clone() {
            return Err(e);
        }
        let timestamp = self.clock.now();
        let expiration = timestamp + max_time_to_live.unwrap_or(idp_delegation::MAX_TIME_TO_LIVE_NS);
        st.prepared.insert(
            (anchor, origin.to_owned()),
            Prepared {
                session_key: session_key.clone(),
                expiration,
            },
        );
        Ok(PreparedDelegation {
            user_key: self.anchor_key.public_key_der(),
            timestamp,
        })
    }

    async fn get_delegation(
        &self,
        anchor: Anchor,
        origin: &str,
        session_key: &SessionKey,
        timestamp: Timestamp,
    ) -> Result<GetDelegationResponse, ServiceError> {
        let mut st = self.state.lock();
        st.calls.push(Call::Get {
            anchor,
            timestamp,
            at: Instant::now(),
        });
        if let Some(e) = st.get_error.clone() {
            return Err(e);
        }
        let readiness = st.readiness;
        match readiness {
            Readiness::Never => return Ok(GetDelegationResponse::NoSuchDelegation),
            Readiness::After(n) if n > 0 => {
                st.readiness = Readiness::After(n - 1);
                return Ok(GetDelegationResponse::NoSuchDelegation);
            }
            Readiness::After(_) => {}
        }
        let Some(prepared) = st.prepared.get(&(anchor, origin.to_owned())) else {
            return Ok(GetDelegationResponse::NoSuchDelegation);
        };
        if &prepared.session_key != session_key {
            return Ok(GetDelegationResponse::NoSuchDelegation);
        }
        let delegation = Delegation {
            pubkey: session_key.clone(),
            expiration: prepared.expiration,
            targets: None,
        };
        Ok(GetDelegationResponse::SignedDelegation(sign_delegation(
            &self.anchor_key,
            delegation,
        )))
    }

    async fn create_challenge(&self, proof: ProofOfWork) -> Result<Challenge, ServiceError> {
        let mut st = self.state.lock();
        st.calls.push(Call::CreateChallenge(proof));
        if !pow::verify(&proof, &ProtocolConfig::default().service_id) {
            return Err(ServiceError::Rejected("invalid proof of work".into()));
        }
        if !st.nonces.add(proof) {
            return Err(ServiceError::Rejected("proof of work already used".into()));
        }
        Ok(Challenge {
            png_image: vec![0x89, b'P', b'N', b'G'],
            challenge_key: CHALLENGE_KEY.to_owned(),
        })
    }

    async fn register(
        &self,
        device: DeviceData,
        challenge: ChallengeResult,
    ) -> Result<RegisterResponse, ServiceError> {
        let mut st = self.state.lock();
        st.calls.push(Call::Register {
            alias: device.alias.clone(),
            chars: challenge.chars.clone(),
        });
        if let Some(reply) = st.register_reply {
            return Ok(reply);
        }
        if challenge.key != CHALLENGE_KEY || challenge.chars != CAPTCHA_ANSWER {
            return Ok(RegisterResponse::BadChallenge);
        }
        let anchor = Anchor(st.next_anchor);
        st.next_anchor += 1;
        st.devices.insert(anchor, vec![device]);
        Ok(RegisterResponse::Registered { anchor })
    }
}
