//! Full authorize-page run: ready signal, wire-encoded request, delegation back to the relying page.

mod common;

use std::sync::Arc;

use common::{init_tracing, MockService, Readiness, NOW, ORIGIN, PROVIDER_ORIGIN};
use idp_delegation::{
    memory_pair, storage::ANCHOR_KEY, Anchor, Authorization, DeviceData, Error, KeyType,
    KeyValueStore, LoginError, MemoryEndpoint, MemoryStore, Message, MessageChannel,
    ProtocolConfig, PublicKey, Purpose, Session, StaticConfirmer, TargetOrigin, NANOS_PER_SEC,
    REDIRECT_PATH,
};
use serde_json::json;

const ANCHOR: Anchor = Anchor(12_345);

fn device() -> DeviceData {
    DeviceData {
        alias: "laptop".into(),
        pubkey: PublicKey(vec![1; 44]),
        credential_id: Some(vec![9, 9]),
        key_type: KeyType::Platform,
        purpose: Purpose::Authentication,
    }
}

fn session(service: &Arc<MockService>, stored: Option<Anchor>) -> Session<MemoryStore> {
    let store = MemoryStore::new();
    if let Some(anchor) = stored {
        store.set(ANCHOR_KEY, &anchor.to_string()).unwrap();
    }
    Session::load(
        service.clone(),
        service.clock.clone(),
        ProtocolConfig::default(),
        store,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn relying_page_receives_verifiable_delegation() {
    init_tracing();
    let service = Arc::new(MockService::new(Readiness::After(0)).with_devices(ANCHOR, vec![device()]));
    let mut session = session(&service, Some(ANCHOR));
    assert_eq!(session.login().await, Ok(ANCHOR));

    let (mut provider, mut relying) = memory_pair(PROVIDER_ORIGIN, ORIGIN);
    let ttl: u64 = 1_800 * NANOS_PER_SEC;

    let relying_side = async {
        let ready = relying.recv().await.expect("ready signal");
        assert_eq!(ready.message, Message::AuthorizeReady);
        assert_eq!(ready.origin, PROVIDER_ORIGIN);

        let wire = json!({
            "kind": "authorize-client",
            "sessionPublicKey": vec![0u8; 32],
            "maxTimeToLive": ttl,
        })
        .to_string();
        let request = Message::decode(&wire).unwrap();
        relying
            .post(request, TargetOrigin::Exact(PROVIDER_ORIGIN.into()))
            .await
            .unwrap();
        relying.recv().await.expect("response")
    };

    let (authorization, response) = tokio::join!(
        session.authorize(&mut provider, Arc::new(StaticConfirmer(true)), None),
        relying_side
    );

    assert!(matches!(
        authorization,
        Ok(Authorization::Completed(Ok(_)))
    ));
    assert_eq!(response.origin, PROVIDER_ORIGIN);

    let encoded = response.message.encode().unwrap();
    assert!(encoded.contains(r#""kind":"authorize-client-success""#));

    let chain = Message::decode(&encoded).unwrap().into_chain().unwrap();
    assert_eq!(chain.delegations.len(), 1);
    assert_eq!(chain.public_key, service.anchor_key.public_key_der());
    assert_eq!(chain.session_key(), Some(&PublicKey(vec![0; 32])));
    assert_eq!(chain.delegations[0].delegation.expiration, NOW + ttl);
    assert_eq!(chain.delegations[0].delegation.targets, None);
    assert_eq!(chain.verify_signatures(), Ok(()));
}

#[tokio::test]
async fn direct_navigation_redirects() {
    let service = Arc::new(MockService::new(Readiness::After(0)));
    let session = session(&service, Some(ANCHOR));
    let mut lone = MemoryEndpoint::detached(PROVIDER_ORIGIN);

    let authorization = session
        .authorize(&mut lone, Arc::new(StaticConfirmer(true)), None)
        .await
        .unwrap();
    assert!(matches!(authorization, Authorization::Redirect { to } if to == REDIRECT_PATH));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn authorize_needs_an_anchor() {
    let service = Arc::new(MockService::new(Readiness::After(0)));
    let session = session(&service, None);
    let (mut provider, _relying) = memory_pair(PROVIDER_ORIGIN, ORIGIN);

    let err = session
        .authorize(&mut provider, Arc::new(StaticConfirmer(true)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Login(LoginError::NoStoredAnchor)));
}

#[tokio::test]
async fn relying_page_closing_early_abandons() {
    let service = Arc::new(MockService::new(Readiness::After(0)));
    let session = session(&service, Some(ANCHOR));
    let (mut provider, mut relying) = memory_pair(PROVIDER_ORIGIN, ORIGIN);

    let relying_side = async move {
        let ready = relying.recv().await;
        drop(relying);
        ready
    };
    let (authorization, ready) = tokio::join!(
        session.authorize(&mut provider, Arc::new(StaticConfirmer(true)), None),
        relying_side
    );
    assert!(ready.is_some());
    assert!(matches!(authorization, Ok(Authorization::Abandoned)));
}
