//! Wallet session manager behaviour: connect/disconnect per chain,
//! persistence, hydration and the chain-specific background tasks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zecbridge::wallet::session::load_persisted;
use zecbridge::{
    BridgeConfig, BridgeError, ChainKind, KeyValueStore, MemoryStore, ProviderError,
    ProviderRegistry, WalletSession, WalletState, WalletStatePatch,
};

const KEY: &str = "walletState";

fn config() -> BridgeConfig {
    BridgeConfig {
        // Nothing listens here; Solana sessions in tests that do not care
        // about balances just log the failed poll.
        solana_rpc_url: "http://127.0.0.1:9".into(),
        ..Default::default()
    }
}

fn session_with(registry: ProviderRegistry, store: Arc<MemoryStore>) -> WalletSession {
    WalletSession::new(&config(), registry, store)
}

fn stored(store: &MemoryStore) -> Option<WalletState> {
    load_persisted(store, KEY).unwrap()
}

/// Wait until `pred` holds for the session state, or fail after 5s.
async fn wait_for(session: &WalletSession, pred: impl Fn(&WalletState) -> bool) -> WalletState {
    let mut rx = session.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = rx.borrow_and_update().clone();
            if pred(&current) {
                return current;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time")
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_each_chain_sets_exactly_one_identifier() {
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc())
        .with(MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).arc())
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let session = session_with(registry, Arc::new(MemoryStore::new()));

    for (chain, address) in [
        (ChainKind::Solana, SOL_PUBKEY),
        (ChainKind::Ethereum, ETH_ADDRESS),
        (ChainKind::Bitcoin, BTC_ADDRESS),
    ] {
        let state = session.connect(chain).await.unwrap();
        assert_eq!(state.wallet_type, Some(chain));
        assert!(state.is_connected);
        assert_eq!(state.address, address);
        assert_eq!(state.identifier(), Some(address));
        let set = [
            state.solana_public_key.is_some(),
            state.ethereum_address.is_some(),
            state.bitcoin_address.is_some(),
        ];
        assert_eq!(set.iter().filter(|s| **s).count(), 1, "{chain}");
        assert!(state.is_consistent());
    }
}

#[tokio::test]
async fn test_connect_without_provider_is_not_found() {
    let session = session_with(ProviderRegistry::new(), Arc::new(MemoryStore::new()));
    for chain in ChainKind::ALL {
        let err = session.connect(chain).await.unwrap_err();
        assert!(matches!(err, BridgeError::ProviderNotFound(c) if c == chain));
    }
    assert_eq!(session.state(), WalletState::empty());
}

#[tokio::test]
async fn test_user_rejection_leaves_state_unchanged() {
    let metamask = MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).arc();
    let phantom =
        MockProvider::failing(ChainKind::Solana, "phantom", ProviderError::user_rejected()).arc();
    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::new()
        .with(metamask.clone())
        .with(phantom.clone());
    let session = session_with(registry, store.clone());

    let before = session.connect(ChainKind::Ethereum).await.unwrap();
    let persisted_before = store.get(KEY).unwrap();

    let err = session.connect(ChainKind::Solana).await.unwrap_err();
    assert!(err.is_user_rejection());
    assert_eq!(session.state(), before);
    assert_eq!(store.get(KEY).unwrap(), persisted_before);
    assert_eq!(phantom.requests(), 1);
}

#[tokio::test]
async fn test_other_provider_error_passes_through() {
    let phantom = MockProvider::failing(
        ChainKind::Solana,
        "phantom",
        ProviderError::new(Some(-32603), "wallet locked"),
    )
    .arc();
    let session = session_with(
        ProviderRegistry::new().with(phantom),
        Arc::new(MemoryStore::new()),
    );

    match session.connect(ChainKind::Solana).await.unwrap_err() {
        BridgeError::Provider(e) => {
            assert_eq!(e.code, Some(-32603));
            assert_eq!(e.message, "wallet locked");
        }
        other => panic!("expected Provider error, got {other:?}"),
    }
    assert!(!session.state().is_connected);
}

#[tokio::test]
async fn test_bitcoin_falls_back_to_second_provider() {
    let unisat = MockProvider::failing(
        ChainKind::Bitcoin,
        "unisat",
        ProviderError::new(None, "not installed properly"),
    )
    .arc();
    let xverse = MockProvider::ok(ChainKind::Bitcoin, "xverse", BTC_ADDRESS).arc();
    let registry = ProviderRegistry::new()
        .with(unisat.clone())
        .with(xverse.clone());
    let session = session_with(registry, Arc::new(MemoryStore::new()));

    let state = session.connect(ChainKind::Bitcoin).await.unwrap();
    assert_eq!(state.bitcoin_address.as_deref(), Some(BTC_ADDRESS));
    assert_eq!(unisat.requests(), 1);
    assert_eq!(xverse.requests(), 1);
}

#[tokio::test]
async fn test_bitcoin_rejection_stops_fallback() {
    let unisat =
        MockProvider::failing(ChainKind::Bitcoin, "unisat", ProviderError::user_rejected()).arc();
    let xverse = MockProvider::ok(ChainKind::Bitcoin, "xverse", BTC_ADDRESS).arc();
    let registry = ProviderRegistry::new()
        .with(unisat.clone())
        .with(xverse.clone());
    let session = session_with(registry, Arc::new(MemoryStore::new()));

    let err = session.connect(ChainKind::Bitcoin).await.unwrap_err();
    assert!(matches!(err, BridgeError::UserRejected));
    assert_eq!(xverse.requests(), 0);
    assert_eq!(session.state(), WalletState::empty());
}

#[tokio::test]
async fn test_bitcoin_all_providers_failing_is_not_found() {
    let registry = ProviderRegistry::new()
        .with(MockProvider::failing(ChainKind::Bitcoin, "unisat", ProviderError::new(None, "a")).arc())
        .with(MockProvider::failing(ChainKind::Bitcoin, "xverse", ProviderError::new(None, "b")).arc());
    let session = session_with(registry, Arc::new(MemoryStore::new()));

    let err = session.connect(ChainKind::Bitcoin).await.unwrap_err();
    assert!(matches!(err, BridgeError::ProviderNotFound(ChainKind::Bitcoin)));
}

// ---------------------------------------------------------------------------
// disconnect + persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_persists_and_disconnect_removes() {
    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).arc());
    let session = session_with(registry, store.clone());

    let state = session.connect(ChainKind::Ethereum).await.unwrap();
    assert_eq!(stored(&store), Some(state));

    let raw: serde_json::Value = serde_json::from_str(&store.get(KEY).unwrap().unwrap()).unwrap();
    assert_eq!(raw["type"], "ethereum");
    assert_eq!(raw["ethereumAddress"], ETH_ADDRESS);

    session.disconnect().await;
    assert_eq!(session.state(), WalletState::empty());
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn test_disconnect_always_yields_empty_state() {
    let phantom = MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY)
        .with_disconnect()
        .arc();
    let registry = ProviderRegistry::new()
        .with(phantom.clone())
        .with(MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).arc())
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let store = Arc::new(MemoryStore::new());
    let session = session_with(registry, store.clone());

    // Disconnecting while already disconnected is harmless.
    session.disconnect().await;
    assert_eq!(session.state(), WalletState::empty());

    for chain in ChainKind::ALL {
        session.connect(chain).await.unwrap();
        session.disconnect().await;
        assert_eq!(session.state(), WalletState::empty());
        assert_eq!(store.get(KEY).unwrap(), None);
    }
    // Only the Solana provider exposes an explicit disconnect.
    assert_eq!(phantom.disconnects(), 1);
}

#[tokio::test]
async fn test_set_state_merges_and_persists() {
    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let session = session_with(registry, store.clone());
    session.connect(ChainKind::Bitcoin).await.unwrap();

    let next = session
        .set_state(WalletStatePatch {
            btc_balance: Some(Some(0.25)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(next.btc_balance, Some(0.25));
    assert_eq!(stored(&store).unwrap().btc_balance, Some(0.25));

    let err = session
        .set_state(WalletStatePatch {
            solana_public_key: Some(Some(SOL_PUBKEY.into())),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Validation(_)));
    assert_eq!(session.state().solana_public_key, None);
}

fn bitcoin_patch() -> WalletStatePatch {
    WalletStatePatch {
        wallet_type: Some(Some(ChainKind::Bitcoin)),
        address: Some(BTC_ADDRESS.into()),
        is_connected: Some(true),
        solana_public_key: Some(None),
        ethereum_address: Some(None),
        bitcoin_address: Some(Some(BTC_ADDRESS.into())),
        sol_balance: Some(None),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_set_state_chain_change_stops_sol_poll() {
    let server = balance_server(1_000_000_000).await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc());
    let session = WalletSession::new(&config, registry, Arc::new(MemoryStore::new()));

    session.connect(ChainKind::Solana).await.unwrap();
    wait_for(&session, |s| s.sol_balance.is_some()).await;

    let state = session.set_state(bitcoin_patch()).await.unwrap();
    assert_eq!(state.wallet_type, Some(ChainKind::Bitcoin));
    assert_eq!(state.sol_balance, None);

    // Let any request already on the wire land before counting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), before);
    assert_eq!(session.state(), state);
}

#[tokio::test]
async fn test_set_state_into_solana_starts_poll() {
    let server = balance_server(2_000_000_000).await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let session = WalletSession::new(&config, ProviderRegistry::new(), Arc::new(MemoryStore::new()));

    session
        .set_state(WalletStatePatch {
            wallet_type: Some(Some(ChainKind::Solana)),
            address: Some(SOL_PUBKEY.into()),
            is_connected: Some(true),
            solana_public_key: Some(Some(SOL_PUBKEY.into())),
            ..Default::default()
        })
        .await
        .unwrap();

    let state = wait_for(&session, |s| s.sol_balance.is_some()).await;
    assert_eq!(state.sol_balance, Some(2.0));
}

#[tokio::test]
async fn test_set_state_into_ethereum_attaches_account_listener() {
    let (metamask, events) =
        MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).with_account_events();
    let registry = ProviderRegistry::new()
        .with(metamask.arc())
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let session = session_with(registry, Arc::new(MemoryStore::new()));
    session.connect(ChainKind::Bitcoin).await.unwrap();

    session
        .set_state(WalletStatePatch {
            wallet_type: Some(Some(ChainKind::Ethereum)),
            address: Some(ETH_ADDRESS.into()),
            bitcoin_address: Some(None),
            ethereum_address: Some(Some(ETH_ADDRESS.into())),
            ..Default::default()
        })
        .await
        .unwrap();

    events.send(vec![ETH_ADDRESS_2.to_string()]).unwrap();
    let state = wait_for(&session, |s| s.address == ETH_ADDRESS_2).await;
    assert_eq!(state.ethereum_address.as_deref(), Some(ETH_ADDRESS_2));
}

// ---------------------------------------------------------------------------
// hydration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_hydrates_from_store() {
    let store = Arc::new(MemoryStore::new());
    let saved = json!({
        "type": "bitcoin",
        "address": BTC_ADDRESS,
        "isConnected": true,
        "solanaPublicKey": null,
        "ethereumAddress": null,
        "bitcoinAddress": BTC_ADDRESS,
        "solBalance": null,
        "ethBalance": null,
        "btcBalance": 0.5
    });
    store.set(KEY, &saved.to_string()).unwrap();

    let session = session_with(ProviderRegistry::new(), store.clone());
    let state = session.state();
    assert_eq!(state.wallet_type, Some(ChainKind::Bitcoin));
    assert_eq!(state.bitcoin_address.as_deref(), Some(BTC_ADDRESS));
    assert_eq!(state.btc_balance, Some(0.5));
    assert!(store.get(KEY).unwrap().is_some());
}

#[tokio::test]
async fn test_malformed_store_starts_empty() {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY, "{\"type\": \"solana\", \"address\": ").unwrap();

    let session = session_with(ProviderRegistry::new(), store.clone());
    assert_eq!(session.state(), WalletState::empty());
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn test_restored_solana_session_can_disconnect_provider() {
    let store = Arc::new(MemoryStore::new());
    let saved = WalletState::connected(ChainKind::Solana, SOL_PUBKEY);
    store.set(KEY, &serde_json::to_string(&saved).unwrap()).unwrap();

    let phantom = MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY)
        .with_disconnect()
        .arc();
    let session = session_with(ProviderRegistry::new().with(phantom.clone()), store.clone());
    assert_eq!(session.state(), saved);

    session.disconnect().await;
    assert_eq!(phantom.disconnects(), 1);
    assert_eq!(store.get(KEY).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Ethereum account changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_ethereum_account_change_updates_address_in_place() {
    let (metamask, events) =
        MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).with_account_events();
    let store = Arc::new(MemoryStore::new());
    let session = session_with(ProviderRegistry::new().with(metamask.arc()), store.clone());

    session.connect(ChainKind::Ethereum).await.unwrap();
    session
        .set_state(WalletStatePatch {
            eth_balance: Some(Some(1.0)),
            ..Default::default()
        })
        .await
        .unwrap();

    events.send(vec![ETH_ADDRESS_2.to_string()]).unwrap();
    let state = wait_for(&session, |s| s.address == ETH_ADDRESS_2).await;
    assert_eq!(state.ethereum_address.as_deref(), Some(ETH_ADDRESS_2));
    assert_eq!(state.eth_balance, Some(1.0));
    assert!(state.is_connected);
    assert_eq!(stored(&store).unwrap().address, ETH_ADDRESS_2);
}

#[tokio::test]
async fn test_ethereum_empty_accounts_disconnects() {
    let (metamask, events) =
        MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).with_account_events();
    let store = Arc::new(MemoryStore::new());
    let session = session_with(ProviderRegistry::new().with(metamask.arc()), store.clone());

    session.connect(ChainKind::Ethereum).await.unwrap();
    events.send(Vec::new()).unwrap();

    let state = wait_for(&session, |s| !s.is_connected).await;
    assert_eq!(state, WalletState::empty());
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn test_restored_ethereum_session_follows_account_changes() {
    let store = Arc::new(MemoryStore::new());
    let saved = WalletState::connected(ChainKind::Ethereum, ETH_ADDRESS);
    store.set(KEY, &serde_json::to_string(&saved).unwrap()).unwrap();

    let (metamask, events) =
        MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).with_account_events();
    let session = session_with(ProviderRegistry::new().with(metamask.arc()), store.clone());
    assert_eq!(session.state(), saved);

    events.send(vec![ETH_ADDRESS_2.to_string()]).unwrap();
    let state = wait_for(&session, |s| s.address == ETH_ADDRESS_2).await;
    assert_eq!(stored(&store), Some(state));

    events.send(Vec::new()).unwrap();
    wait_for(&session, |s| !s.is_connected).await;
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn test_account_events_ignored_after_switching_chain() {
    let (metamask, events) =
        MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).with_account_events();
    let registry = ProviderRegistry::new()
        .with(metamask.arc())
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let session = session_with(registry, Arc::new(MemoryStore::new()));

    session.connect(ChainKind::Ethereum).await.unwrap();
    let btc = session.connect(ChainKind::Bitcoin).await.unwrap();

    // The listener is gone, so nobody may be subscribed any more.
    let _ = events.send(Vec::new());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), btc);
}

// ---------------------------------------------------------------------------
// Solana balances
// ---------------------------------------------------------------------------

async fn balance_server(lamports: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getBalance", "params": [SOL_PUBKEY]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 1}, "value": lamports}
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_solana_connect_fetches_and_polls_balance() {
    let server = balance_server(1_250_000_000).await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc());
    let session = WalletSession::new(&config, registry, store.clone());

    session.connect(ChainKind::Solana).await.unwrap();
    let state = wait_for(&session, |s| s.sol_balance.is_some()).await;
    assert_eq!(state.sol_balance, Some(1.25));
    assert_eq!(state.solana_public_key.as_deref(), Some(SOL_PUBKEY));
    assert_eq!(stored(&store).unwrap().sol_balance, Some(1.25));

    tokio::time::sleep(Duration::from_millis(350)).await;
    let polled = server.received_requests().await.unwrap().len();
    assert!(polled >= 3, "expected repeated polls, got {polled}");

    session.disconnect().await;
    let after_disconnect = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), after_disconnect);
    assert_eq!(session.state(), WalletState::empty());
}

#[tokio::test]
async fn test_connect_other_chain_stops_sol_poll() {
    let server = balance_server(1_000_000_000).await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc())
        .with(MockProvider::ok(ChainKind::Bitcoin, "unisat", BTC_ADDRESS).arc());
    let session = WalletSession::new(&config, registry, Arc::new(MemoryStore::new()));

    session.connect(ChainKind::Solana).await.unwrap();
    wait_for(&session, |s| s.sol_balance.is_some()).await;
    let btc = session.connect(ChainKind::Bitcoin).await.unwrap();

    // Let any request already on the wire land before counting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), before);
    assert_eq!(session.state(), btc);
}

#[tokio::test]
async fn test_refresh_balances_failure_keeps_last_balance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc());
    let session = WalletSession::new(&config, registry, Arc::new(MemoryStore::new()));

    session.connect(ChainKind::Solana).await.unwrap();
    session
        .set_state(WalletStatePatch {
            sol_balance: Some(Some(0.5)),
            ..Default::default()
        })
        .await
        .unwrap();

    session.refresh_balances().await;
    assert_eq!(session.state().sol_balance, Some(0.5));
    assert!(session.state().is_connected);
}

#[tokio::test]
async fn test_refresh_balances_updates_only_sol_balance() {
    let server = balance_server(3_000_000_000).await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        balance_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Solana, "phantom", SOL_PUBKEY).arc());
    let session = WalletSession::new(&config, registry, Arc::new(MemoryStore::new()));

    session.connect(ChainKind::Solana).await.unwrap();
    session.refresh_balances().await;

    let state = session.state();
    let mut expected = WalletState::connected(ChainKind::Solana, SOL_PUBKEY);
    expected.sol_balance = Some(3.0);
    assert_eq!(state, expected);
}

#[tokio::test]
async fn test_refresh_balances_is_noop_when_disconnected_or_not_solana() {
    let server = MockServer::start().await;
    let config = BridgeConfig {
        solana_rpc_url: server.uri(),
        ..Default::default()
    };
    let registry = ProviderRegistry::new()
        .with(MockProvider::ok(ChainKind::Ethereum, "metamask", ETH_ADDRESS).arc());
    let session = WalletSession::new(&config, registry, Arc::new(MemoryStore::new()));

    session.refresh_balances().await;
    assert_eq!(session.state(), WalletState::empty());

    let connected = session.connect(ChainKind::Ethereum).await.unwrap();
    session.refresh_balances().await;
    assert_eq!(session.state(), connected);
    assert_eq!(session.state().eth_balance, None);
    assert!(server.received_requests().await.unwrap().is_empty());
}
