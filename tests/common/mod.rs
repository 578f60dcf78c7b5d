//! In-process fake upstream: mirror api, ipfs gateway and pool directory on one listener.
#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_enricher::config::{Config, RetryPolicy};

pub const PAGE_SIZE: u64 = 100;

#[derive(Default)]
pub struct Fake {
    pub tokens: Mutex<HashMap<String, Value>>,
    pub token_hits: AtomicUsize,
    /// 503s to hand out before answering normally.
    pub token_failures: AtomicUsize,
    /// Fixed status for every token request.
    pub token_status: Mutex<Option<u16>>,

    pub nfts: Mutex<HashMap<(String, u64), Value>>,
    pub nft_hits: AtomicUsize,

    /// Token holders by token id, for whitelist grants.
    pub holders: Mutex<HashMap<String, Vec<Value>>>,
    pub holder_hits: AtomicUsize,

    /// Number of NFTs (serials 1..=n) each account holds.
    pub account_holdings: Mutex<HashMap<String, u64>>,
    pub account_hits: AtomicUsize,

    pub pools: Mutex<Value>,
    pub pool_hits: AtomicUsize,
    pub pool_failures: AtomicUsize,

    pub ipfs_hits: AtomicUsize,
}

impl Fake {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.pools.lock().unwrap() = json!([]);
        Arc::new(fake)
    }

    pub fn add_token(&self, token_id: &str, max_supply: u64, total_supply: u64, treasury: &str) {
        self.tokens.lock().unwrap().insert(
            token_id.to_string(),
            json!({
                "token_id": token_id,
                "name": "Rebels",
                "symbol": "RBL",
                "decimals": "0",
                "max_supply": max_supply.to_string(),
                "total_supply": total_supply.to_string(),
                "treasury_account_id": treasury,
            }),
        );
    }

    pub fn add_nft(&self, token_id: &str, serial: u64, owner: &str, reference: &str) {
        self.nfts.lock().unwrap().insert(
            (token_id.to_string(), serial),
            json!({
                "account_id": owner,
                "token_id": token_id,
                "serial_number": serial,
                "metadata": encode(reference),
            }),
        );
    }

    pub fn set_holdings(&self, account: &str, count: u64) {
        self.account_holdings
            .lock()
            .unwrap()
            .insert(account.to_string(), count);
    }

    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn encode(reference: &str) -> String {
    STANDARD.encode(reference)
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn token(State(fake): State<Arc<Fake>>, Path(token_id): Path<String>) -> Response {
    fake.token_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(code) = *fake.token_status.lock().unwrap() {
        return (StatusCode::from_u16(code).unwrap(), "fixed status").into_response();
    }
    if take_failure(&fake.token_failures) {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    let token = fake.tokens.lock().unwrap().get(&token_id).cloned();
    match token {
        Some(token) => Json(token).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn nft(State(fake): State<Arc<Fake>>, Path((token_id, serial)): Path<(String, u64)>) -> Response {
    fake.nft_hits.fetch_add(1, Ordering::SeqCst);
    let nft = fake.nfts.lock().unwrap().get(&(token_id, serial)).cloned();
    match nft {
        Some(nft) => Json(nft).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn holders(State(fake): State<Arc<Fake>>, Path(token_id): Path<String>) -> Json<Value> {
    fake.holder_hits.fetch_add(1, Ordering::SeqCst);
    let nfts = fake
        .holders
        .lock()
        .unwrap()
        .get(&token_id)
        .cloned()
        .unwrap_or_default();
    Json(json!({ "nfts": nfts, "links": { "next": null } }))
}

async fn account_nfts(
    State(fake): State<Arc<Fake>>,
    Path(account): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    fake.account_hits.fetch_add(1, Ordering::SeqCst);
    let token_id = query.get("token.id").cloned().unwrap_or_default();
    let page: u64 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let held = fake
        .account_holdings
        .lock()
        .unwrap()
        .get(&account)
        .copied()
        .unwrap_or(0);

    let first = (page - 1) * PAGE_SIZE + 1;
    let last = (page * PAGE_SIZE).min(held);
    let nfts: Vec<Value> = (first..=last)
        .map(|serial| {
            json!({
                "account_id": account,
                "token_id": token_id,
                "serial_number": serial,
                "metadata": null,
            })
        })
        .collect();
    let next = (page * PAGE_SIZE < held).then(|| {
        format!(
            "/api/v1/accounts/{account}/nfts?token.id={token_id}&limit=100&page={}",
            page + 1
        )
    });
    Json(json!({ "nfts": nfts, "links": { "next": next } }))
}

/// `slow/...` references never answer in time, `gone/...` is a 404 and `broken/...` a 502.
async fn ipfs(State(fake): State<Arc<Fake>>, Path(path): Path<String>) -> Response {
    fake.ipfs_hits.fetch_add(1, Ordering::SeqCst);
    if path.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if path.starts_with("gone") {
        return (StatusCode::NOT_FOUND, "no link named").into_response();
    }
    if path.starts_with("broken") {
        return (StatusCode::BAD_GATEWAY, "upstream gateway").into_response();
    }
    Json(json!({ "name": path, "image": format!("ipfs://img/{path}.png") })).into_response()
}

async fn pools(State(fake): State<Arc<Fake>>) -> Response {
    fake.pool_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    if take_failure(&fake.pool_failures) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "down").into_response();
    }
    let pools = fake.pools.lock().unwrap().clone();
    Json(pools).into_response()
}

pub async fn spawn(fake: Arc<Fake>) -> String {
    let app = Router::new()
        .route("/api/v1/tokens/:token_id", get(token))
        .route("/api/v1/tokens/:token_id/nfts", get(holders))
        .route("/api/v1/tokens/:token_id/nfts/:serial", get(nft))
        .route("/api/v1/accounts/:account/nfts", get(account_nfts))
        .route("/ipfs/*path", get(ipfs))
        .route("/pools", get(pools))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn config(base: &str) -> Config {
    Config {
        port: 0,
        mirror_mainnet_url: base.to_string(),
        mirror_testnet_url: base.to_string(),
        pools_url: format!("{base}/pools"),
        username_api_url: None,
        ipfs_gateway: format!("{base}/ipfs/"),
        invocation_timeout: Duration::from_secs(10),
        metadata_margin: Duration::from_millis(300),
        http_timeout: Duration::from_secs(10),
        retry: RetryPolicy {
            attempts: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(30),
        },
    }
}

pub fn pool_json() -> Value {
    json!([{
        "id": 1,
        "contractId": "0.0.900",
        "lpToken": { "id": "0.0.901", "symbol": "SS-LP AAA/BBB" },
        "tokenA": { "id": "0.0.1", "symbol": "AAA", "decimals": 2, "icon": "/icons/a.png" },
        "tokenB": { "id": "0.0.2", "symbol": "BBB", "decimals": 0, "icon": "/icons/b.png" }
    }])
}

/// Single event envelope around a transaction.
pub fn event(rule_type: u32, network: &str, transaction: Value, nfts: Value, options: Value) -> Value {
    json!({
        "content": {
            "tokens": [],
            "nfts": nfts,
            "transaction": transaction,
        },
        "metadata": {
            "rule": { "id": "rule-1", "type": rule_type, "predicateValue": "0.0.5" },
            "network": network,
        },
        "options": options,
    })
}

pub fn transaction(status: &str, transfers: Value, token_transfers: Value, nft_transfers: Value) -> Value {
    json!({
        "transactionId": "0.0.7-1690000000-000000001",
        "consensusTimestamp": "1690000001.000000002",
        "status": status,
        "memo": "gm",
        "transfers": transfers,
        "tokenTransfers": token_transfers,
        "nftTransfers": nft_transfers,
    })
}

pub fn webhook_options() -> Value {
    json!({ "webhookUrls": "https://hooks.invalid/1" })
}
