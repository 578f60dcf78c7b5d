use chrono::{DateTime, Utc};

use crate::models::{Field, Network};

pub const EXPLORE_BASE_URL: &str = "https://hashscan.io";
pub const POOL_ANALYTICS_URL: &str = "https://analytics.saucerswap.finance/pool";
pub const POOL_ICON_BASE_URL: &str = "https://www.saucerswap.finance";

pub fn wallet_link(network: Network, wallet: &str) -> String {
    format!("{EXPLORE_BASE_URL}/{network}/account/{wallet}")
}

pub fn token_link(network: Network, token_id: &str) -> String {
    format!("{EXPLORE_BASE_URL}/{network}/token/{token_id}")
}

pub fn nft_link(network: Network, token_id: &str, serial: u64) -> String {
    format!("{EXPLORE_BASE_URL}/{network}/token/{token_id}/{serial}")
}

pub fn pool_link(contract_id: &str) -> String {
    format!("{POOL_ANALYTICS_URL}/{contract_id}")
}

/// `0.0.123-1690000000-000000001` (or `0.0.123@1690000000.000000001`) to an explorer url.
/// Malformed ids link to `#`.
pub fn transaction_link(network: Network, transaction_id: &str) -> String {
    let parts: Vec<&str> = transaction_id
        .split(|c| matches!(c, '@' | '-' | '.'))
        .collect();
    match parts.as_slice() {
        [shard, realm, account, secs, nanos, ..]
            if [shard, realm, account, secs, nanos].iter().all(|p| !p.is_empty()) =>
        {
            format!("{EXPLORE_BASE_URL}/{network}/transaction/{shard}.{realm}.{account}@{secs}.{nanos}")
        }
        _ => "#".to_string(),
    }
}

/// `seconds.nanos` consensus timestamps.
pub fn consensus_time(timestamp: &str) -> Option<DateTime<Utc>> {
    let (secs, nanos) = timestamp.split_once('.').unwrap_or((timestamp, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{nanos:0<9}").get(..9)?.parse().ok()?;
    DateTime::from_timestamp(secs, nanos)
}

pub fn embed_link(text: impl std::fmt::Display, link: &str) -> String {
    format!("[{text}]({link})")
}

/// Prefers the symbol unless it looks like a url, then the name, then the raw id.
pub fn embed_token_link(
    network: Network,
    token_id: &str,
    name: Option<&str>,
    symbol: Option<&str>,
) -> String {
    let link = token_link(network, token_id);
    match (symbol, name) {
        (Some(symbol), _) if !symbol.is_empty() && !symbol.contains("://") => embed_link(symbol, &link),
        (_, Some(name)) if !name.is_empty() => embed_link(name, &link),
        _ => embed_link(token_id, &link),
    }
}

pub fn embed_nft_link(network: Network, token_id: &str, serial: u64) -> String {
    embed_link(serial, &nft_link(network, token_id, serial))
}

pub fn embed_wallet_link(network: Network, wallet: &str, username: Option<&str>) -> String {
    embed_link(username.unwrap_or(wallet), &wallet_link(network, wallet))
}

/// Pads with blank inline fields so a group fills rows of three.
pub fn group_inline_fields(mut fields: Vec<Field>) -> Vec<Field> {
    let padding = (3 - fields.len() % 3) % 3;
    fields.extend((0..padding).map(|_| Field::inline("\u{200b}", "\u{200b}")));
    fields
}
