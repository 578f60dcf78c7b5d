// src/models.rs
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const TOKEN_MINT_RULE: u32 = 1;
pub const TOKEN_TRANSFER_RULE: u32 = 3;
pub const SUCCESS_STATUS: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

/// Native currency movement, amount in tinybar (1e-8 hbar). Negative is a debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HbarTransfer {
    pub account: String,
    pub amount: i64,
    #[serde(default)]
    pub is_approval: bool,
}

/// Fungible token movement in the token's smallest unit. Negative is a debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub account: String,
    pub token_id: String,
    pub amount: i64,
    #[serde(default)]
    pub is_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransfer {
    pub token_id: String,
    pub serial_number: u64,
    #[serde(default)]
    pub sender_account_id: String,
    #[serde(default)]
    pub receiver_account_id: String,
    #[serde(default)]
    pub is_approval: bool,
}

/// All transfers belonging to one underlying transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBundle {
    #[serde(default)]
    pub transfers: Vec<HbarTransfer>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(default)]
    pub nft_transfers: Vec<NftTransfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub consensus_timestamp: String,
    #[serde(default)]
    pub parent_consensus_timestamp: Option<String>,
    pub status: String,
    #[serde(default)]
    pub memo: String,
    #[serde(flatten)]
    pub bundle: TransferBundle,
}

/// An NFT named by the event itself; mint events also carry its encoded metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNft {
    #[serde(flatten)]
    pub transfer: NftTransfer,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub tokens: Vec<TokenTransfer>,
    #[serde(default)]
    pub nfts: Vec<ContentNft>,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: u32,
    pub predicate_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub rule: Rule,
    pub network: Network,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub content: EventContent,
    pub metadata: EventMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchEvent {
    pub items: Vec<Payload>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn number_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Token as reported by the mirror. Numeric fields arrive as either strings or numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenDescriptor {
    pub token_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "number_from_any")]
    pub decimals: u64,
    #[serde(default, deserialize_with = "number_from_any")]
    pub max_supply: u64,
    #[serde(default, deserialize_with = "number_from_any")]
    pub total_supply: u64,
    #[serde(default)]
    pub treasury_account_id: String,
}

/// An NFT as held on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nft {
    #[serde(rename = "account_id", default, deserialize_with = "string_or_null")]
    pub owner_id: String,
    pub token_id: String,
    pub serial_number: u64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpToken {
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PooledToken {
    pub id: String,
    pub symbol: String,
    pub decimals: u32,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPool {
    pub contract_id: String,
    pub lp_token: LpToken,
    pub token_a: PooledToken,
    pub token_b: PooledToken,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }

    pub fn block(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }
}

/// Presentation hints handed to the delivery sink untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkOptions {
    pub webhook_urls: Vec<String>,
    pub notification_title: String,
    pub notification_username: String,
    pub notification_avatar_url: String,
    pub footer_text: String,
    pub footer_icon_url: String,
    pub embed_color: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub url: String,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub fields: Vec<Field>,
    pub images: Vec<String>,
    pub sink: SinkOptions,
}

impl Notification {
    /// Envelope for one transaction: explorer link and consensus time.
    pub fn for_transaction(
        sink: &SinkOptions,
        network: Network,
        transaction_id: &str,
        consensus_timestamp: &str,
        fields: Vec<Field>,
        images: Vec<String>,
    ) -> Self {
        Self {
            title: sink.notification_title.clone(),
            url: crate::links::transaction_link(network, transaction_id),
            timestamp: crate::links::consensus_time(consensus_timestamp),
            fields,
            images,
            sink: sink.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Notify(Vec<Notification>),
    Nothing,
    Failed { status_code: u16, message: String },
}

impl Outcome {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Outcome::Notify(notifications) => serde_json::json!({
                "kind": "data",
                "notifications": notifications,
            }),
            Outcome::Nothing => serde_json::json!({
                "kind": "data",
                "message": "Nothing to do",
            }),
            Outcome::Failed {
                status_code,
                message,
            } => serde_json::json!({
                "kind": "error",
                "statusCode": status_code,
                "message": message,
            }),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Failed { status_code, .. } => *status_code,
            _ => 200,
        }
    }
}

impl From<crate::error::Error> for Outcome {
    fn from(err: crate::error::Error) -> Self {
        Outcome::Failed {
            status_code: err.status_code(),
            message: err.to_string(),
        }
    }
}
