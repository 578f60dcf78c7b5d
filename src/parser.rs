// src/parser.rs
//! Caller options arrive as a flat string map. They are parsed here, once, into typed
//! structs before any pipeline logic sees them.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::SinkOptions;

const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/attachments/1014675105604980897/1014890107616104489/628e81659d36be617258642c_Logo_Mark_-_Light.png";

#[derive(Debug, Clone, PartialEq)]
pub struct TradeThresholds {
    /// Whole hbar. Zero disables the native threshold and every bundle is a trade.
    pub hbar_threshold: Decimal,
    pub token_payments: bool,
    pub nft_payments: bool,
}

impl Default for TradeThresholds {
    fn default() -> Self {
        Self {
            hbar_threshold: Decimal::from(20),
            token_payments: false,
            nft_payments: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeOptions {
    pub sink: SinkOptions,
    pub thresholds: TradeThresholds,
    pub ipfs_gateway: Option<String>,
    pub include_memo: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistToken {
    pub token_id: String,
    pub multiplier: u64,
}

#[derive(Debug, Clone)]
pub struct MintOptions {
    pub sink: SinkOptions,
    pub ipfs_gateway: Option<String>,
    /// Raw `whitelistTokens` value, doubles as the grant table cache key.
    pub whitelist_tokens: Option<String>,
    pub treasury_override: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LpSwapOptions {
    pub sink: SinkOptions,
}

struct RawOptions<'a>(&'a HashMap<String, String>);

impl RawOptions<'_> {
    fn text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn flag(&self, key: &str) -> bool {
        self.0
            .get(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

fn sink_options(raw: &RawOptions, default_title: &str) -> Result<SinkOptions> {
    let webhook_urls: Vec<String> = raw
        .text("webhookUrls")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if webhook_urls.is_empty() {
        return Err(Error::Validation(
            "webhookUrls must be specified in request".to_string(),
        ));
    }

    let embed_color = match raw.text("embedColor") {
        Some(color) => color
            .parse()
            .map_err(|_| Error::Validation(format!("embedColor is not a number: {color}")))?,
        None => 414198,
    };

    Ok(SinkOptions {
        webhook_urls,
        notification_title: raw
            .text("notificationTitle")
            .unwrap_or_else(|| default_title.to_string()),
        notification_username: raw
            .text("notificationUsername")
            .unwrap_or_else(|| "LWorks Watch Party".to_string()),
        notification_avatar_url: raw
            .text("notificationAvatarUrl")
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        footer_text: raw.text("footerText").unwrap_or_else(|| "lworks.io".to_string()),
        footer_icon_url: raw
            .text("footerIconUrl")
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        embed_color,
    })
}

pub fn parse_trade_options(options: &HashMap<String, String>) -> Result<TradeOptions> {
    let raw = RawOptions(options);
    let hbar_threshold = match raw.text("hbarThreshold") {
        Some(value) => Decimal::from_str(&value)
            .map_err(|_| Error::Validation(format!("hbarThreshold is not a number: {value}")))?,
        None => TradeThresholds::default().hbar_threshold,
    };

    Ok(TradeOptions {
        sink: sink_options(&raw, "Token Trade Report")?,
        thresholds: TradeThresholds {
            hbar_threshold,
            token_payments: raw.flag("tokenPayments"),
            nft_payments: raw.flag("nftPayments"),
        },
        ipfs_gateway: raw.text("ipfsGateways"),
        include_memo: raw.flag("includeMemo"),
    })
}

pub fn parse_mint_options(options: &HashMap<String, String>) -> Result<MintOptions> {
    let raw = RawOptions(options);
    Ok(MintOptions {
        sink: sink_options(&raw, "Another Token Minted!")?,
        ipfs_gateway: raw.text("ipfsGateways"),
        whitelist_tokens: raw.text("whitelistTokens"),
        treasury_override: raw.text("treasuryOverride"),
    })
}

pub fn parse_lp_swap_options(options: &HashMap<String, String>) -> Result<LpSwapOptions> {
    let raw = RawOptions(options);
    Ok(LpSwapOptions {
        sink: sink_options(&raw, "Token Trade Report")?,
    })
}

/// `"0.0.1:2, 0.0.2:1"` into token/multiplier pairs.
pub fn parse_whitelist_tokens(raw: &str) -> Result<Vec<WhitelistToken>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (token_id, multiplier) = entry.split_once(':').ok_or_else(|| {
                Error::Validation(format!("whitelist entry missing multiplier: {entry}"))
            })?;
            let multiplier = multiplier.trim().parse().map_err(|_| {
                Error::Validation(format!("whitelist multiplier is not a number: {entry}"))
            })?;
            Ok(WhitelistToken {
                token_id: token_id.trim().to_string(),
                multiplier,
            })
        })
        .collect()
}
