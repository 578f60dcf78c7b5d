//! Mint reports.
//!
//! A mint rule names the minted NFTs directly. A transfer rule has to infer them: only NFTs
//! sent out of the token's treasury count as minted. Supply and whitelist figures are
//! gathered alongside metadata and each is dropped from the report if it can't be computed.

use tracing::{debug, info, warn};

use crate::budget::Invocation;
use crate::error::{Error, Result};
use crate::links::{embed_nft_link, embed_token_link, embed_wallet_link};
use crate::metadata::{image_url, LoadedNft};
use crate::models::{
    ContentNft, Event, Field, Network, Nft, Notification, Outcome, Payload, TokenDescriptor,
    SUCCESS_STATUS, TOKEN_MINT_RULE, TOKEN_TRANSFER_RULE,
};
use crate::parser::{parse_mint_options, MintOptions};
use crate::state::Services;
use crate::supply::{estimated_count_in_treasury, exact_remaining, RemainingSupply};
use crate::whitelist::{whitelist_remaining, WhitelistBalance};

const MAX_IMAGES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MintDetails {
    pub remaining_nfts: Option<RemainingSupply>,
    pub wallet_whitelist: Option<WhitelistBalance>,
}

#[derive(Debug, Clone)]
pub struct MintReport {
    pub loaded_nfts: Vec<LoadedNft>,
    pub token: Option<TokenDescriptor>,
    pub details: MintDetails,
}

fn as_owned_nft(nft: &ContentNft) -> Nft {
    Nft {
        owner_id: nft.transfer.receiver_account_id.clone(),
        token_id: nft.transfer.token_id.clone(),
        serial_number: nft.transfer.serial_number,
        metadata: nft.metadata.clone().unwrap_or_default(),
    }
}

async fn enrich_direct_mint(
    services: &Services,
    invocation: &Invocation,
    payload: &Payload,
    options: &MintOptions,
    gateway: &str,
) -> Option<MintReport> {
    debug!("Handling token mint transaction");
    let network = payload.metadata.network;
    let token_id = &payload.metadata.rule.predicate_value;
    let nfts = &payload.content.nfts;
    if nfts.is_empty() {
        info!("Mint event carried no nfts");
        return None;
    }

    // supply moves with every mint, so this one skips the descriptor cache
    let (token, loaded_nfts, wallet_whitelist) = tokio::join!(
        services.mirror.get_token(network, token_id),
        services.metadata.resolve_all(
            nfts.iter().map(as_owned_nft).collect(),
            gateway,
            &invocation.budget
        ),
        whitelist_remaining(services, options, network, token_id, nfts),
    );

    let details = MintDetails {
        remaining_nfts: token.as_ref().and_then(exact_remaining),
        wallet_whitelist,
    };
    Some(MintReport {
        loaded_nfts,
        token,
        details,
    })
}

async fn enrich_transfer_mint(
    services: &Services,
    invocation: &Invocation,
    payload: &Payload,
    options: &MintOptions,
    gateway: &str,
) -> Result<Option<MintReport>> {
    debug!("Handling token transfer transaction");
    let network = payload.metadata.network;
    let token_id = &payload.metadata.rule.predicate_value;
    let token = services.cached_token(network, token_id).await?;

    let treasury = options
        .treasury_override
        .as_deref()
        .unwrap_or(token.treasury_account_id.as_str());
    let minted: Vec<&ContentNft> = payload
        .content
        .nfts
        .iter()
        .filter(|n| n.transfer.sender_account_id == treasury)
        .collect();
    if minted.is_empty() {
        debug!("No nfts sent from treasury account: {}", treasury);
        return Ok(None);
    }

    let wanted: Vec<(String, u64)> = minted
        .iter()
        .map(|n| (n.transfer.token_id.clone(), n.transfer.serial_number))
        .collect();
    let mut mirror_nfts = services.mirror.get_nfts(network, &wanted).await;
    if mirror_nfts.is_empty() {
        warn!("Mirror did not return the minted nfts, reporting without metadata");
        mirror_nfts = minted.iter().map(|n| as_owned_nft(n)).collect();
    }

    let serials: Vec<u64> = minted.iter().map(|n| n.transfer.serial_number).collect();
    let (loaded_nfts, estimated, wallet_whitelist) = tokio::join!(
        services.metadata.resolve_all(mirror_nfts, gateway, &invocation.budget),
        estimated_count_in_treasury(services, network, token_id, treasury, &serials, &invocation.budget),
        whitelist_remaining(services, options, network, token_id, &payload.content.nfts),
    );

    let remaining_nfts = estimated.map(|remaining| {
        debug!("Loaded estimated count in treasury: {}", remaining);
        RemainingSupply {
            remaining,
            total: token.max_supply,
            estimated: true,
        }
    });
    Ok(Some(MintReport {
        loaded_nfts,
        token: Some(token.clone()),
        details: MintDetails {
            remaining_nfts,
            wallet_whitelist,
        },
    }))
}

/// Gathers everything a mint report needs. `Ok(None)` means there is nothing to report.
pub async fn enrich(
    services: &Services,
    invocation: &Invocation,
    payload: &Payload,
    options: &MintOptions,
    gateway: &str,
) -> Result<Option<MintReport>> {
    match payload.metadata.rule.rule_type {
        TOKEN_MINT_RULE => Ok(enrich_direct_mint(services, invocation, payload, options, gateway).await),
        TOKEN_TRANSFER_RULE => enrich_transfer_mint(services, invocation, payload, options, gateway).await,
        other => {
            warn!("Unknown transaction type: {}", other);
            Err(Error::UnknownRuleType(other))
        }
    }
}

fn report_fields(network: Network, report: &MintReport, username: Option<&str>) -> Vec<Field> {
    let Some(first) = report.loaded_nfts.first() else {
        return Vec::new();
    };
    let token_id = &first.nft.token_id;
    let serials: Vec<String> = report
        .loaded_nfts
        .iter()
        .map(|n| embed_nft_link(network, token_id, n.nft.serial_number))
        .collect();
    let token_name = if report.loaded_nfts.len() > 1 { "Tokens" } else { "Token" };

    let mut fields = vec![
        Field::inline("Wallet", embed_wallet_link(network, &first.nft.owner_id, username)),
        Field::inline(
            token_name,
            format!(
                "{} # {}",
                embed_token_link(
                    network,
                    token_id,
                    report.token.as_ref().map(|t| t.name.as_str()),
                    report.token.as_ref().map(|t| t.symbol.as_str()),
                ),
                serials.join(", ")
            ),
        ),
    ];

    if let Some(wl) = report.details.wallet_whitelist {
        fields.push(Field::block("WL Balance", format!("{} / {}", wl.remaining, wl.total)));
    }
    if let Some(supply) = report.details.remaining_nfts {
        let name = if supply.estimated {
            "Estimated Remaining"
        } else {
            "Remaining Supply"
        };
        fields.push(Field::block(name, format!("{} / {}", supply.remaining, supply.total)));
    }
    fields
}

fn report_images(report: &MintReport, gateway: &str) -> Vec<String> {
    report
        .loaded_nfts
        .iter()
        .filter_map(|n| n.metadata.image.as_deref())
        .take(MAX_IMAGES)
        .map(|image| image_url(image, gateway))
        .collect()
}

pub async fn handle(services: &Services, invocation: &Invocation, event: Event) -> Result<Outcome> {
    let Event { payload, options } = event;
    let transaction = &payload.content.transaction;
    info!(
        "Handling transaction: {} with status {} for rule {}",
        transaction.transaction_id, transaction.status, payload.metadata.rule.id
    );

    let options = parse_mint_options(&options)?;
    if transaction.status != SUCCESS_STATUS {
        return Ok(Outcome::Nothing);
    }

    let gateway = services.ipfs_gateway(options.ipfs_gateway.as_deref());
    let Some(report) = enrich(services, invocation, &payload, &options, &gateway).await? else {
        return Ok(Outcome::Nothing);
    };

    let network = payload.metadata.network;
    let username = match report.loaded_nfts.first() {
        Some(first) => services.names.lookup(network, &first.nft.owner_id).await,
        None => None,
    };
    let fields = report_fields(network, &report, username.as_deref());
    if fields.is_empty() {
        return Ok(Outcome::Nothing);
    }

    info!(
        remaining = ?report.details.remaining_nfts,
        whitelist = ?report.details.wallet_whitelist,
        "🪙 Mint report for {} nfts",
        report.loaded_nfts.len()
    );
    Ok(Outcome::Notify(vec![Notification::for_transaction(
        &options.sink,
        network,
        &transaction.transaction_id,
        &transaction.consensus_timestamp,
        fields,
        report_images(&report, &gateway),
    )]))
}
