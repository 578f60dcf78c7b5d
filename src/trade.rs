use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::budget::Invocation;
use crate::classifier::is_qualifying_trade;
use crate::error::{Error, Result};
use crate::links::group_inline_fields;
use crate::metadata::image_url;
use crate::models::{
    Event, Field, Notification, Outcome, TransferBundle, SUCCESS_STATUS, TOKEN_TRANSFER_RULE,
};
use crate::parser::parse_trade_options;
use crate::state::Services;
use crate::wallet::wallet_fields;

const MAX_IMAGES: usize = 4;

fn push_unique<'a>(wallets: &mut Vec<&'a str>, wallet: &'a str) {
    if !wallet.is_empty() && !wallets.contains(&wallet) {
        wallets.push(wallet);
    }
}

/// Accounts that received the rule token, then accounts that gave it up without also
/// receiving it. Both in encounter order.
pub fn trade_parties<'a>(token_id: &str, bundle: &'a TransferBundle) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut receivers = Vec::new();
    for t in bundle.token_transfers.iter().filter(|t| t.token_id == token_id && t.amount > 0) {
        push_unique(&mut receivers, &t.account);
    }
    for t in bundle.nft_transfers.iter().filter(|t| t.token_id == token_id) {
        push_unique(&mut receivers, &t.receiver_account_id);
    }

    let mut senders = Vec::new();
    for t in bundle.token_transfers.iter().filter(|t| t.token_id == token_id && t.amount < 0) {
        push_unique(&mut senders, &t.account);
    }
    for t in bundle.nft_transfers.iter().filter(|t| t.token_id == token_id) {
        push_unique(&mut senders, &t.sender_account_id);
    }
    senders.retain(|s| !receivers.contains(s));
    (receivers, senders)
}

fn involved_tokens(bundle: &TransferBundle) -> Vec<&str> {
    let mut ids = Vec::new();
    let token_ids = bundle.token_transfers.iter().map(|t| t.token_id.as_str());
    let nft_ids = bundle.nft_transfers.iter().map(|t| t.token_id.as_str());
    for id in token_ids.chain(nft_ids) {
        push_unique(&mut ids, id);
    }
    ids
}

pub async fn handle(services: &Services, invocation: &Invocation, event: Event) -> Result<Outcome> {
    let Event { payload, options } = event;
    let transaction = &payload.content.transaction;
    let rule = &payload.metadata.rule;
    let network = payload.metadata.network;
    info!(
        "Handling transaction: {} with status {} for rule {}",
        transaction.transaction_id, transaction.status, rule.id
    );

    let options = parse_trade_options(&options)?;
    debug!(thresholds = ?options.thresholds, "Trade options");
    if transaction.status != SUCCESS_STATUS {
        return Ok(Outcome::Nothing);
    }
    if rule.rule_type != TOKEN_TRANSFER_RULE {
        warn!("Unknown transaction type: {}", rule.rule_type);
        return Err(Error::UnknownRuleType(rule.rule_type));
    }

    let token_id = rule.predicate_value.as_str();
    let bundle = &transaction.bundle;
    let (receivers, senders) = trade_parties(token_id, bundle);
    let receiver_set: HashSet<&str> = receivers.iter().copied().collect();
    if !is_qualifying_trade(&options.thresholds, bundle, &receiver_set) {
        info!("The receiver account did not pay anything for this transaction. Skipping.");
        return Ok(Outcome::Nothing);
    }

    let wanted: Vec<(String, u64)> = bundle
        .nft_transfers
        .iter()
        .filter(|t| t.token_id == token_id)
        .map(|t| (t.token_id.clone(), t.serial_number))
        .collect();
    let token_ids = involved_tokens(bundle);
    let (tokens, nfts) = tokio::join!(
        join_all(token_ids.iter().map(|id| services.cached_token(network, id))),
        services.mirror.get_nfts(network, &wanted),
    );
    let tokens: HashMap<String, _> = tokens
        .into_iter()
        .filter_map(|t| t.ok())
        .map(|t| (t.token_id.clone(), t))
        .collect();

    let gateway = services.ipfs_gateway(options.ipfs_gateway.as_deref());
    let loaded = if nfts.is_empty() {
        Vec::new()
    } else {
        services
            .metadata
            .resolve_all(nfts, &gateway, &invocation.budget)
            .await
    };

    let wallets = receivers.iter().chain(senders.iter());
    let mut fields: Vec<Field> = join_all(
        wallets.map(|wallet| wallet_fields(services, network, wallet, bundle, &tokens)),
    )
    .await
    .into_iter()
    .flat_map(group_inline_fields)
    .collect();

    if options.include_memo && !transaction.memo.is_empty() {
        fields.push(Field::block("Memo", transaction.memo.clone()));
    }

    let images: Vec<String> = loaded
        .iter()
        .filter_map(|n| n.metadata.image.as_deref())
        .take(MAX_IMAGES)
        .map(|image| image_url(image, &gateway))
        .collect();

    info!("💱 Trade report with {} wallets", receivers.len() + senders.len());
    Ok(Outcome::Notify(vec![Notification::for_transaction(
        &options.sink,
        network,
        &transaction.transaction_id,
        &transaction.consensus_timestamp,
        fields,
        images,
    )]))
}
