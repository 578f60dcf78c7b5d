use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::budget::Invocation;
use crate::amounts::apply_decimals;
use crate::error::{Error, Result};
use crate::links::{embed_link, group_inline_fields, pool_link, token_link, POOL_ICON_BASE_URL};
use crate::models::{
    BatchEvent, Field, LiquidityPool, Network, Notification, Outcome, Payload, TokenTransfer,
    SUCCESS_STATUS, TOKEN_TRANSFER_RULE,
};
use crate::parser::parse_lp_swap_options;
use crate::state::Services;

const MAX_IMAGES: usize = 4;

/// Net movement of both pool assets across a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolNetflow {
    pub pool: LiquidityPool,
    pub token_a_amount: i128,
    pub token_b_amount: i128,
}

/// Sums each pool's signed asset movements, keeping pools in first-seen order.
/// Pools whose assets both net to zero are dropped.
pub fn net_by_pool<'a>(swaps: impl IntoIterator<Item = (&'a TokenTransfer, &'a LiquidityPool)>) -> Vec<PoolNetflow> {
    let mut netflows: Vec<PoolNetflow> = Vec::new();
    for (transfer, pool) in swaps {
        let idx = match netflows.iter().position(|n| n.pool.contract_id == transfer.account) {
            Some(idx) => idx,
            None => {
                netflows.push(PoolNetflow {
                    pool: pool.clone(),
                    token_a_amount: 0,
                    token_b_amount: 0,
                });
                netflows.len() - 1
            }
        };
        let netflow = &mut netflows[idx];
        if netflow.pool.token_a.id == transfer.token_id {
            netflow.token_a_amount += i128::from(transfer.amount);
        }
        if netflow.pool.token_b.id == transfer.token_id {
            netflow.token_b_amount += i128::from(transfer.amount);
        }
    }
    netflows.retain(|n| n.token_a_amount != 0 || n.token_b_amount != 0);
    netflows
}

/// `LP` and `Gains`/`Losses` for one pool, padded to a row. The label follows tokenA.
pub fn pool_fields(network: Network, netflow: &PoolNetflow) -> Vec<Field> {
    let pool = &netflow.pool;
    let is_loss = netflow.token_a_amount < 0;
    let factor = if is_loss { -1 } else { 1 };
    let line = |amount: i128, token: &crate::models::PooledToken| {
        format!(
            "{} {}",
            apply_decimals(amount, token.decimals, factor),
            embed_link(&token.symbol, &token_link(network, &token.id))
        )
    };
    group_inline_fields(vec![
        Field::inline("LP", embed_link(&pool.lp_token.symbol, &pool_link(&pool.contract_id))),
        Field::inline(
            if is_loss { "Losses" } else { "Gains" },
            [
                line(netflow.token_a_amount, &pool.token_a),
                line(netflow.token_b_amount, &pool.token_b),
            ]
            .join("\n"),
        ),
    ])
}

fn pool_icons<'a>(pools: impl IntoIterator<Item = &'a LiquidityPool>) -> Vec<String> {
    let mut icons: Vec<String> = Vec::new();
    for pool in pools {
        for icon in [&pool.token_a.icon, &pool.token_b.icon].into_iter().flatten() {
            let url = format!("{POOL_ICON_BASE_URL}{icon}");
            if !icons.contains(&url) {
                icons.push(url);
            }
        }
    }
    icons.truncate(MAX_IMAGES);
    icons
}

/// Successful items sharing a transaction id, in the order ids were first seen.
fn group_by_transaction(items: &[Payload]) -> Vec<(&str, Vec<&Payload>)> {
    let mut groups: Vec<(&str, Vec<&Payload>)> = Vec::new();
    for item in items.iter().filter(|i| i.content.transaction.status == SUCCESS_STATUS) {
        let id = item.content.transaction.transaction_id.as_str();
        match groups.iter_mut().find(|(tx, _)| *tx == id) {
            Some((_, group)) => group.push(item),
            None => groups.push((id, vec![item])),
        }
    }
    groups
}

async fn report_transaction(
    services: &Services,
    sink: &crate::models::SinkOptions,
    transaction_id: &str,
    items: &[&Payload],
) -> Result<Option<Notification>> {
    let first = items[0];
    let metadata = &first.metadata;
    let transaction = &first.content.transaction;
    info!(
        "Handling transaction: {} with status {} for rule {}",
        transaction_id, transaction.status, metadata.rule.id
    );
    if metadata.rule.rule_type != TOKEN_TRANSFER_RULE {
        warn!("Unknown transaction type: {}", metadata.rule.rule_type);
        return Err(Error::UnknownRuleType(metadata.rule.rule_type));
    }

    let transfers: Vec<&TokenTransfer> = items
        .iter()
        .flat_map(|i| i.content.tokens.iter())
        .collect();
    let pools = join_all(transfers.iter().map(|t| services.pools.lookup(&t.account))).await;
    let swaps: Vec<(&TokenTransfer, LiquidityPool)> = transfers
        .into_iter()
        .zip(pools)
        .filter_map(|(t, pool)| pool.map(|p| (t, p)))
        .collect();

    let network = metadata.network;
    let fields: Vec<Field> = net_by_pool(swaps.iter().map(|(t, p)| (*t, p)))
        .iter()
        .flat_map(|n| pool_fields(network, n))
        .collect();
    if fields.is_empty() {
        debug!("No pool movement in {}", transaction_id);
        return Ok(None);
    }

    let timestamp = transaction
        .parent_consensus_timestamp
        .as_deref()
        .unwrap_or(&transaction.consensus_timestamp);
    Ok(Some(Notification::for_transaction(
        sink,
        network,
        transaction_id,
        timestamp,
        fields,
        pool_icons(swaps.iter().map(|(_, p)| p)),
    )))
}

/// One notification per transaction id with pool movement, in first-seen order.
pub async fn handle(services: &Services, invocation: &Invocation, batch: BatchEvent) -> Result<Outcome> {
    let options = parse_lp_swap_options(&batch.options)?;

    let mut notifications = Vec::new();
    for (transaction_id, items) in group_by_transaction(&batch.items) {
        let started = Instant::now();
        let result = report_transaction(services, &options.sink, transaction_id, &items).await;
        debug!(
            invocation = invocation.id,
            transaction_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Finished handling transaction"
        );
        if let Some(notification) = result? {
            notifications.push(notification);
        }
    }

    info!("🌊 {} lp swap reports", notifications.len());
    if notifications.is_empty() {
        return Ok(Outcome::Nothing);
    }
    Ok(Outcome::Notify(notifications))
}
