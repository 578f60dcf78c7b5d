//! Remaining-supply figures for mint reports.

use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::budget::TimeBudget;
use crate::error::Result;
use crate::mirror::account_nfts_path;
use crate::models::{Network, TokenDescriptor};
use crate::state::Services;

/// Below this the scan is abandoned rather than risk a partial count.
const MIN_SCAN_TIME: Duration = Duration::from_millis(2000);
/// Cached estimates are only trusted while comfortably above sell-out.
const REUSE_ABOVE: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemainingSupply {
    pub remaining: u64,
    pub total: u64,
    pub estimated: bool,
}

/// Exact figure from an authoritative descriptor. Tokens without a max supply have none.
pub fn exact_remaining(token: &TokenDescriptor) -> Option<RemainingSupply> {
    (token.max_supply > 0).then(|| RemainingSupply {
        remaining: token.max_supply.saturating_sub(token.total_supply),
        total: token.max_supply,
        estimated: false,
    })
}

fn estimate_ttl() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(25_000..=35_000))
}

/// Counts what the treasury still holds, ignoring `transferred` serials it is known to
/// have just sent out. Returns `None` on failure or when the budget runs low mid-scan.
pub async fn estimated_count_in_treasury(
    services: &Services,
    network: Network,
    token_id: &str,
    treasury_account_id: &str,
    transferred: &[u64],
    budget: &TimeBudget,
) -> Option<u64> {
    let key = (network, token_id.to_string(), treasury_account_id.to_string());

    if let Some(cached) = services.treasury_counts.get(&key).filter(|c| *c > REUSE_ABOVE) {
        let seen = transferred.len() as u64;
        let count = services
            .treasury_counts
            .update(&key, |c| *c = c.saturating_sub(seen))
            .unwrap_or(cached.saturating_sub(seen));
        debug!(count, "Using cache for estimated count");
        return Some(count);
    }

    match scan_treasury(services, network, token_id, treasury_account_id, transferred, budget).await {
        Ok(Some(count)) => {
            services.treasury_counts.insert(key, count, Some(estimate_ttl()));
            Some(count)
        }
        Ok(None) => None,
        Err(e) => {
            error!("Failed getting estimated count remaining: {}", e);
            None
        }
    }
}

async fn scan_treasury(
    services: &Services,
    network: Network,
    token_id: &str,
    treasury_account_id: &str,
    transferred: &[u64],
    budget: &TimeBudget,
) -> Result<Option<u64>> {
    let omit: HashSet<u64> = transferred.iter().copied().collect();
    let mut next = Some(account_nfts_path(treasury_account_id, token_id));
    let mut count = 0u64;

    while let Some(cursor) = next {
        let remaining = budget.remaining();
        if remaining < MIN_SCAN_TIME {
            warn!(
                "Estimated count calculation ran out of time. Time remaining: {}ms",
                remaining.as_millis()
            );
            return Ok(None);
        }
        let page = services.mirror.get_nft_page(network, &cursor).await?;
        debug!("Got account nfts: {}. Next: {:?}", page.items.len(), page.next);
        count += page
            .items
            .iter()
            .filter(|n| !omit.contains(&n.serial_number))
            .count() as u64;
        next = page.next;
    }
    Ok(Some(count))
}
