use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::{ContentNft, Network};
use crate::parser::{parse_whitelist_tokens, MintOptions};
use crate::state::{GrantTable, Services};

const TESTNET_GRANT_ACCOUNT: &str = "0.0.1193921";
const TESTNET_GRANT: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WhitelistBalance {
    pub remaining: u64,
    pub total: u64,
}

/// Grants per account: every held NFT of a whitelist token is worth its multiplier.
/// Computed once per distinct `whitelistTokens` value.
pub async fn load_grants(services: &Services, options: &MintOptions, network: Network) -> Option<GrantTable> {
    if network == Network::Testnet {
        return Some(Arc::new(HashMap::from([(
            TESTNET_GRANT_ACCOUNT.to_string(),
            TESTNET_GRANT,
        )])));
    }

    let raw = options.whitelist_tokens.as_deref()?;
    if let Some(grants) = services.whitelist_grants.get(&raw.to_string()) {
        return Some(grants);
    }

    let loaded = async {
        let tokens = parse_whitelist_tokens(raw)?;
        let holders = try_join_all(tokens.iter().map(|wl| async move {
            let holders = services.mirror.get_nft_holders(network, &wl.token_id).await?;
            Ok::<_, crate::error::Error>((wl.multiplier, holders))
        }))
        .await?;

        let mut grants: HashMap<String, u64> = HashMap::new();
        for (multiplier, nfts) in holders {
            for nft in nfts {
                *grants.entry(nft.owner_id).or_default() += multiplier;
            }
        }
        Ok::<_, crate::error::Error>(Arc::new(grants))
    }
    .await;

    match loaded {
        Ok(grants) => {
            debug!("Loaded whitelist grants for {} accounts", grants.len());
            services.whitelist_grants.insert(raw.to_string(), Arc::clone(&grants), None);
            Some(grants)
        }
        Err(e) => {
            error!(whitelist_tokens = raw, "Failed getting holders: {}", e);
            None
        }
    }
}

/// Holdings count for `account_id`, plus serials from this event the mirror has not
/// caught up with yet.
async fn owned_count(
    services: &Services,
    network: Network,
    account_id: &str,
    token_id: &str,
    event_serials: &[u64],
) -> Option<u64> {
    match services.mirror.get_account_nfts(network, account_id, token_id).await {
        Ok(held) => {
            let mut unknown: HashSet<u64> = event_serials.iter().copied().collect();
            for nft in &held {
                unknown.remove(&nft.serial_number);
            }
            Some((held.len() + unknown.len()) as u64)
        }
        Err(e) => {
            error!(account_id, token_id, "Failed getting account NFT count: {}", e);
            None
        }
    }
}

pub async fn whitelist_remaining(
    services: &Services,
    options: &MintOptions,
    network: Network,
    token_id: &str,
    nfts: &[ContentNft],
) -> Option<WhitelistBalance> {
    let receiver = nfts
        .iter()
        .find(|n| n.transfer.token_id == token_id && !n.transfer.receiver_account_id.is_empty())
        .map(|n| n.transfer.receiver_account_id.as_str())?;

    let grants = load_grants(services, options, network).await?;
    let total = grants.get(receiver).copied().filter(|g| *g > 0)?;

    let serials: Vec<u64> = nfts.iter().map(|n| n.transfer.serial_number).collect();
    let owned = owned_count(services, network, receiver, token_id, &serials).await?;
    Some(WhitelistBalance {
        remaining: total.saturating_sub(owned),
        total,
    })
}
