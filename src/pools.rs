use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::CoalescingLoader;
use crate::error::{Error, Result};
use crate::models::LiquidityPool;

type PoolMap = Arc<HashMap<String, LiquidityPool>>;

/// Known DEX liquidity pools keyed by contract id. The whole directory is fetched once per
/// process; a failed fetch is retried by the next lookup.
pub struct PoolDirectory {
    http: Client,
    url: String,
    pools: CoalescingLoader<String, PoolMap>,
}

impl PoolDirectory {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            pools: CoalescingLoader::new(),
        }
    }

    async fn fetch(http: Client, url: String) -> Result<PoolMap> {
        info!("🌊 Loading liquidity pools from {}", url);
        let resp = http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::PoolDirectory(format!("received {status}: {body}")));
        }
        let pools: Vec<LiquidityPool> = serde_json::from_str(&resp.text().await?)?;
        info!("Loaded {} liquidity pools", pools.len());
        Ok(Arc::new(
            pools
                .into_iter()
                .map(|pool| (pool.contract_id.clone(), pool))
                .collect(),
        ))
    }

    /// `None` both for unknown addresses and when the directory could not be loaded.
    pub async fn lookup(&self, address: &str) -> Option<LiquidityPool> {
        let (http, url) = (self.http.clone(), self.url.clone());
        match self
            .pools
            .get_or_load(self.url.clone(), move || Self::fetch(http, url))
            .await
        {
            Ok(pools) => {
                let pool = pools.get(address).cloned();
                debug!(address, found = pool.is_some(), "Pool lookup");
                pool
            }
            Err(e) => {
                error!("Error loading liquidity pool data: {}", e);
                None
            }
        }
    }
}
