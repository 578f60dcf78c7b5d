use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::MetadataResolver;
use crate::mirror::MirrorClient;
use crate::models::{Network, TokenDescriptor};
use crate::pools::PoolDirectory;
use crate::usernames::NameDirectory;

pub type GrantTable = Arc<HashMap<String, u64>>;

/// Clients and process-wide caches shared by every invocation.
pub struct Services {
    pub config: Config,
    pub mirror: MirrorClient,
    pub metadata: MetadataResolver,
    pub pools: PoolDirectory,
    pub names: NameDirectory,
    /// Never evicts. Supply figures in here go stale; direct mints refetch instead.
    pub tokens: TtlCache<(Network, String), TokenDescriptor>,
    /// Estimated NFTs left in a treasury, keyed by (network, token, treasury).
    pub treasury_counts: TtlCache<(Network, String, String), u64>,
    /// Whitelist grants keyed by the raw `whitelistTokens` option.
    pub whitelist_grants: TtlCache<String, GrantTable>,
}

impl Services {
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            mirror: MirrorClient::new(http.clone(), &config),
            metadata: MetadataResolver::new(http.clone(), config.metadata_margin),
            pools: PoolDirectory::new(http.clone(), config.pools_url.clone()),
            names: NameDirectory::new(http, config.username_api_url.clone()),
            tokens: TtlCache::new(),
            treasury_counts: TtlCache::new(),
            whitelist_grants: TtlCache::new(),
            config,
        })
    }

    /// Token descriptor from the process cache, loading it on first use.
    pub async fn cached_token(&self, network: Network, token_id: &str) -> Result<TokenDescriptor> {
        let key = (network, token_id.to_string());
        self.tokens
            .get_or_try_load(key, None, || async {
                debug!("Token cache miss for {}", token_id);
                self.mirror
                    .get_token(network, token_id)
                    .await
                    .ok_or_else(|| Error::TokenUnavailable {
                        network: network.to_string(),
                        token_id: token_id.to_string(),
                    })
            })
            .await
    }

    /// Per-invocation gateway: the caller's override, else the configured default.
    pub fn ipfs_gateway(&self, override_gateway: Option<&str>) -> String {
        override_gateway
            .map(str::to_string)
            .unwrap_or_else(|| self.config.ipfs_gateway.clone())
    }
}
