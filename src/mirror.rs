// src/mirror.rs
use futures_util::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::{Error, Result};
use crate::models::{Network, Nft, TokenDescriptor};

#[derive(Debug, Deserialize, Default)]
pub struct Links {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NftsResponse {
    #[serde(default)]
    nfts: Vec<Nft>,
    #[serde(default)]
    links: Links,
}

/// One page of a cursor-paginated list.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Read-only client for the ledger mirror REST api.
#[derive(Clone)]
pub struct MirrorClient {
    http: Client,
    mainnet_url: String,
    testnet_url: String,
    retry: RetryPolicy,
}

impl MirrorClient {
    pub fn new(http: Client, cfg: &Config) -> Self {
        Self {
            http,
            mainnet_url: cfg.mirror_mainnet_url.trim_end_matches('/').to_string(),
            testnet_url: cfg.mirror_testnet_url.trim_end_matches('/').to_string(),
            retry: cfg.retry.clone(),
        }
    }

    fn url(&self, network: Network, path: &str) -> String {
        let base = match network {
            Network::Mainnet => &self.mainnet_url,
            Network::Testnet => &self.testnet_url,
        };
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream { status, body });
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetches one entity, retrying transport failures and 5xx above 500.
    pub async fn get<T: DeserializeOwned>(&self, network: Network, path: &str) -> Result<T> {
        let url = self.url(network, path);
        let mut attempt = 1;
        loop {
            debug!("📡 GET {}", url);
            match self.get_once(&url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    warn!("{} on attempt {}. Retrying...", e, attempt);
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`get`](Self::get) but any failure yields `default`.
    pub async fn safe_get<T: DeserializeOwned>(&self, network: Network, path: &str, default: T) -> T {
        match self.get(network, path).await {
            Ok(value) => value,
            Err(e) => {
                error!("Swallowing error from mirror for {}: {}", path, e);
                default
            }
        }
    }

    pub async fn get_nft_page(&self, network: Network, path_or_cursor: &str) -> Result<Page<Nft>> {
        let resp: NftsResponse = self.get(network, path_or_cursor).await?;
        Ok(Page {
            items: resp.nfts,
            next: resp.links.next.filter(|n| !n.is_empty()),
        })
    }

    /// Follows `links.next` until the mirror stops returning one.
    pub async fn get_all_nfts(&self, network: Network, path: &str) -> Result<Vec<Nft>> {
        let mut nfts = Vec::new();
        let mut next = Some(path.to_string());
        while let Some(cursor) = next {
            let page = self.get_nft_page(network, &cursor).await?;
            nfts.extend(page.items);
            next = page.next;
        }
        Ok(nfts)
    }

    pub async fn get_token(&self, network: Network, token_id: &str) -> Option<TokenDescriptor> {
        self.safe_get(network, &format!("api/v1/tokens/{token_id}"), None)
            .await
    }

    /// All-or-nothing: a single failed lookup yields an empty list.
    pub async fn get_nfts(&self, network: Network, wanted: &[(String, u64)]) -> Vec<Nft> {
        let lookups = wanted.iter().map(|(token_id, serial)| async move {
            let path = format!("api/v1/tokens/{token_id}/nfts/{serial}");
            self.get::<Nft>(network, &path).await
        });
        match join_all(lookups).await.into_iter().collect::<Result<Vec<_>>>() {
            Ok(nfts) => {
                debug!("Loaded {} nfts", nfts.len());
                nfts
            }
            Err(e) => {
                error!("Failed to load nfts: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_nft_holders(&self, network: Network, token_id: &str) -> Result<Vec<Nft>> {
        self.get_all_nfts(network, &format!("api/v1/tokens/{token_id}/nfts?limit=100"))
            .await
    }

    pub async fn get_account_nfts(
        &self,
        network: Network,
        account_id: &str,
        token_id: &str,
    ) -> Result<Vec<Nft>> {
        self.get_all_nfts(network, &account_nfts_path(account_id, token_id))
            .await
    }
}

pub fn account_nfts_path(account_id: &str, token_id: &str) -> String {
    format!("api/v1/accounts/{account_id}/nfts?token.id={token_id}&limit=100")
}
