//! Resolves NFT metadata references (base64 encoded `ipfs://` uris, usually) to the json
//! documents they point at. Resolution is best effort: every input yields an output, in
//! input order, and anything that fails or runs past the cutoff comes back empty.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::budget::TimeBudget;
use crate::models::Nft;

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedNft {
    pub nft: Nft,
    pub metadata: NftMetadata,
}

impl LoadedNft {
    fn empty(nft: Nft) -> Self {
        Self {
            nft,
            metadata: NftMetadata::default(),
        }
    }
}

/// Rewrites the first `ipfs://` in `uri` onto `gateway`.
pub fn remap_ipfs(uri: &str, gateway: &str) -> String {
    uri.replacen(IPFS_SCHEME, gateway, 1)
}

/// Remapped and url-normalized image link, as handed to the sink.
pub fn image_url(image: &str, gateway: &str) -> String {
    let remapped = remap_ipfs(image, gateway);
    match reqwest::Url::parse(&remapped) {
        Ok(url) => url.to_string(),
        Err(_) => remapped,
    }
}

fn decode_reference(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    let text: String = String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[derive(Clone)]
pub struct MetadataResolver {
    http: Client,
    margin: Duration,
}

impl MetadataResolver {
    pub fn new(http: Client, margin: Duration) -> Self {
        Self { http, margin }
    }

    async fn resolve_one(&self, nft: &Nft, gateway: &str) -> Option<NftMetadata> {
        let Some(reference) = decode_reference(&nft.metadata) else {
            info!(
                "Failed to find base64 encoded metadata in nft. {} #{}. {}",
                nft.token_id, nft.serial_number, nft.metadata
            );
            return None;
        };
        let url = remap_ipfs(&reference, gateway);
        debug!("Loading metadata: {}", url);

        let resp = match self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(gateway, "Failed loading metadata {}: {}", url, e);
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(gateway, "Received {} from ipfs {}: {}", status, url, body);
            return None;
        }
        match resp.json::<NftMetadata>().await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(gateway, "Undecodable metadata at {}: {}", url, e);
                None
            }
        }
    }

    /// Resolves all items concurrently. Everything still pending at
    /// `budget.deadline - margin` is abandoned and reported as empty metadata.
    pub async fn resolve_all(&self, nfts: Vec<Nft>, gateway: &str, budget: &TimeBudget) -> Vec<LoadedNft> {
        let cutoff = budget.cutoff(self.margin);
        let loads = nfts.into_iter().map(|nft| async move {
            match timeout_at(cutoff, self.resolve_one(&nft, gateway)).await {
                Ok(Some(metadata)) => LoadedNft { nft, metadata },
                Ok(None) => LoadedNft::empty(nft),
                Err(_) => {
                    warn!(
                        gateway,
                        time_remaining_ms = budget.remaining().as_millis() as u64,
                        "Failed to load ipfs metadata in time for {} #{}",
                        nft.token_id,
                        nft.serial_number
                    );
                    LoadedNft::empty(nft)
                }
            }
        });
        let loaded = join_all(loads).await;
        debug!(
            "Loaded nft metadata: {:?}",
            loaded
                .iter()
                .map(|l| (&l.nft.token_id, l.nft.serial_number, l.metadata.image.as_deref()))
                .collect::<Vec<_>>()
        );
        loaded
    }
}
