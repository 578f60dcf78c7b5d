use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::models::Network;

/// `.hbar` names minted from this token are not shown.
const HIDDEN_NAME_TOKEN: &str = "0.0.1234197";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Username {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    token_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    username: Option<Username>,
}

fn display_name(profile: Option<UserProfile>) -> Option<String> {
    let username = profile?.username?;
    let name = username.name.filter(|n| !n.is_empty())?;
    if username.token_id.as_deref() == Some(HIDDEN_NAME_TOKEN) {
        debug!("Hiding .hbar name token");
        return None;
    }
    Some(name)
}

/// Wallet id to display name, answers (including "no name") cached for the process.
pub struct NameDirectory {
    http: Client,
    url: Option<String>,
    names: TtlCache<(Network, String), Option<String>>,
}

impl NameDirectory {
    pub fn new(http: Client, url: Option<String>) -> Self {
        Self {
            http,
            url,
            names: TtlCache::new(),
        }
    }

    async fn fetch(&self, url: &str, network: Network, account_id: &str) -> reqwest::Result<Option<String>> {
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "accountId": account_id, "network": network }))
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!("Received {} loading username for {}", resp.status(), account_id);
            return Ok(None);
        }
        let profile: Option<UserProfile> = resp.json().await.unwrap_or(None);
        Ok(display_name(profile))
    }

    pub async fn lookup(&self, network: Network, account_id: &str) -> Option<String> {
        let url = self.url.as_deref()?;
        let key = (network, account_id.to_string());
        if let Some(name) = self.names.get(&key) {
            return name;
        }
        match self.fetch(url, network, account_id).await {
            Ok(name) => {
                self.names.insert(key, name.clone(), None);
                name
            }
            Err(e) => {
                warn!("Failed loading username for {}: {}", account_id, e);
                None
            }
        }
    }
}
