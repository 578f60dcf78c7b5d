use dotenvy::dotenv;
use eyre::Result;
use std::{env, time::Duration};
use tracing::info;

use crate::models::Network;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff starting at `min_delay`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mirror_mainnet_url: String,
    pub mirror_testnet_url: String,
    pub pools_url: String,
    pub username_api_url: Option<String>,
    pub ipfs_gateway: String,
    pub invocation_timeout: Duration,
    pub metadata_margin: Duration,
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn mirror_url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mirror_mainnet_url,
            Network::Testnet => &self.mirror_testnet_url,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            mirror_mainnet_url: "https://mainnet-public.mirrornode.hedera.com".to_string(),
            mirror_testnet_url: "https://testnet.mirrornode.hedera.com".to_string(),
            pools_url: "https://api.saucerswap.finance/pools".to_string(),
            username_api_url: Some("https://api-lb.hashpack.app/user-profile/get".to_string()),
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            invocation_timeout: Duration::from_millis(30_000),
            metadata_margin: Duration::from_millis(2000),
            http_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

pub fn load() -> Result<Config> {
    dotenv().ok();
    let defaults = Config::default();

    let username_api_url = match env::var("USERNAME_API_URL") {
        Ok(url) if url.trim().is_empty() => None,
        Ok(url) => Some(url.trim().to_string()),
        Err(_) => defaults.username_api_url,
    };

    let cfg = Config {
        port: env_or("PORT", defaults.port),
        mirror_mainnet_url: env::var("MIRROR_MAINNET_URL").unwrap_or(defaults.mirror_mainnet_url),
        mirror_testnet_url: env::var("MIRROR_TESTNET_URL").unwrap_or(defaults.mirror_testnet_url),
        pools_url: env::var("POOLS_URL").unwrap_or(defaults.pools_url),
        username_api_url,
        ipfs_gateway: env::var("IPFS_GATEWAY").unwrap_or(defaults.ipfs_gateway),
        invocation_timeout: env_millis("INVOCATION_TIMEOUT_MS", defaults.invocation_timeout),
        metadata_margin: env_millis("METADATA_MARGIN_MS", defaults.metadata_margin),
        http_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())),
        retry: RetryPolicy {
            attempts: env_or("MIRROR_RETRY_ATTEMPTS", defaults.retry.attempts).max(1),
            min_delay: env_millis("MIRROR_RETRY_MIN_DELAY_MS", defaults.retry.min_delay),
            max_delay: env_millis("MIRROR_RETRY_MAX_DELAY_MS", defaults.retry.max_delay),
        },
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(3000));
        assert_eq!(retry.delay_for(10), Duration::from_millis(3000));
    }

    #[test]
    fn mirror_url_follows_network() {
        let cfg = Config::default();
        assert!(cfg.mirror_url(Network::Testnet).contains("testnet"));
        assert!(cfg.mirror_url(Network::Mainnet).contains("mainnet"));
    }
}
