//! Manual check against the configured upstreams: one token descriptor and a pool lookup.
//!
//! `probe_mirror <network> <token_id> [pool_contract_id]`

use sentinel_enricher::{config, models::Network, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let network = match args.next().as_deref() {
        Some("testnet") => Network::Testnet,
        _ => Network::Mainnet,
    };
    let token_id = args.next().unwrap_or_else(|| "0.0.1234197".to_string());
    let pool_id = args.next();

    let cfg = config::load().map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Probing {} mirror at {}", network, cfg.mirror_url(network));
    let services = Services::new(cfg)?;

    match services.mirror.get_token(network, &token_id).await {
        Some(token) => println!(
            "Token {} | {} ({}) | decimals {} | supply {}/{} | treasury {}",
            token.token_id,
            token.name,
            token.symbol,
            token.decimals,
            token.total_supply,
            token.max_supply,
            token.treasury_account_id
        ),
        None => eprintln!("Token {} could not be loaded", token_id),
    }

    if let Some(pool_id) = pool_id {
        match services.pools.lookup(&pool_id).await {
            Some(pool) => println!(
                "Pool {} | {} | {} / {}",
                pool.contract_id, pool.lp_token.symbol, pool.token_a.symbol, pool.token_b.symbol
            ),
            None => println!("{} is not a known liquidity pool", pool_id),
        }
    }

    Ok(())
}
