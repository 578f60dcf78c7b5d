use std::collections::HashMap;

use crate::amounts::{apply_decimals, tiny_to_hbar, to_precision};
use crate::links::{embed_link, embed_nft_link, embed_token_link, embed_wallet_link, pool_link};
use crate::models::{Field, HbarTransfer, Network, NftTransfer, TokenDescriptor, TokenTransfer, TransferBundle};
use crate::state::Services;

/// What one wallet got and gave up in a transaction, as display lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSummary {
    pub credit_lines: Vec<String>,
    pub debit_lines: Vec<String>,
}

fn token_label(network: Network, token_id: &str, tokens: &HashMap<String, TokenDescriptor>) -> String {
    let token = tokens.get(token_id);
    embed_token_link(
        network,
        token_id,
        token.map(|t| t.name.as_str()),
        token.map(|t| t.symbol.as_str()),
    )
}

fn nft_lines(network: Network, nfts: &[&NftTransfer], tokens: &HashMap<String, TokenDescriptor>) -> Vec<String> {
    let mut groups: Vec<(&str, Vec<u64>)> = Vec::new();
    for nft in nfts {
        match groups.iter_mut().find(|(token_id, _)| *token_id == nft.token_id) {
            Some((_, serials)) => serials.push(nft.serial_number),
            None => groups.push((nft.token_id.as_str(), vec![nft.serial_number])),
        }
    }
    groups
        .into_iter()
        .map(|(token_id, serials)| {
            let serials: Vec<String> = serials
                .into_iter()
                .map(|s| embed_nft_link(network, token_id, s))
                .collect();
            format!("{} # {}", token_label(network, token_id, tokens), serials.join(", "))
        })
        .collect()
}

fn fungible_lines(
    network: Network,
    transfers: &[&TokenTransfer],
    tokens: &HashMap<String, TokenDescriptor>,
    factor: i64,
) -> Vec<String> {
    transfers
        .iter()
        .map(|ft| match tokens.get(&ft.token_id) {
            None => format!("unknown {}", embed_token_link(network, &ft.token_id, None, None)),
            Some(token) => format!(
                "{} {}",
                apply_decimals(ft.amount, token.decimals as u32, factor),
                token_label(network, &ft.token_id, tokens)
            ),
        })
        .collect()
}

fn hbar_line(transfer: Option<&HbarTransfer>, factor: i64) -> Option<String> {
    let transfer = transfer.filter(|t| !t.account.is_empty())?;
    let amount = tiny_to_hbar(transfer.amount) * rust_decimal::Decimal::from(factor);
    Some(format!("{} hbar", to_precision(amount, 8)))
}

pub fn summarize(
    network: Network,
    wallet: &str,
    bundle: &TransferBundle,
    tokens: &HashMap<String, TokenDescriptor>,
) -> WalletSummary {
    let credit_tokens: Vec<_> = bundle
        .token_transfers
        .iter()
        .filter(|t| t.account == wallet && t.amount > 0)
        .collect();
    let debit_tokens: Vec<_> = bundle
        .token_transfers
        .iter()
        .filter(|t| t.account == wallet && t.amount < 0)
        .collect();
    let credit_nfts: Vec<_> = bundle
        .nft_transfers
        .iter()
        .filter(|t| t.receiver_account_id == wallet)
        .collect();
    let debit_nfts: Vec<_> = bundle
        .nft_transfers
        .iter()
        .filter(|t| t.sender_account_id == wallet)
        .collect();
    let credit_hbar = bundle.transfers.iter().find(|t| t.account == wallet && t.amount > 0);
    let debit_hbar = bundle.transfers.iter().find(|t| t.account == wallet && t.amount < 0);

    let mut credit_lines = nft_lines(network, &credit_nfts, tokens);
    credit_lines.extend(fungible_lines(network, &credit_tokens, tokens, 1));
    credit_lines.extend(hbar_line(credit_hbar, 1));

    let mut debit_lines = nft_lines(network, &debit_nfts, tokens);
    debit_lines.extend(fungible_lines(network, &debit_tokens, tokens, -1));
    debit_lines.extend(hbar_line(debit_hbar, -1));

    WalletSummary {
        credit_lines,
        debit_lines,
    }
}

/// Identity field (`LP` for pool contracts, otherwise `Wallet`) followed by the
/// non-empty `Receives` / `Sends` fields.
pub async fn wallet_fields(
    services: &Services,
    network: Network,
    wallet: &str,
    bundle: &TransferBundle,
    tokens: &HashMap<String, TokenDescriptor>,
) -> Vec<Field> {
    let summary = summarize(network, wallet, bundle, tokens);

    let identity = match services.pools.lookup(wallet).await {
        Some(pool) => Field::inline("LP", embed_link(&pool.lp_token.symbol, &pool_link(wallet))),
        None => {
            let username = services.names.lookup(network, wallet).await;
            Field::inline("Wallet", embed_wallet_link(network, wallet, username.as_deref()))
        }
    };

    let mut fields = vec![identity];
    if !summary.credit_lines.is_empty() {
        fields.push(Field::inline("Receives", summary.credit_lines.join("\n")));
    }
    if !summary.debit_lines.is_empty() {
        fields.push(Field::inline("Sends", summary.debit_lines.join("\n")));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0.0.100";

    fn token(id: &str, symbol: &str, decimals: u64) -> TokenDescriptor {
        TokenDescriptor {
            token_id: id.to_string(),
            name: format!("{symbol} name"),
            symbol: symbol.to_string(),
            decimals,
            max_supply: 0,
            total_supply: 0,
            treasury_account_id: "0.0.1".to_string(),
        }
    }

    fn nft(token_id: &str, serial: u64, sender: &str, receiver: &str) -> NftTransfer {
        NftTransfer {
            token_id: token_id.to_string(),
            serial_number: serial,
            sender_account_id: sender.to_string(),
            receiver_account_id: receiver.to_string(),
            is_approval: false,
        }
    }

    fn ft(account: &str, token_id: &str, amount: i64) -> TokenTransfer {
        TokenTransfer {
            account: account.to_string(),
            token_id: token_id.to_string(),
            amount,
            is_approval: false,
        }
    }

    #[test]
    fn nft_credits_and_fungible_debit() {
        let tokens = HashMap::from([
            ("0.0.10".to_string(), token("0.0.10", "NFTX", 0)),
            ("0.0.20".to_string(), token("0.0.20", "FTY", 3)),
        ]);
        let bundle = TransferBundle {
            nft_transfers: vec![
                nft("0.0.10", 4, "0.0.200", WALLET),
                nft("0.0.10", 9, "0.0.200", WALLET),
            ],
            token_transfers: vec![ft(WALLET, "0.0.20", -1000), ft("0.0.200", "0.0.20", 1000)],
            ..Default::default()
        };

        let summary = summarize(Network::Mainnet, WALLET, &bundle, &tokens);
        assert_eq!(
            summary.credit_lines,
            vec![
                "[NFTX](https://hashscan.io/mainnet/token/0.0.10) # \
                 [4](https://hashscan.io/mainnet/token/0.0.10/4), \
                 [9](https://hashscan.io/mainnet/token/0.0.10/9)"
            ]
        );
        assert_eq!(
            summary.debit_lines,
            vec!["1.000 [FTY](https://hashscan.io/mainnet/token/0.0.20)"]
        );
    }

    #[test]
    fn nft_groups_follow_first_appearance() {
        let bundle = TransferBundle {
            nft_transfers: vec![
                nft("0.0.30", 1, "0.0.200", WALLET),
                nft("0.0.10", 2, "0.0.200", WALLET),
                nft("0.0.30", 3, "0.0.200", WALLET),
            ],
            ..Default::default()
        };
        let summary = summarize(Network::Testnet, WALLET, &bundle, &HashMap::new());
        assert_eq!(summary.credit_lines.len(), 2);
        assert!(summary.credit_lines[0].starts_with("[0.0.30]"));
        assert!(summary.credit_lines[0].ends_with("/0.0.30/3)"));
        assert!(summary.credit_lines[1].starts_with("[0.0.10]"));
    }

    #[test]
    fn unknown_tokens_have_no_amount() {
        let bundle = TransferBundle {
            token_transfers: vec![ft(WALLET, "0.0.77", 5)],
            ..Default::default()
        };
        let summary = summarize(Network::Mainnet, WALLET, &bundle, &HashMap::new());
        assert_eq!(
            summary.credit_lines,
            vec!["unknown [0.0.77](https://hashscan.io/mainnet/token/0.0.77)"]
        );
    }

    #[test]
    fn hbar_debit_is_positive_with_eight_digits() {
        let bundle = TransferBundle {
            transfers: vec![
                HbarTransfer {
                    account: WALLET.to_string(),
                    amount: -2_550_000_000,
                    is_approval: false,
                },
                HbarTransfer {
                    account: WALLET.to_string(),
                    amount: -100,
                    is_approval: false,
                },
            ],
            ..Default::default()
        };
        let summary = summarize(Network::Mainnet, WALLET, &bundle, &HashMap::new());
        assert!(summary.credit_lines.is_empty());
        assert_eq!(summary.debit_lines, vec!["25.500000 hbar"]);
    }

    #[test]
    fn lines_are_ordered_nft_fungible_hbar() {
        let tokens = HashMap::from([("0.0.20".to_string(), token("0.0.20", "FTY", 2))]);
        let bundle = TransferBundle {
            transfers: vec![HbarTransfer {
                account: WALLET.to_string(),
                amount: 100_000_000,
                is_approval: false,
            }],
            token_transfers: vec![ft(WALLET, "0.0.20", 250)],
            nft_transfers: vec![nft("0.0.10", 1, "0.0.200", WALLET)],
        };
        let summary = summarize(Network::Mainnet, WALLET, &bundle, &tokens);
        assert_eq!(summary.credit_lines.len(), 3);
        assert!(summary.credit_lines[0].contains("# [1]"));
        assert!(summary.credit_lines[1].starts_with("2.50 "));
        assert_eq!(summary.credit_lines[2], "1.0000000 hbar");
    }
}
