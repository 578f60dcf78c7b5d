use std::collections::HashSet;

use crate::amounts::tiny_to_hbar;
use crate::models::TransferBundle;
use crate::parser::TradeThresholds;

/// Did one of `receivers` pay for what they received?
///
/// A zero hbar threshold disables classification entirely. Otherwise the bundle qualifies
/// on an hbar debit of at least `|threshold|` from a receiver, or (when enabled) on any
/// fungible debit or outgoing NFT from a receiver.
pub fn is_qualifying_trade(
    thresholds: &TradeThresholds,
    bundle: &TransferBundle,
    receivers: &HashSet<&str>,
) -> bool {
    if thresholds.hbar_threshold.is_zero() {
        return true;
    }

    let limit = -thresholds.hbar_threshold.abs();
    let paid_hbar = bundle
        .transfers
        .iter()
        .any(|t| tiny_to_hbar(t.amount) <= limit && receivers.contains(t.account.as_str()));
    if paid_hbar {
        return true;
    }

    if thresholds.token_payments
        && bundle
            .token_transfers
            .iter()
            .any(|t| t.amount < 0 && receivers.contains(t.account.as_str()))
    {
        return true;
    }

    thresholds.nft_payments
        && bundle
            .nft_transfers
            .iter()
            .any(|t| receivers.contains(t.sender_account_id.as_str()))
}
