use crate::api::types::{OpenTrade, TradeKey};
use std::collections::HashSet;

/// `symbol + side` keys seen in the last successful open-trades poll.
pub type IdentitySet = HashSet<TradeKey>;

pub fn identity_set(trades: &[OpenTrade]) -> IdentitySet {
    trades.iter().map(OpenTrade::key).collect()
}

/// What a fast poll should do with its open-trades result.
#[derive(Debug)]
pub enum PollOutcome {
    /// At least one previously open trade is gone. Closed history and
    /// statistics are stale; the partial view must not be committed.
    ClosureDetected { closed: Vec<TradeKey> },
    /// Nothing vanished: replace the open-trade view wholesale.
    Replace { trades: Vec<OpenTrade>, identities: IdentitySet },
    /// The fetch failed: keep the last successful view.
    Unavailable,
}

/// Compare a fresh open-trades poll against the previous identity set.
/// Only set membership matters; newly opened trades never force a reload.
pub fn reconcile(previous: &IdentitySet, polled: Option<Vec<OpenTrade>>) -> PollOutcome {
    let Some(trades) = polled else {
        return PollOutcome::Unavailable;
    };

    let identities = identity_set(&trades);
    let mut closed: Vec<TradeKey> = previous.difference(&identities).cloned().collect();

    if closed.is_empty() {
        PollOutcome::Replace { trades, identities }
    } else {
        closed.sort();
        PollOutcome::ClosureDetected { closed }
    }
}
