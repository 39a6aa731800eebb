use rust_decimal::Decimal;

/// Outcome of applying the minimum-order rule to one copy event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulationDecision {
    /// Running total still below the minimum: persist the combined
    /// size/value in the ledger, place nothing.
    Defer {
        size: Decimal,
        value_usd: Decimal,
    },
    /// Place one order for the combined total. `folded` is true when an
    /// existing ledger entry was merged in (and must be deleted).
    Place {
        size: Decimal,
        value_usd: Decimal,
        folded: bool,
    },
}

/// Apply the minimum-order rule to a copy event of `copy_size` shares
/// worth `copy_value_usd`, given whatever is already accumulated for
/// the same (follower, target, market, outcome) key.
///
/// The ledger never rests at or above the minimum: the instant the
/// combined value clears `min_order_usd` the whole total is placed and
/// the entry cleared.
pub fn apply_minimum_order_rule(
    copy_size: Decimal,
    copy_value_usd: Decimal,
    accumulated: Option<(Decimal, Decimal)>,
    min_order_usd: Decimal,
) -> AccumulationDecision {
    let (acc_size, acc_value) = accumulated.unwrap_or((Decimal::ZERO, Decimal::ZERO));
    let total_size = copy_size + acc_size;
    let total_value = copy_value_usd + acc_value;

    if total_value >= min_order_usd {
        AccumulationDecision::Place {
            size: total_size,
            value_usd: total_value,
            folded: accumulated.is_some(),
        }
    } else {
        AccumulationDecision::Defer {
            size: total_size,
            value_usd: total_value,
        }
    }
}
