use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::gateway::VenuePosition;
use crate::models::Side;

/// How a target trader's position moved between two polling ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Increase,
    Decrease,
    Closed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::New => "NEW",
            ChangeKind::Increase => "INCREASE",
            ChangeKind::Decrease => "DECREASE",
            ChangeKind::Closed => "CLOSED",
        };
        write!(f, "{s}")
    }
}

/// One classified discrepancy between the previous snapshot and the
/// positions just observed. `size_delta` is the target trader's share
/// delta — only the delta is ever copied, never the full new size.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub kind: ChangeKind,
    pub side: Side,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub size_delta: Decimal,
    /// Price the target traded at (their average entry for buys, the
    /// prior entry for sells). Used as the copy order's target price.
    pub price: Decimal,
}

/// Diff the latest snapshot against the just-fetched positions.
///
/// `prev` is keyed by token ID (unique per market/outcome leg). Running
/// this twice with identical inputs yields an empty vec — snapshot
/// diffing is idempotent.
pub fn classify_changes(
    prev: &HashMap<String, VenuePosition>,
    current: &[VenuePosition],
) -> Vec<PositionChange> {
    let mut changes = Vec::new();

    for pos in current {
        let old = prev.get(&pos.token_id);

        match old {
            None => {
                if pos.size > Decimal::ZERO {
                    changes.push(PositionChange {
                        kind: ChangeKind::New,
                        side: Side::Buy,
                        market_id: pos.market_id.clone(),
                        token_id: pos.token_id.clone(),
                        outcome: pos.outcome.clone(),
                        size_delta: pos.size,
                        price: pos.avg_price,
                    });
                }
            }
            Some(old) => {
                if pos.size > old.size {
                    changes.push(PositionChange {
                        kind: ChangeKind::Increase,
                        side: Side::Buy,
                        market_id: pos.market_id.clone(),
                        token_id: pos.token_id.clone(),
                        outcome: pos.outcome.clone(),
                        size_delta: pos.size - old.size,
                        price: pos.avg_price,
                    });
                } else if pos.size < old.size && pos.size > Decimal::ZERO {
                    changes.push(PositionChange {
                        kind: ChangeKind::Decrease,
                        side: Side::Sell,
                        market_id: pos.market_id.clone(),
                        token_id: pos.token_id.clone(),
                        outcome: pos.outcome.clone(),
                        size_delta: old.size - pos.size,
                        // Exit at the entry the position was carried at
                        price: old.avg_price,
                    });
                } else if pos.size <= Decimal::ZERO && old.size > Decimal::ZERO {
                    changes.push(PositionChange {
                        kind: ChangeKind::Closed,
                        side: Side::Sell,
                        market_id: pos.market_id.clone(),
                        token_id: pos.token_id.clone(),
                        outcome: pos.outcome.clone(),
                        size_delta: old.size,
                        price: old.avg_price,
                    });
                }
            }
        }
    }

    // Positions that vanished entirely from the venue response
    for (token_id, old) in prev {
        if old.size <= Decimal::ZERO {
            continue;
        }
        if !current.iter().any(|p| &p.token_id == token_id) {
            changes.push(PositionChange {
                kind: ChangeKind::Closed,
                side: Side::Sell,
                market_id: old.market_id.clone(),
                token_id: old.token_id.clone(),
                outcome: old.outcome.clone(),
                size_delta: old.size,
                price: old.avg_price,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pos(token: &str, size: &str, price: &str) -> VenuePosition {
        VenuePosition {
            market_id: "market_1".into(),
            token_id: token.into(),
            outcome: "YES".into(),
            size: dec(size),
            avg_price: dec(price),
        }
    }

    fn prev_map(positions: &[VenuePosition]) -> HashMap<String, VenuePosition> {
        positions
            .iter()
            .map(|p| (p.token_id.clone(), p.clone()))
            .collect()
    }

    #[test]
    fn new_position_is_a_buy_for_full_size() {
        let prev = HashMap::new();
        let current = vec![pos("tok_a", "100", "0.65")];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::New);
        assert_eq!(changes[0].side, Side::Buy);
        assert_eq!(changes[0].size_delta, dec("100"));
        assert_eq!(changes[0].price, dec("0.65"));
    }

    #[test]
    fn increase_copies_only_the_delta() {
        let prev = prev_map(&[pos("tok_a", "100", "0.60")]);
        let current = vec![pos("tok_a", "150", "0.62")];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Increase);
        assert_eq!(changes[0].size_delta, dec("50"));
    }

    #[test]
    fn decrease_sells_the_delta_at_old_entry_price() {
        let prev = prev_map(&[pos("tok_a", "100", "0.60")]);
        let current = vec![pos("tok_a", "70", "0.75")];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Decrease);
        assert_eq!(changes[0].side, Side::Sell);
        assert_eq!(changes[0].size_delta, dec("30"));
        assert_eq!(changes[0].price, dec("0.60"));
    }

    #[test]
    fn vanished_position_is_closed_for_full_size() {
        let prev = prev_map(&[pos("tok_a", "100", "0.60")]);
        let current = vec![];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Closed);
        assert_eq!(changes[0].side, Side::Sell);
        assert_eq!(changes[0].size_delta, dec("100"));
    }

    #[test]
    fn zero_size_row_is_also_closed() {
        let prev = prev_map(&[pos("tok_a", "100", "0.60")]);
        let current = vec![pos("tok_a", "0", "0.60")];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Closed);
        assert_eq!(changes[0].size_delta, dec("100"));
    }

    #[test]
    fn unchanged_positions_produce_no_events() {
        let snapshot = [pos("tok_a", "100", "0.60"), pos("tok_b", "25", "0.30")];
        let prev = prev_map(&snapshot);
        let current = snapshot.to_vec();

        assert!(classify_changes(&prev, &current).is_empty());
    }

    #[test]
    fn zero_prev_rows_do_not_reclose() {
        // A closure marker from the previous tick must not emit a second
        // CLOSED event when the position stays gone.
        let prev = prev_map(&[pos("tok_a", "0", "0.60")]);
        let current = vec![];

        assert!(classify_changes(&prev, &current).is_empty());
    }

    #[test]
    fn yes_and_no_legs_classify_independently() {
        let mut yes = pos("tok_yes", "100", "0.60");
        yes.outcome = "YES".into();
        let mut no = pos("tok_no", "50", "0.40");
        no.outcome = "NO".into();

        let prev = prev_map(&[yes.clone(), no.clone()]);
        let current = vec![pos("tok_yes", "120", "0.61"), pos("tok_no", "50", "0.40")];

        let changes = classify_changes(&prev, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].token_id, "tok_yes");
        assert_eq!(changes[0].size_delta, dec("20"));
    }
}
