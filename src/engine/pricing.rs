use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::gateway::MarketQuote;
use crate::models::Side;

/// Escalation schedule boundaries, in hours since order creation.
#[derive(Debug, Clone, Copy)]
pub struct EscalationWindows {
    /// No repricing before this point (6h).
    pub patient_h: f64,
    /// Mid-market by here in the normal regime (12h).
    pub balanced_h: f64,
    /// Best-available by here in the normal regime (24h).
    pub aggressive_h: f64,
    /// Unconditional market-order conversion (36h).
    pub market_h: f64,
}

impl Default for EscalationWindows {
    fn default() -> Self {
        Self {
            patient_h: 6.0,
            balanced_h: 12.0,
            aggressive_h: 24.0,
            market_h: 36.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Below this spread (% of mid) the market counts as tight.
    pub tight_spread_pct: Decimal,
    /// Above this spread (% of mid) the market counts as wide.
    pub wide_spread_pct: Decimal,
    pub windows: EscalationWindows,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tight_spread_pct: Decimal::new(5, 1), // 0.5%
            wide_spread_pct: Decimal::from(2),    // 2%
            windows: EscalationWindows::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityRegime {
    Tight,
    Normal,
    Wide,
}

impl LiquidityRegime {
    pub fn classify(spread_pct: Decimal, cfg: &PricingConfig) -> Self {
        if spread_pct < cfg.tight_spread_pct {
            LiquidityRegime::Tight
        } else if spread_pct < cfg.wide_spread_pct {
            LiquidityRegime::Normal
        } else {
            LiquidityRegime::Wide
        }
    }
}

impl std::fmt::Display for LiquidityRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LiquidityRegime::Tight => "tight",
            LiquidityRegime::Normal => "normal",
            LiquidityRegime::Wide => "wide",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// What to quote right now for an unfilled copy order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDecision {
    Limit { price: Decimal, urgency: Urgency },
    /// Convert to a market order (36h+ elapsed).
    Market,
}

/// Price an unfilled order given the target trader's execution price,
/// the current top of book, and the time the order has been working.
///
/// Pure function: the clock is an argument, never read ambiently. The
/// quote only ever moves toward the market as `hours_elapsed` grows,
/// and the result is clamped into [0, 1].
pub fn price_for(
    target_price: Decimal,
    side: Side,
    quote: MarketQuote,
    hours_elapsed: f64,
    cfg: &PricingConfig,
) -> PriceDecision {
    let w = &cfg.windows;

    if hours_elapsed >= w.market_h {
        return PriceDecision::Market;
    }

    let regime = LiquidityRegime::classify(quote.spread_pct(), cfg);
    let mid = quote.mid();
    let best = match side {
        Side::Buy => quote.best_ask,
        Side::Sell => quote.best_bid,
    };

    let (price, urgency) = match regime {
        LiquidityRegime::Tight => tight_schedule(target_price, side, quote, best, hours_elapsed, w),
        LiquidityRegime::Normal => {
            // target → mid over [0, 12h], mid → best over [12h, 24h]
            if hours_elapsed < w.balanced_h {
                let urgency = if hours_elapsed < w.patient_h {
                    Urgency::Low
                } else {
                    Urgency::Medium
                };
                (
                    lerp(target_price, mid, hours_elapsed / w.balanced_h),
                    urgency,
                )
            } else if hours_elapsed < w.aggressive_h {
                let frac =
                    (hours_elapsed - w.balanced_h) / (w.aggressive_h - w.balanced_h);
                (lerp(mid, best, frac), Urgency::High)
            } else {
                (best, Urgency::High)
            }
        }
        LiquidityRegime::Wide => {
            // Thin books make patience costly: mid by 6h, best by 12h
            if hours_elapsed < w.patient_h {
                (
                    lerp(target_price, mid, hours_elapsed / w.patient_h),
                    Urgency::Medium,
                )
            } else if hours_elapsed < w.balanced_h {
                let frac = (hours_elapsed - w.patient_h) / (w.balanced_h - w.patient_h);
                (lerp(mid, best, frac), Urgency::High)
            } else {
                (best, Urgency::High)
            }
        }
    };

    // A target on the aggressive side of the book is already at or past
    // the schedule's waypoints; hold it there rather than retreating.
    let price = match side {
        Side::Buy => price.max(target_price),
        Side::Sell => price.min(target_price),
    };

    PriceDecision::Limit {
        price: price.clamp(Decimal::ZERO, Decimal::ONE),
        urgency,
    }
}

/// Tight books stay patient: exact target through 6h, then a 15%-of-
/// spread nudge toward the market per escalation step, never crossing
/// the best available level.
fn tight_schedule(
    target_price: Decimal,
    side: Side,
    quote: MarketQuote,
    best: Decimal,
    hours_elapsed: f64,
    w: &EscalationWindows,
) -> (Decimal, Urgency) {
    let (steps, urgency) = if hours_elapsed < w.patient_h {
        (0u32, Urgency::Low)
    } else if hours_elapsed < w.balanced_h {
        (1, Urgency::Low)
    } else if hours_elapsed < w.aggressive_h {
        (2, Urgency::Medium)
    } else {
        (3, Urgency::High)
    };

    let nudge = quote.spread() * Decimal::new(15, 2) * Decimal::from(steps);
    let price = match side {
        Side::Buy => (target_price + nudge).min(best.max(target_price)),
        Side::Sell => (target_price - nudge).max(best.min(target_price)),
    };

    (price, urgency)
}

fn lerp(from: Decimal, to: Decimal, frac: f64) -> Decimal {
    let frac = Decimal::try_from(frac.clamp(0.0, 1.0)).unwrap_or_default();
    from + (to - from) * frac
}

/// Re-quote cadence gate: no adjustment inside the patient window, at
/// least 3h between adjustments, and one adjustment per escalation
/// window at most.
pub fn should_adjust(
    created_at: DateTime<Utc>,
    last_adjustment_at: Option<DateTime<Utc>>,
    adjustment_count: i32,
    now: DateTime<Utc>,
    w: &EscalationWindows,
) -> bool {
    let hours_elapsed = hours_between(created_at, now);

    if hours_elapsed < w.patient_h {
        return false;
    }

    if adjustment_count == 0 {
        return true;
    }

    if let Some(last) = last_adjustment_at {
        if hours_between(last, now) < 3.0 {
            return false;
        }
    }

    let boundaries = [w.patient_h, w.balanced_h, w.aggressive_h, w.market_h];
    for (i, boundary) in boundaries.iter().enumerate() {
        if hours_elapsed >= *boundary && adjustment_count <= i as i32 {
            return true;
        }
    }

    false
}

pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}
