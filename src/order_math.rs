use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Size to quote, as a fraction (`close_ratio` percent) of the residual.
pub fn close_size(offset: f64, close_ratio: f64) -> f64 {
    offset.abs() * close_ratio / 100.0
}

/// A long residual (`offset > 0`) is reduced by selling; a short residual by buying.
pub fn side_for_offset(offset: f64) -> Side {
    if offset > 0.0 {
        Side::Sell
    } else {
        Side::Buy
    }
}

/// Resting limit price, offset from cost basis by `order_price_offset_pct`.
/// Long residuals rest above cost (locking a small profit if filled); short
/// residuals rest below cost, symmetrically.
pub fn limit_price(offset: f64, cost_basis: f64, order_price_offset_pct: f64) -> f64 {
    let p = order_price_offset_pct / 100.0;
    if offset > 0.0 {
        cost_basis * (1.0 + p)
    } else {
        cost_basis * (1.0 - p)
    }
}
