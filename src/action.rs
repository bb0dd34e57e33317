use crate::order_math::Side;
use crate::zone::Zone;

/// Tagged variant emitted by the Decider. Carries its own `reason` diagnostic
/// string; the Decider has no other observable side effect.
#[derive(Debug, Clone)]
pub enum Action {
    PlaceLimit {
        symbol: String,
        side: Side,
        size: f64,
        price: f64,
        zone: Zone,
        in_cooldown: bool,
        reason: String,
    },
    PlaceMarket {
        symbol: String,
        side: Side,
        size: f64,
        force_close: bool,
        reason: String,
    },
    Cancel {
        symbol: String,
        reason: String,
    },
    Alert {
        symbol: String,
        offset_usd: f64,
        offset: f64,
        price: f64,
        reason: String,
    },
    NoAction {
        symbol: String,
        reason: String,
    },
}

impl Action {
    pub fn symbol(&self) -> &str {
        match self {
            Action::PlaceLimit { symbol, .. }
            | Action::PlaceMarket { symbol, .. }
            | Action::Cancel { symbol, .. }
            | Action::Alert { symbol, .. }
            | Action::NoAction { symbol, .. } => symbol,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::PlaceLimit { .. } => "place_limit",
            Action::PlaceMarket { .. } => "place_market",
            Action::Cancel { .. } => "cancel",
            Action::Alert { .. } => "alert",
            Action::NoAction { .. } => "no_action",
        }
    }
}
