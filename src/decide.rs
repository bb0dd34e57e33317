use std::time::{Duration, Instant};

use crate::action::Action;
use crate::config::EngineConfig;
use crate::order_math::{close_size, limit_price, side_for_offset};
use crate::prepare::PreparedData;
use crate::state::{StateStore, SymbolState};
use crate::zone::Zone;

/// Runs the Decider over every prepared symbol, reading its current state
/// from the store. Symbols are independent; no ordering guarantee between
/// them.
pub fn decide_all(prepared: &PreparedData, store: &StateStore, config: &EngineConfig) -> Vec<Action> {
    let now = Instant::now();
    prepared
        .symbols
        .iter()
        .flat_map(|p| {
            let state = store.get(&p.symbol);
            decide_symbol(
                DecideInput { symbol: &p.symbol, offset: p.offset, cost_basis: p.cost_basis, price: p.price, zone: p.zone, state: &state, now },
                config,
            )
        })
        .collect()
}

/// Everything the Decider needs for one symbol in one cycle. Pure input; the
/// Decider performs no I/O and mutates nothing.
pub struct DecideInput<'a> {
    pub symbol: &'a str,
    pub offset: f64,
    pub cost_basis: f64,
    pub price: f64,
    pub zone: Zone,
    pub state: &'a SymbolState,
    pub now: Instant,
}

fn cancel_if_tracked(symbol: &str, state: &SymbolState, reason: &str) -> Option<Action> {
    if state.monitoring.is_tracked() {
        Some(Action::Cancel { symbol: symbol.to_string(), reason: reason.to_string() })
    } else {
        None
    }
}

fn place_limit(symbol: &str, input: &DecideInput, config: &EngineConfig, zone_bucket: u32, in_cooldown: bool, reason: &str) -> Action {
    let side = side_for_offset(input.offset);
    let size = close_size(input.offset, config.order.close_ratio);
    let price = limit_price(input.offset, input.cost_basis, config.order.order_price_offset_pct);
    Action::PlaceLimit {
        symbol: symbol.to_string(),
        side,
        size,
        price,
        zone: Zone::In(zone_bucket),
        in_cooldown,
        reason: reason.to_string(),
    }
}

/// Evaluate R1-R4 for a single symbol and emit its ordered action list.
pub fn decide_symbol(input: DecideInput, config: &EngineConfig) -> Vec<Action> {
    let symbol = input.symbol;
    let offset_usd = input.offset * input.price;
    let state = input.state;

    // R1 -- threshold breach.
    if input.zone.is_breach() {
        let mut actions = Vec::new();
        if let Some(cancel) = cancel_if_tracked(symbol, state, "threshold breach: cancelling resting order") {
            actions.push(cancel);
        }
        actions.push(Action::Alert {
            symbol: symbol.to_string(),
            offset_usd,
            offset: input.offset,
            price: input.price,
            reason: format!("offset_usd {offset_usd:.2} exceeds max threshold"),
        });
        return actions;
    }

    // R2 -- timeout on a resting order.
    if state.monitoring.active {
        if let Some(started_at) = state.monitoring.started_at {
            let timeout = Duration::from_secs_f64(config.timeout.timeout_minutes * 60.0);
            if input.now.saturating_duration_since(started_at) >= timeout {
                let side = side_for_offset(input.offset);
                let size = input.offset.abs();
                return vec![
                    Action::Cancel {
                        symbol: symbol.to_string(),
                        reason: "resting order timed out".to_string(),
                    },
                    Action::PlaceMarket {
                        symbol: symbol.to_string(),
                        side,
                        size,
                        force_close: true,
                        reason: "resting order exceeded timeout, forcing market close".to_string(),
                    },
                ];
            }
        }
    }

    // R3 -- zone change.
    let new_zone: Option<u32> = match input.zone {
        Zone::Safe => None,
        Zone::In(n) => Some(n),
        Zone::Breach => unreachable!("breach handled by R1"),
    };
    let old_zone: Option<u32> = state.monitoring.current_zone.map(|z| z as u32);

    if new_zone != old_zone {
        let in_cooldown = state
            .last_fill_time
            .map(|t| input.now.saturating_duration_since(t) < Duration::from_secs_f64(config.timeout.cooldown_after_fill_minutes * 60.0))
            .unwrap_or(false);

        return match (in_cooldown, new_zone, old_zone) {
            // R3a: in cooldown, new zone is deadband.
            (true, None, _) => {
                let mut actions = Vec::new();
                if let Some(cancel) = cancel_if_tracked(symbol, state, "returned to deadband during cooldown") {
                    actions.push(cancel);
                }
                actions.push(Action::NoAction {
                    symbol: symbol.to_string(),
                    reason: "deadband reached during cooldown".to_string(),
                });
                actions
            }
            // R3b: in cooldown, zone worsened.
            (true, Some(n), Some(old)) if n > old => {
                let mut actions = Vec::new();
                if let Some(cancel) = cancel_if_tracked(symbol, state, "zone worsened during cooldown") {
                    actions.push(cancel);
                }
                actions.push(place_limit(symbol, &input, config, n, true, "zone worsened during cooldown, re-quoting"));
                actions
            }
            // R3c: in cooldown, improved/unchanged/first-entry.
            (true, _, _) => vec![Action::NoAction {
                symbol: symbol.to_string(),
                reason: "in cooldown, waiting for natural regression".to_string(),
            }],
            // R3d: not in cooldown, new zone is deadband.
            (false, None, _) => {
                let mut actions = Vec::new();
                if let Some(cancel) = cancel_if_tracked(symbol, state, "returned to deadband") {
                    actions.push(cancel);
                }
                actions.push(Action::NoAction {
                    symbol: symbol.to_string(),
                    reason: "offset back inside deadband".to_string(),
                });
                actions
            }
            // R3e: not in cooldown, new zone is some bucket.
            (false, Some(n), _) => {
                let mut actions = Vec::new();
                if let Some(cancel) = cancel_if_tracked(symbol, state, "zone changed, replacing resting order") {
                    actions.push(cancel);
                }
                actions.push(place_limit(symbol, &input, config, n, false, "zone changed, quoting new limit order"));
                actions
            }
        };
    }

    // R4 -- no change.
    vec![Action::NoAction { symbol: symbol.to_string(), reason: "zone unchanged".to_string() }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MonitoringState;
    use crate::zone::classify;

    fn config() -> EngineConfig {
        let mut c = EngineConfig::default();
        c.threshold.min_usd = 5.0;
        c.threshold.max_usd = 20.0;
        c.threshold.step_usd = 2.5;
        c.order.close_ratio = 40.0;
        c.order.order_price_offset_pct = 0.2;
        c.timeout.cooldown_after_fill_minutes = 5.0;
        c.timeout.timeout_minutes = 20.0;
        c
    }

    fn zone_of(offset_usd: f64, cfg: &EngineConfig) -> Zone {
        classify(offset_usd, cfg.threshold.min_usd, cfg.threshold.max_usd, cfg.threshold.step_usd)
    }

    #[test]
    fn s1_first_entry_places_limit() {
        let cfg = config();
        let offset = 0.10_f64;
        let price = 100.0;
        let offset_usd = offset * price;
        let zone = zone_of(offset_usd, &cfg);
        assert_eq!(zone, Zone::In(2));

        let state = SymbolState::default();
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset, cost_basis: price, price, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::PlaceLimit { side, size, price, zone, .. } => {
                assert_eq!(*side, crate::order_math::Side::Sell);
                assert!((*size - 0.04).abs() < 1e-9);
                assert!((*price - 100.20).abs() < 1e-9);
                assert_eq!(*zone, Zone::In(2));
            }
            other => panic!("expected PlaceLimit, got {other:?}"),
        }
    }

    #[test]
    fn s2_deadband_is_no_action() {
        let cfg = config();
        let offset = -0.01_f64;
        let zone = zone_of(offset * 100.0, &cfg);
        assert_eq!(zone, Zone::Safe);
        let state = SymbolState::default();
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset, cost_basis: 0.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::NoAction { .. }));
    }

    #[test]
    fn s3_timeout_forces_market_close() {
        let cfg = config();
        let started_at = Instant::now() - Duration::from_secs(21 * 60);
        let state = SymbolState {
            offset: 0.10,
            cost_basis: 100.0,
            monitoring: MonitoringState { active: true, order_id: Some("o1".into()), current_zone: Some(1), started_at: Some(started_at) },
            last_fill_time: None,
        };
        let zone = zone_of(10.0, &cfg);
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset: 0.10, cost_basis: 100.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Cancel { .. }));
        match &actions[1] {
            Action::PlaceMarket { size, force_close, .. } => {
                assert!((*size - 0.10).abs() < 1e-9);
                assert!(*force_close);
            }
            other => panic!("expected PlaceMarket, got {other:?}"),
        }
    }

    #[test]
    fn s4_breach_cancels_and_alerts() {
        let cfg = config();
        let offset = 0.25_f64;
        let offset_usd = offset * 100.0;
        let zone = zone_of(offset_usd, &cfg);
        assert!(zone.is_breach());
        let state = SymbolState {
            offset,
            cost_basis: 100.0,
            monitoring: MonitoringState { active: true, order_id: Some("o1".into()), current_zone: Some(1), started_at: Some(Instant::now()) },
            last_fill_time: None,
        };
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset, cost_basis: 100.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Cancel { .. }));
        assert!(matches!(actions[1], Action::Alert { .. }));
    }

    #[test]
    fn s5_cooldown_zone_improved_is_no_action() {
        let cfg = config();
        let state = SymbolState {
            offset: 0.04,
            cost_basis: 100.0,
            monitoring: MonitoringState { active: false, order_id: Some("o1".into()), current_zone: Some(3), started_at: None },
            last_fill_time: Some(Instant::now() - Duration::from_secs(2 * 60)),
        };
        // offset_usd = 8 -> bucket floor((8-5)/2.5) = 1, improved from 3.
        let offset = 0.08;
        let zone = zone_of(offset * 100.0, &cfg);
        assert_eq!(zone, Zone::In(1));
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset, cost_basis: 100.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::NoAction { .. }));
    }

    #[test]
    fn s6_cooldown_zone_worsened_requotes() {
        let cfg = config();
        let state = SymbolState {
            offset: 0.06,
            cost_basis: 100.0,
            monitoring: MonitoringState { active: false, order_id: Some("o1".into()), current_zone: Some(1), started_at: None },
            last_fill_time: Some(Instant::now() - Duration::from_secs(2 * 60)),
        };
        let offset = 0.15_f64;
        let zone = zone_of(offset * 100.0, &cfg); // offset_usd=15 -> bucket 4
        assert_eq!(zone, Zone::In(4));
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset, cost_basis: 100.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Cancel { .. }));
        match &actions[1] {
            Action::PlaceLimit { in_cooldown, zone, .. } => {
                assert!(*in_cooldown);
                assert_eq!(*zone, Zone::In(4));
            }
            other => panic!("expected PlaceLimit, got {other:?}"),
        }
    }

    #[test]
    fn r4_unchanged_zone_is_no_action() {
        let cfg = config();
        let state = SymbolState {
            offset: 0.08,
            cost_basis: 100.0,
            monitoring: MonitoringState { active: false, order_id: Some("o1".into()), current_zone: Some(1), started_at: None },
            last_fill_time: None,
        };
        let zone = zone_of(8.0, &cfg);
        assert_eq!(zone, Zone::In(1));
        let actions = decide_symbol(
            DecideInput { symbol: "SOL", offset: 0.08, cost_basis: 100.0, price: 100.0, zone, state: &state, now: Instant::now() },
            &cfg,
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::NoAction { .. }));
    }
}
