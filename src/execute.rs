use std::time::Duration;

use crate::action::Action;
use crate::notify::Notifier;
use crate::order_math::Side;
use crate::state::{MonitoringState, StateStore};
use crate::venue::{self, VenueAdapter, VenueError};
use crate::zone::Zone;

const MIN_ORDER_VALUE_USD: f64 = 10.0;
const CONFIRMATION_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Success,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub symbol: String,
    pub kind: &'static str,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub results: Vec<ActionResult>,
}

impl CycleSummary {
    pub fn record(&mut self, symbol: &str, kind: &'static str, outcome: ActionOutcome) {
        self.results.push(ActionResult { symbol: symbol.to_string(), kind, outcome });
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| matches!(r.outcome, ActionOutcome::Failed(_))).count()
    }
}

/// Applies Actions serially per symbol. A failed action is recorded into the
/// summary and does not abort the remaining actions in the cycle;
/// market-order failures are additionally escalated to the notifier.
pub async fn execute(
    actions: Vec<Action>,
    venue: &dyn VenueAdapter,
    store: &StateStore,
    notifier: &dyn Notifier,
    call_timeout: Duration,
) -> CycleSummary {
    let mut summary = CycleSummary::default();
    for action in actions {
        let symbol = action.symbol().to_string();
        let kind = action.kind();
        match execute_one(&action, venue, store, notifier, call_timeout).await {
            Ok(()) => summary.record(&symbol, kind, ActionOutcome::Success),
            Err(message) => {
                log::error!("action {kind} failed for {symbol}: {message}");
                summary.record(&symbol, kind, ActionOutcome::Failed(message));
            }
        }
    }
    summary
}

async fn execute_one(
    action: &Action,
    venue: &dyn VenueAdapter,
    store: &StateStore,
    notifier: &dyn Notifier,
    call_timeout: Duration,
) -> Result<(), String> {
    match action {
        Action::PlaceLimit { symbol, side, size, price, zone, .. } => {
            place_limit(symbol, *side, *size, *price, *zone, venue, store, call_timeout).await
        }
        Action::PlaceMarket { symbol, side, size, force_close, .. } => {
            let result = place_market(symbol, *side, *size, venue, store, call_timeout).await;
            if result.is_err() && *force_close {
                notifier.notify_system_error(&format!("market close failed for {symbol}")).await;
            } else if *force_close {
                notifier.notify_force_close(symbol, *size, *side).await;
            }
            result
        }
        Action::Cancel { symbol, .. } => cancel(symbol, venue, store, call_timeout).await,
        Action::Alert { symbol, offset_usd, offset, price, .. } => {
            notifier.notify_threshold_exceeded(symbol, *offset_usd, *offset, *price).await;
            Ok(())
        }
        Action::NoAction { .. } => Ok(()),
    }
}

async fn timeout_err<T>(call_timeout: Duration, fut: impl std::future::Future<Output = Result<T, VenueError>>) -> Result<T, String> {
    match tokio::time::timeout(call_timeout, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("venue call timed out".to_string()),
    }
}

async fn place_limit(
    symbol: &str,
    side: Side,
    size: f64,
    price: f64,
    zone: Zone,
    venue: &dyn VenueAdapter,
    store: &StateStore,
    call_timeout: Duration,
) -> Result<(), String> {
    let value_usd = size * price;
    if value_usd < MIN_ORDER_VALUE_USD {
        return Err(format!("order value {value_usd:.2} below minimum {MIN_ORDER_VALUE_USD:.2}"));
    }

    let order_id = timeout_err(call_timeout, venue.place_limit_order(symbol, side, size, price)).await?;

    tokio::time::sleep(CONFIRMATION_DELAY).await;
    let status = timeout_err(call_timeout, venue.get_order_status(&order_id)).await?;
    use crate::venue::OrderStatus::*;
    if !matches!(status, Open | Filled | Partial) {
        return Err(format!("order {order_id} confirmation returned unexpected status {status:?}"));
    }

    let zone_bucket = match zone {
        Zone::In(n) => n as i64,
        other => return Err(format!("place_limit emitted for non-bucket zone {other:?}")),
    };
    let now = venue::now();
    store.update(symbol, |s| s.with_monitoring(MonitoringState::with_order(order_id.clone(), zone_bucket, now)));
    Ok(())
}

async fn place_market(
    symbol: &str,
    side: Side,
    size: f64,
    venue: &dyn VenueAdapter,
    store: &StateStore,
    call_timeout: Duration,
) -> Result<(), String> {
    match tokio::time::timeout(call_timeout, venue.place_market_order(symbol, side, size)).await {
        Ok(Ok(_order_id)) => {
            let now = venue::now();
            store.update(symbol, |s| s.with_fill_now(s.monitoring.deactivated(), now));
            Ok(())
        }
        Ok(Err(VenueError::MinOrderValue { value_usd, min_usd })) => {
            Err(format!("market order value {value_usd:.2} below minimum {min_usd:.2}"))
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("market order call timed out".to_string()),
    }
}

async fn cancel(symbol: &str, venue: &dyn VenueAdapter, store: &StateStore, call_timeout: Duration) -> Result<(), String> {
    timeout_err(call_timeout, venue.cancel_all_orders(symbol)).await?;
    store.update(symbol, |s| s.with_monitoring(s.monitoring.deactivated()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LoggingNotifier;
    use crate::venue::SimVenue;
    use std::time::Instant;

    fn notifier() -> LoggingNotifier {
        LoggingNotifier::new(crate::config::NotificationCooldowns::default())
    }

    #[tokio::test]
    async fn place_limit_updates_monitoring_on_success() {
        let venue = SimVenue::new();
        let store = StateStore::new();
        let actions = vec![Action::PlaceLimit {
            symbol: "SOL".into(),
            side: Side::Sell,
            size: 0.04,
            price: 100.20,
            zone: Zone::In(2),
            in_cooldown: false,
            reason: "test".into(),
        }];
        let summary = execute(actions, &venue, &store, &notifier(), Duration::from_secs(5)).await;
        assert_eq!(summary.failure_count(), 0);
        let state = store.get("SOL");
        assert!(state.monitoring.active);
        assert!(state.monitoring.order_id.is_some());
        assert_eq!(state.monitoring.current_zone, Some(2));
    }

    #[tokio::test]
    async fn place_limit_below_minimum_value_fails_without_aborting_cycle() {
        let venue = SimVenue::new();
        let store = StateStore::new();
        let actions = vec![
            Action::PlaceLimit {
                symbol: "SOL".into(),
                side: Side::Sell,
                size: 0.01,
                price: 100.0,
                zone: Zone::In(0),
                in_cooldown: false,
                reason: "too small".into(),
            },
            Action::NoAction { symbol: "BTC".into(), reason: "noop".into() },
        ];
        let summary = execute(actions, &venue, &store, &notifier(), Duration::from_secs(5)).await;
        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.failure_count(), 1);
        assert!(matches!(summary.results[1].outcome, ActionOutcome::Success));
    }

    #[tokio::test]
    async fn place_market_sets_last_fill_time_and_clears_monitoring() {
        let venue = SimVenue::new();
        venue.set_price("SOL", 100.0);
        let store = StateStore::new();
        store.update("SOL", |s| {
            s.with_monitoring(MonitoringState { active: true, order_id: Some("x".into()), current_zone: Some(1), started_at: Some(Instant::now()) })
        });
        let actions = vec![Action::PlaceMarket { symbol: "SOL".into(), side: Side::Sell, size: 0.1, force_close: true, reason: "timeout".into() }];
        let summary = execute(actions, &venue, &store, &notifier(), Duration::from_secs(5)).await;
        assert_eq!(summary.failure_count(), 0);
        let state = store.get("SOL");
        assert!(!state.monitoring.active);
        assert_eq!(state.monitoring.current_zone, Some(1)); // retained
        assert!(state.last_fill_time.is_some());
    }

    #[tokio::test]
    async fn cancel_clears_active_flag_but_retains_zone() {
        let venue = SimVenue::new();
        let store = StateStore::new();
        venue.place_limit_order("SOL", Side::Sell, 1.0, 100.0).await.unwrap();
        store.update("SOL", |s| {
            s.with_monitoring(MonitoringState { active: true, order_id: Some("x".into()), current_zone: Some(2), started_at: Some(Instant::now()) })
        });
        let actions = vec![Action::Cancel { symbol: "SOL".into(), reason: "breach".into() }];
        execute(actions, &venue, &store, &notifier(), Duration::from_secs(5)).await;
        let state = store.get("SOL");
        assert!(!state.monitoring.active);
        assert!(state.monitoring.order_id.is_none());
        assert_eq!(state.monitoring.current_zone, Some(2));
    }

    #[tokio::test]
    async fn cancel_is_idempotent_across_repeated_cycles() {
        let venue = SimVenue::new();
        let store = StateStore::new();
        let actions = vec![Action::Cancel { symbol: "SOL".into(), reason: "none tracked".into() }];
        let s1 = execute(actions.clone(), &venue, &store, &notifier(), Duration::from_secs(5)).await;
        let s2 = execute(actions, &venue, &store, &notifier(), Duration::from_secs(5)).await;
        assert_eq!(s1.failure_count(), 0);
        assert_eq!(s2.failure_count(), 0);
    }
}
