use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::HedgeError;
use crate::offset_tracker;
use crate::pool::{aggregate, PoolEntry};
use crate::state::StateStore;
use crate::venue::VenueAdapter;
use crate::zone::{classify, Zone};

/// Per-symbol snapshot the Decider and Report phase consume.
#[derive(Debug, Clone)]
pub struct PreparedSymbol {
    pub symbol: String,
    pub ideal: f64,
    pub actual: f64,
    pub price: f64,
    pub offset: f64,
    pub cost_basis: f64,
    pub zone: Zone,
}

#[derive(Debug, Clone, Default)]
pub struct PreparedData {
    pub symbols: Vec<PreparedSymbol>,
}

/// Orchestrates PoolAggregator plus concurrent per-symbol price/position
/// fetch, commits the updated `(offset, cost_basis)` to the StateStore, and
/// computes each symbol's zone.
pub async fn prepare(
    pools: &[PoolEntry<'_>],
    venue: &dyn VenueAdapter,
    store: &StateStore,
    config: &EngineConfig,
) -> Result<PreparedData, HedgeError> {
    let call_timeout = Duration::from_secs(config.venue_timeout_secs);
    let ideal = aggregate(pools, &config.symbol_aliases, call_timeout).await?;

    let mut symbols: HashSet<String> = ideal.keys().cloned().collect();
    symbols.extend(config.symbol_offsets.initial_offset.keys().cloned());
    symbols.extend(config.symbol_offsets.predefined_offset.keys().cloned());

    let fetches = symbols.iter().map(|symbol| fetch_symbol(symbol, &ideal, venue, config, call_timeout));
    let results = futures_util::future::join_all(fetches).await;

    let mut prepared = Vec::with_capacity(results.len());
    for result in results {
        let (symbol, ideal_amount, actual, price) = result?;

        let prior = store.get(&symbol);
        let predefined = config.symbol_offsets.predefined_offset.get(&symbol).copied().unwrap_or(0.0);

        let (raw_offset, new_cost) = offset_tracker::update(ideal_amount, actual, price, prior.offset, prior.cost_basis)
            .map_err(|e| HedgeError::InconsistentState(format!("{symbol}: {e}")))?;
        // predefined_offset corrects the computed offset only; cost basis is
        // derived from the venue-observed offset and is unaffected.
        let offset = raw_offset - predefined;

        store.update(&symbol, |s| s.with_offset(raw_offset, new_cost));

        let offset_usd = offset * price;
        let zone = classify(offset_usd, config.threshold.min_usd, config.threshold.max_usd, config.threshold.step_usd);

        prepared.push(PreparedSymbol { symbol, ideal: ideal_amount, actual, price, offset, cost_basis: new_cost, zone });
    }

    Ok(PreparedData { symbols: prepared })
}

async fn fetch_symbol(
    symbol: &str,
    ideal: &HashMap<String, f64>,
    venue: &dyn VenueAdapter,
    config: &EngineConfig,
    call_timeout: Duration,
) -> Result<(String, f64, f64, f64), HedgeError> {
    let ideal_amount = ideal.get(symbol).copied().unwrap_or(0.0);

    let price = tokio::time::timeout(call_timeout, venue.get_price(symbol))
        .await
        .map_err(|_| HedgeError::recoverable_io(format!("price fetch timed out for {symbol}")))?
        .map_err(|e| HedgeError::recoverable_io(format!("price fetch failed for {symbol}: {e}")))?;

    let position = match tokio::time::timeout(call_timeout, venue.get_position(symbol)).await {
        Ok(Ok(p)) => p,
        Ok(Err(e)) => {
            log::warn!("position fetch failed for {symbol}, defaulting to 0: {e}");
            0.0
        }
        Err(_) => {
            log::warn!("position fetch timed out for {symbol}, defaulting to 0");
            0.0
        }
    };

    let initial_offset = config.symbol_offsets.initial_offset.get(symbol).copied().unwrap_or(0.0);
    let actual = position + initial_offset;

    Ok((symbol.to_string(), ideal_amount, actual, price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::InMemoryPoolReader;
    use crate::venue::SimVenue;
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn commits_offset_before_returning() {
        let mut per_unit = Map::new();
        per_unit.insert("SOL".to_string(), 0.001);
        let reader = InMemoryPoolReader::new(per_unit);
        let pools = vec![PoolEntry { name: "jlp", reader: &reader, lp_amount: 100.0 }];

        let venue = SimVenue::new();
        venue.set_price("SOL", 100.0);
        venue.set_position("SOL", 0.0);

        let store = StateStore::new();
        let mut config = EngineConfig::default();
        config.pool.jlp_amount = 100.0;

        let prepared = prepare(&pools, &venue, &store, &config).await.unwrap();
        let sol = prepared.symbols.iter().find(|s| s.symbol == "SOL").unwrap();
        // ideal = -0.1, actual = 0 -> offset = 0.1
        assert!((sol.offset - 0.10).abs() < 1e-9);

        let committed = store.get("SOL");
        assert!((committed.offset - 0.10).abs() < 1e-9);
        assert_eq!(committed.cost_basis, 100.0);
    }

    #[tokio::test]
    async fn predefined_offset_does_not_affect_cost_basis() {
        let mut per_unit = Map::new();
        per_unit.insert("SOL".to_string(), 0.001);
        let reader = InMemoryPoolReader::new(per_unit);
        let pools = vec![PoolEntry { name: "jlp", reader: &reader, lp_amount: 100.0 }];

        let venue = SimVenue::new();
        venue.set_price("SOL", 100.0);
        venue.set_position("SOL", 0.0);

        let store = StateStore::new();
        let mut config = EngineConfig::default();
        config.pool.jlp_amount = 100.0;
        config.symbol_offsets.predefined_offset.insert("SOL".to_string(), 0.03);

        let prepared = prepare(&pools, &venue, &store, &config).await.unwrap();
        let sol = prepared.symbols.iter().find(|s| s.symbol == "SOL").unwrap();
        // raw offset 0.1 minus predefined 0.03 -> 0.07, cost basis still derived from raw offset's first build.
        assert!((sol.offset - 0.07).abs() < 1e-9);
        assert_eq!(sol.cost_basis, 100.0);
    }

    #[tokio::test]
    async fn price_fetch_failure_aborts_the_cycle() {
        let mut per_unit = Map::new();
        per_unit.insert("SOL".to_string(), 0.001);
        let reader = InMemoryPoolReader::new(per_unit);
        let pools = vec![PoolEntry { name: "jlp", reader: &reader, lp_amount: 100.0 }];

        let venue = SimVenue::new(); // no price set for SOL -> get_price fails
        let store = StateStore::new();
        let mut config = EngineConfig::default();
        config.pool.jlp_amount = 100.0;

        assert!(prepare(&pools, &venue, &store, &config).await.is_err());
    }
}
