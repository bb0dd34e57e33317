use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::HedgeError;

/// Opaque on-chain pool reader. Pure query: no side effects, safe to retry.
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn fetch_ideal_positions(&self, lp_amount: f64) -> Result<HashMap<String, f64>, HedgeError>;
}

/// Fixed or test-supplied pool reader, standing in for a real on-chain
/// reader (Solana account parsing is out of scope for this crate).
pub struct InMemoryPoolReader {
    /// raw_symbol -> per-unit exposure; scaled by `lp_amount` on each call.
    per_unit_exposure: HashMap<String, f64>,
}

impl InMemoryPoolReader {
    pub fn new(per_unit_exposure: HashMap<String, f64>) -> Self {
        Self { per_unit_exposure }
    }
}

#[async_trait]
impl PoolReader for InMemoryPoolReader {
    async fn fetch_ideal_positions(&self, lp_amount: f64) -> Result<HashMap<String, f64>, HedgeError> {
        Ok(self
            .per_unit_exposure
            .iter()
            .map(|(symbol, per_unit)| (symbol.clone(), per_unit * lp_amount))
            .collect())
    }
}

/// One configured pool: its reader and the operator's LP share.
pub struct PoolEntry<'a> {
    pub name: &'a str,
    pub reader: &'a dyn PoolReader,
    pub lp_amount: f64,
}

/// Merge multiple pools' raw exposures into a single ideal-hedge map, keyed
/// by user-facing symbol. Pools with `lp_amount <= 0` are skipped. If any
/// enabled pool's reader fails, the whole aggregate fails and the cycle
/// should be aborted before any orders are touched.
pub async fn aggregate(
    pools: &[PoolEntry<'_>],
    symbol_aliases: &HashMap<String, String>,
    call_timeout: Duration,
) -> Result<HashMap<String, f64>, HedgeError> {
    let enabled: Vec<&PoolEntry> = pools.iter().filter(|p| p.lp_amount > 0.0).collect();

    let fetches = enabled
        .iter()
        .map(|p| tokio::time::timeout(call_timeout, p.reader.fetch_ideal_positions(p.lp_amount)));
    let results: Vec<Result<Result<HashMap<String, f64>, HedgeError>, tokio::time::error::Elapsed>> =
        futures_util::future::join_all(fetches).await;

    let mut ideal: HashMap<String, f64> = HashMap::new();
    for (pool, result) in enabled.iter().zip(results.into_iter()) {
        let raw = result
            .map_err(|_| HedgeError::recoverable_io(format!("pool '{}' read timed out", pool.name)))?
            .map_err(|e| HedgeError::recoverable_io(format!("pool '{}' read failed: {e}", pool.name)))?;
        for (raw_symbol, amount) in raw {
            let user_symbol = symbol_aliases.get(&raw_symbol).cloned().unwrap_or(raw_symbol);
            // pool long exposure -> required short hedge, hence negation.
            *ideal.entry(user_symbol).or_insert(0.0) -= amount;
        }
    }
    Ok(ideal)
}
