use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// The order currently "defending" a zone for a symbol, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringState {
    pub active: bool,
    pub order_id: Option<String>,
    pub current_zone: Option<i64>,
    pub started_at: Option<Instant>,
}

impl Default for MonitoringState {
    fn default() -> Self {
        Self { active: false, order_id: None, current_zone: None, started_at: None }
    }
}

impl MonitoringState {
    pub fn is_tracked(&self) -> bool {
        self.order_id.is_some()
    }

    /// A fresh limit order defending `zone`.
    pub fn with_order(order_id: String, zone: i64, started_at: Instant) -> Self {
        Self { active: true, order_id: Some(order_id), current_zone: Some(zone), started_at: Some(started_at) }
    }

    /// No resting order, but `current_zone` is retained per I3.
    pub fn deactivated(&self) -> Self {
        Self { active: false, order_id: None, current_zone: self.current_zone, started_at: None }
    }
}

/// Per-symbol immutable snapshot. Replaced atomically; never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolState {
    pub offset: f64,
    pub cost_basis: f64,
    pub monitoring: MonitoringState,
    pub last_fill_time: Option<Instant>,
}

impl Default for SymbolState {
    fn default() -> Self {
        Self { offset: 0.0, cost_basis: 0.0, monitoring: MonitoringState::default(), last_fill_time: None }
    }
}

impl SymbolState {
    /// I1: cost_basis == 0 iff offset == 0.
    pub fn check_invariants(&self) -> Result<(), String> {
        let offset_zero = self.offset.abs() < 1e-8;
        let cost_zero = self.cost_basis.abs() < 1e-8;
        if offset_zero != cost_zero {
            return Err(format!(
                "I1 violated: offset={} cost_basis={}",
                self.offset, self.cost_basis
            ));
        }
        if self.monitoring.active && (self.monitoring.order_id.is_none() || self.monitoring.current_zone.is_none()) {
            return Err("I2 violated: active monitoring without order_id/current_zone".into());
        }
        Ok(())
    }

    pub fn with_offset(&self, offset: f64, cost_basis: f64) -> Self {
        Self { offset, cost_basis, monitoring: self.monitoring.clone(), last_fill_time: self.last_fill_time }
    }

    pub fn with_monitoring(&self, monitoring: MonitoringState) -> Self {
        Self { offset: self.offset, cost_basis: self.cost_basis, monitoring, last_fill_time: self.last_fill_time }
    }

    pub fn with_fill_now(&self, monitoring: MonitoringState, now: Instant) -> Self {
        Self { offset: self.offset, cost_basis: self.cost_basis, monitoring, last_fill_time: Some(now) }
    }
}

/// In-memory, per-symbol-locked store of [`SymbolState`]. The only shared
/// mutable structure in the loop: per-symbol writes take the symbol's own
/// lock; a coarse lock guards the metadata map (symbol set, iteration) so
/// `get_all_states`/`clear` never race with lazy symbol creation.
pub struct StateStore {
    symbols: RwLock<HashMap<String, Arc<Mutex<SymbolState>>>>,
    cycle_count: Mutex<u64>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self { symbols: RwLock::new(HashMap::new()), cycle_count: Mutex::new(0) }
    }

    fn entry(&self, symbol: &str) -> Arc<Mutex<SymbolState>> {
        if let Some(lock) = self.symbols.read().unwrap().get(symbol) {
            return lock.clone();
        }
        let mut symbols = self.symbols.write().unwrap();
        symbols
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolState::default())))
            .clone()
    }

    /// Lazily creates the symbol with defaults on first sight.
    pub fn get(&self, symbol: &str) -> SymbolState {
        self.entry(symbol).lock().unwrap().clone()
    }

    /// Atomically replaces the symbol's state with the result of `f(old)`.
    /// `f` must not block or call back into the store for the same symbol.
    pub fn update<F>(&self, symbol: &str, f: F) -> SymbolState
    where
        F: FnOnce(&SymbolState) -> SymbolState,
    {
        let lock = self.entry(symbol);
        let mut guard = lock.lock().unwrap();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    pub fn get_all_states(&self) -> HashMap<String, SymbolState> {
        let symbols = self.symbols.read().unwrap();
        symbols.iter().map(|(k, v)| (k.clone(), v.lock().unwrap().clone())).collect()
    }

    pub fn clear(&self) {
        let mut symbols = self.symbols.write().unwrap();
        symbols.clear();
        *self.cycle_count.lock().unwrap() = 0;
    }

    pub fn increment_cycle_count(&self) -> u64 {
        let mut count = self.cycle_count.lock().unwrap();
        *count += 1;
        *count
    }

    pub fn cycle_count(&self) -> u64 {
        *self.cycle_count.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn unseen_symbol_defaults_to_zero() {
        let store = StateStore::new();
        let s = store.get("SOL");
        assert_eq!(s.offset, 0.0);
        assert_eq!(s.cost_basis, 0.0);
        assert!(!s.monitoring.active);
    }

    #[test]
    fn update_replaces_atomically() {
        let store = StateStore::new();
        store.update("SOL", |s| s.with_offset(0.1, 100.0));
        let s = store.get("SOL");
        assert_eq!(s.offset, 0.1);
        assert_eq!(s.cost_basis, 100.0);
    }

    #[test]
    fn concurrent_updates_to_same_symbol_serialize() {
        let store = Arc::new(StateStore::new());
        let barrier = Arc::new(Barrier::new(4));
        let mut handles = vec![];
        for _ in 0..4 {
            let store = store.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                store.update("SOL", |s| s.with_offset(s.offset + 1.0, s.cost_basis));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("SOL").offset, 4.0);
    }

    #[test]
    fn concurrent_updates_to_different_symbols_do_not_interfere() {
        let store = Arc::new(StateStore::new());
        let a = store.clone();
        let b = store.clone();
        let t1 = thread::spawn(move || a.update("SOL", |s| s.with_offset(1.0, 10.0)));
        let t2 = thread::spawn(move || b.update("BTC", |s| s.with_offset(2.0, 20.0)));
        t1.join().unwrap();
        t2.join().unwrap();
        assert_eq!(store.get("SOL").offset, 1.0);
        assert_eq!(store.get("BTC").offset, 2.0);
    }

    #[test]
    fn invariant_check_flags_mismatched_offset_and_cost() {
        let bad = SymbolState { offset: 1.0, cost_basis: 0.0, ..SymbolState::default() };
        assert!(bad.check_invariants().is_err());
        let ok = SymbolState { offset: 0.0, cost_basis: 0.0, ..SymbolState::default() };
        assert!(ok.check_invariants().is_ok());
    }
}
