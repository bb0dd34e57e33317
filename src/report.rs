use std::time::Duration;

use crate::execute::CycleSummary;
use crate::prepare::PreparedData;

/// Emits a structured summary line for the cycle: duration, per-symbol zone,
/// and action outcome counts. The core's sole "reporting" responsibility;
/// metrics export and audit logging pipelines live outside this crate.
pub fn report(cycle_number: u64, duration: Duration, prepared: &PreparedData, summary: &CycleSummary) {
    let successes = summary.results.len() - summary.failure_count();
    log::info!(
        "cycle {cycle_number} done in {:?}: {} symbols, {} actions ({} ok, {} failed)",
        duration,
        prepared.symbols.len(),
        summary.results.len(),
        successes,
        summary.failure_count(),
    );
    for symbol in &prepared.symbols {
        log::debug!(
            "  {} offset={:.6} cost_basis={:.4} zone={:?}",
            symbol.symbol,
            symbol.offset,
            symbol.cost_basis,
            symbol.zone
        );
    }
    for result in &summary.results {
        if let crate::execute::ActionOutcome::Failed(message) = &result.outcome {
            log::warn!("  {} {} failed: {}", result.symbol, result.kind, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::{ActionOutcome, ActionResult};
    use crate::prepare::PreparedSymbol;
    use crate::zone::Zone;

    #[test]
    fn report_does_not_panic_on_empty_cycle() {
        let prepared = PreparedData::default();
        let summary = CycleSummary::default();
        report(1, Duration::from_millis(5), &prepared, &summary);
    }

    #[test]
    fn report_handles_mixed_outcomes() {
        let prepared = PreparedData {
            symbols: vec![PreparedSymbol {
                symbol: "SOL".into(),
                ideal: -0.1,
                actual: 0.0,
                price: 100.0,
                offset: 0.1,
                cost_basis: 100.0,
                zone: Zone::In(2),
            }],
        };
        let summary = CycleSummary {
            results: vec![
                ActionResult { symbol: "SOL".into(), kind: "place_limit", outcome: ActionOutcome::Success },
                ActionResult { symbol: "BTC".into(), kind: "cancel", outcome: ActionOutcome::Failed("timeout".into()) },
            ],
        };
        report(2, Duration::from_millis(12), &prepared, &summary);
        assert_eq!(summary.failure_count(), 1);
    }
}
