mod action;
mod circuit_breaker;
mod config;
mod cycle;
mod decide;
mod error;
mod execute;
mod notify;
mod offset_tracker;
mod order_math;
mod pool;
mod prepare;
mod rate_limiter;
mod report;
mod state;
mod venue;
mod zone;

use std::collections::HashMap;

use config::EngineConfig;
use cycle::CycleRunner;
use notify::LoggingNotifier;
use pool::InMemoryPoolReader;
use venue::SimVenue;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let run_id = uuid::Uuid::new_v4();
    log::info!("hedge-engine starting (run {run_id})");

    let config = EngineConfig::from_env();
    if let Err(e) = config.validate() {
        log::error!("configuration invalid, refusing to start: {e}");
        std::process::exit(1);
    }

    log::info!(
        "thresholds: min={} max={} step={} usd, close_ratio={}%, timeout={}min, cooldown={}min",
        config.threshold.min_usd,
        config.threshold.max_usd,
        config.threshold.step_usd,
        config.order.close_ratio,
        config.timeout.timeout_minutes,
        config.timeout.cooldown_after_fill_minutes,
    );

    // The venue adapter and pool readers are external collaborators; this
    // binary wires up the in-memory simulated implementations so the loop
    // can run end to end without live infrastructure. A real deployment
    // swaps these two lines for a live venue client and real pool readers.
    let venue: Box<dyn venue::VenueAdapter> = Box::new(SimVenue::new().with_thousand_x_markets(vec!["1000BONK".to_string()]));
    let notifier = Box::new(LoggingNotifier::new(config.notification_cooldowns.clone()));

    let mut jlp_exposure = HashMap::new();
    jlp_exposure.insert("SOL".to_string(), 0.0);
    let jlp_reader = Box::new(InMemoryPoolReader::new(jlp_exposure));

    let mut alp_exposure = HashMap::new();
    alp_exposure.insert("WBTC".to_string(), 0.0);
    let alp_reader = Box::new(InMemoryPoolReader::new(alp_exposure));

    let runner = CycleRunner::new(config.clone(), venue, notifier)
        .with_pool("jlp", jlp_reader, config.pool.jlp_amount)
        .with_pool("alp", alp_reader, config.pool.alp_amount);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    runner.run_forever(shutdown_rx).await;
    log::info!("hedge-engine stopped");
}
