use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::NotificationCooldowns;
use crate::order_math::Side;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_threshold_exceeded(&self, symbol: &str, offset_usd: f64, offset: f64, price: f64);
    async fn notify_force_close(&self, symbol: &str, size: f64, side: Side);
    async fn notify_system_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EventKind {
    Threshold,
    ForceClose,
    SystemError,
}

/// Logs structured lines for each event, suppressing repeats of the same
/// event kind (keyed additionally by symbol for per-symbol events) within
/// its configured cooldown.
pub struct LoggingNotifier {
    cooldowns: NotificationCooldowns,
    last_sent: Mutex<HashMap<(EventKind, String), Instant>>,
}

impl LoggingNotifier {
    pub fn new(cooldowns: NotificationCooldowns) -> Self {
        Self { cooldowns, last_sent: Mutex::new(HashMap::new()) }
    }

    fn should_send(&self, kind: EventKind, key: &str, cooldown: Duration) -> bool {
        let mut last_sent = self.last_sent.lock().unwrap();
        let entry_key = (kind, key.to_string());
        let now = Instant::now();
        match last_sent.get(&entry_key) {
            Some(&last) if now.duration_since(last) < cooldown => false,
            _ => {
                last_sent.insert(entry_key, now);
                true
            }
        }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_threshold_exceeded(&self, symbol: &str, offset_usd: f64, offset: f64, price: f64) {
        let cooldown = Duration::from_secs(self.cooldowns.threshold_secs);
        if self.should_send(EventKind::Threshold, symbol, cooldown) {
            log::warn!(
                "[ALERT] {symbol} threshold breach: offset={offset:.6} offset_usd={offset_usd:.2} price={price:.4}"
            );
        } else {
            log::debug!("[ALERT] {symbol} threshold breach suppressed (cooldown)");
        }
    }

    async fn notify_force_close(&self, symbol: &str, size: f64, side: Side) {
        let cooldown = Duration::from_secs(self.cooldowns.force_close_secs);
        if self.should_send(EventKind::ForceClose, symbol, cooldown) {
            log::warn!("[FORCE CLOSE] {symbol} {side} size={size:.6}");
        } else {
            log::debug!("[FORCE CLOSE] {symbol} suppressed (cooldown)");
        }
    }

    async fn notify_system_error(&self, message: &str) {
        let cooldown = Duration::from_secs(self.cooldowns.system_error_secs);
        if self.should_send(EventKind::SystemError, "global", cooldown) {
            log::error!("[SYSTEM] {message}");
        } else {
            log::debug!("[SYSTEM] error suppressed (cooldown): {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn suppresses_repeat_within_cooldown() {
        let notifier = LoggingNotifier::new(NotificationCooldowns { threshold_secs: 120, force_close_secs: 300, system_error_secs: 30 });
        assert!(notifier.should_send(EventKind::Threshold, "SOL", Duration::from_secs(120)));
        assert!(!notifier.should_send(EventKind::Threshold, "SOL", Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn different_symbols_do_not_share_a_cooldown() {
        let notifier = LoggingNotifier::new(NotificationCooldowns::default());
        assert!(notifier.should_send(EventKind::Threshold, "SOL", Duration::from_secs(120)));
        assert!(notifier.should_send(EventKind::Threshold, "BTC", Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn allows_again_after_cooldown_elapses() {
        let notifier = LoggingNotifier::new(NotificationCooldowns::default());
        assert!(notifier.should_send(EventKind::SystemError, "global", Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(notifier.should_send(EventKind::SystemError, "global", Duration::from_millis(10)));
    }
}
