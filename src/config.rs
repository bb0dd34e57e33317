use std::collections::HashMap;
use std::env;

use crate::error::HedgeError;

#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    pub min_usd: f64,
    pub max_usd: f64,
    pub step_usd: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { min_usd: 5.0, max_usd: 20.0, step_usd: 2.5 }
    }
}

impl ThresholdConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if self.min_usd <= 0.0 {
            errors.push(format!("threshold_min_usd must be positive, got {}", self.min_usd));
        }
        if self.max_usd <= 0.0 {
            errors.push(format!("threshold_max_usd must be positive, got {}", self.max_usd));
        }
        if self.min_usd >= self.max_usd {
            errors.push(format!(
                "threshold_min_usd ({}) must be less than threshold_max_usd ({})",
                self.min_usd, self.max_usd
            ));
        }
        if self.step_usd <= 0.0 {
            errors.push(format!("threshold_step_usd must be positive, got {}", self.step_usd));
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub close_ratio: f64,
    pub order_price_offset_pct: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self { close_ratio: 40.0, order_price_offset_pct: 0.2 }
    }
}

impl OrderConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if !(self.close_ratio > 0.0 && self.close_ratio <= 100.0) {
            errors.push(format!("close_ratio must be in (0, 100], got {}", self.close_ratio));
        }
        if self.order_price_offset_pct < 0.0 {
            errors.push(format!("order_price_offset_pct must be >= 0, got {}", self.order_price_offset_pct));
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub timeout_minutes: f64,
    pub cooldown_after_fill_minutes: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { timeout_minutes: 20.0, cooldown_after_fill_minutes: 5.0 }
    }
}

impl TimeoutConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if self.timeout_minutes <= 0.0 {
            errors.push(format!("timeout_minutes must be positive, got {}", self.timeout_minutes));
        }
        if self.cooldown_after_fill_minutes < 0.0 {
            errors.push(format!(
                "cooldown_after_fill_minutes must be >= 0, got {}",
                self.cooldown_after_fill_minutes
            ));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    pub jlp_amount: f64,
    pub alp_amount: f64,
}

impl PoolConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if self.jlp_amount < 0.0 {
            errors.push(format!("jlp_amount cannot be negative, got {}", self.jlp_amount));
        }
        if self.alp_amount < 0.0 {
            errors.push(format!("alp_amount cannot be negative, got {}", self.alp_amount));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolOffsets {
    /// Additive correction to reported venue position.
    pub initial_offset: HashMap<String, f64>,
    /// Additive correction to the computed offset; does not affect cost basis.
    pub predefined_offset: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_tokens: f64,
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { max_tokens: 10.0, refill_rate: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 2, open_timeout_secs: 30 }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationCooldowns {
    pub threshold_secs: u64,
    pub force_close_secs: u64,
    pub system_error_secs: u64,
}

impl Default for NotificationCooldowns {
    fn default() -> Self {
        Self { threshold_secs: 120, force_close_secs: 300, system_error_secs: 30 }
    }
}

/// Aggregate configuration for one engine instance. Loaded once at startup
/// from the process environment (optionally populated by a `.env` file) and
/// validated before the cycle runner is constructed.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threshold: ThresholdConfig,
    pub order: OrderConfig,
    pub timeout: TimeoutConfig,
    pub pool: PoolConfig,
    pub symbol_offsets: SymbolOffsets,
    pub symbol_aliases: HashMap<String, String>,
    pub cycle_interval_secs: u64,
    pub venue_timeout_secs: u64,
    pub max_consecutive_errors: u32,
    pub venue_rate_limiter: RateLimiterConfig,
    pub pool_rate_limiter: RateLimiterConfig,
    pub notifier_rate_limiter: RateLimiterConfig,
    pub venue_circuit_breaker: CircuitBreakerConfig,
    pub pool_circuit_breaker: CircuitBreakerConfig,
    pub notifier_circuit_breaker: CircuitBreakerConfig,
    pub notification_cooldowns: NotificationCooldowns,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut symbol_aliases = HashMap::new();
        symbol_aliases.insert("WBTC".to_string(), "BTC".to_string());
        symbol_aliases.insert("BONK".to_string(), "1000BONK".to_string());

        Self {
            threshold: ThresholdConfig::default(),
            order: OrderConfig::default(),
            timeout: TimeoutConfig::default(),
            pool: PoolConfig::default(),
            symbol_offsets: SymbolOffsets::default(),
            symbol_aliases,
            cycle_interval_secs: 60,
            venue_timeout_secs: 30,
            max_consecutive_errors: 10,
            venue_rate_limiter: RateLimiterConfig::default(),
            pool_rate_limiter: RateLimiterConfig::default(),
            notifier_rate_limiter: RateLimiterConfig { max_tokens: 5.0, refill_rate: 0.5 },
            venue_circuit_breaker: CircuitBreakerConfig::default(),
            pool_circuit_breaker: CircuitBreakerConfig::default(),
            notifier_circuit_breaker: CircuitBreakerConfig::default(),
            notification_cooldowns: NotificationCooldowns::default(),
        }
    }
}

impl EngineConfig {
    /// Validates every sub-config and aggregates every violation found into
    /// a single `Config` error, rather than failing on the first one.
    pub fn validate(&self) -> Result<(), HedgeError> {
        let mut errors = Vec::new();
        self.threshold.validate(&mut errors);
        self.order.validate(&mut errors);
        self.timeout.validate(&mut errors);
        self.pool.validate(&mut errors);
        if self.pool.jlp_amount == 0.0 && self.pool.alp_amount == 0.0 {
            errors.push("at least one of jlp_amount/alp_amount must be positive".to_string());
        }
        if self.cycle_interval_secs == 0 {
            errors.push("cycle_interval_secs must be positive".to_string());
        }
        if self.max_consecutive_errors == 0 {
            errors.push("max_consecutive_errors must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HedgeError::Config(errors.join("; ")))
        }
    }

    /// Builds config from environment variables, falling back to defaults.
    /// Call `dotenvy::dotenv().ok()` before this to pick up a `.env` file.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            threshold: ThresholdConfig {
                min_usd: env_f64("THRESHOLD_MIN_USD", defaults.threshold.min_usd),
                max_usd: env_f64("THRESHOLD_MAX_USD", defaults.threshold.max_usd),
                step_usd: env_f64("THRESHOLD_STEP_USD", defaults.threshold.step_usd),
            },
            order: OrderConfig {
                close_ratio: env_f64("CLOSE_RATIO", defaults.order.close_ratio),
                order_price_offset_pct: env_f64(
                    "ORDER_PRICE_OFFSET_PCT",
                    defaults.order.order_price_offset_pct,
                ),
            },
            timeout: TimeoutConfig {
                timeout_minutes: env_f64("TIMEOUT_MINUTES", defaults.timeout.timeout_minutes),
                cooldown_after_fill_minutes: env_f64(
                    "COOLDOWN_AFTER_FILL_MINUTES",
                    defaults.timeout.cooldown_after_fill_minutes,
                ),
            },
            pool: PoolConfig {
                jlp_amount: env_f64("JLP_AMOUNT", defaults.pool.jlp_amount),
                alp_amount: env_f64("ALP_AMOUNT", defaults.pool.alp_amount),
            },
            cycle_interval_secs: env_u64("CYCLE_INTERVAL_SECS", defaults.cycle_interval_secs),
            venue_timeout_secs: env_u64("VENUE_TIMEOUT_SECS", defaults.venue_timeout_secs),
            max_consecutive_errors: env_u64(
                "MAX_CONSECUTIVE_ERRORS",
                defaults.max_consecutive_errors as u64,
            ) as u32,
            ..defaults
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
