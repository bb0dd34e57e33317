use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::order_math::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Partial,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub filled_size: f64,
    pub filled_price: f64,
    pub filled_at: DateTime<Utc>,
}

/// Venue-facing error. Distinct from [`crate::error::HedgeError`]: the
/// Executor classifies these into the broader taxonomy at the call site.
#[derive(Debug, Clone)]
pub enum VenueError {
    MinOrderValue { value_usd: f64, min_usd: f64 },
    MinBaseAmount { base_amount: f64 },
    Rejected(String),
    Transport(String),
    Timeout,
    Unknown(String),
}

impl fmt::Display for VenueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueError::MinOrderValue { value_usd, min_usd } => {
                write!(f, "order value {value_usd:.2} below minimum {min_usd:.2}")
            }
            VenueError::MinBaseAmount { base_amount } => {
                write!(f, "base amount {base_amount} below venue minimum of 1")
            }
            VenueError::Rejected(m) => write!(f, "order rejected: {m}"),
            VenueError::Transport(m) => write!(f, "transport error: {m}"),
            VenueError::Timeout => write!(f, "venue call timed out"),
            VenueError::Unknown(m) => write!(f, "unknown venue error: {m}"),
        }
    }
}

impl std::error::Error for VenueError {}

/// Capability surface exposed to Executor/Preparer. Implementations own all
/// "1000X" scaled-market handling: size/1000 and price*1000 at this
/// boundary, in both directions; the core never sees scaled units.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<f64, VenueError>;
    async fn get_position(&self, symbol: &str) -> Result<f64, VenueError>;
    async fn place_limit_order(&self, symbol: &str, side: Side, size: f64, price: f64) -> Result<String, VenueError>;
    async fn place_market_order(&self, symbol: &str, side: Side, size: f64) -> Result<String, VenueError>;
    async fn cancel_all_orders(&self, symbol: &str) -> Result<u32, VenueError>;
    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, VenueError>;
    async fn list_recent_fills(&self, symbol: Option<&str>, window_minutes: f64) -> Result<Vec<Fill>, VenueError>;
    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus, VenueError>;
}

struct SimOrder {
    order: Order,
    status: OrderStatus,
}

/// In-memory simulated venue. Deterministic: prices and positions are
/// supplied by the test/caller rather than fetched over the network; orders
/// are tracked in a simple map and default to `Open` until explicitly
/// resolved via [`SimVenue::fill_order`]/[`SimVenue::reject_order`].
pub struct SimVenue {
    mid_prices: Mutex<HashMap<String, f64>>,
    positions: Mutex<HashMap<String, f64>>,
    orders: Mutex<HashMap<String, SimOrder>>,
    next_order_id: AtomicU64,
    thousand_x_markets: Vec<String>,
}

impl SimVenue {
    pub fn new() -> Self {
        Self {
            mid_prices: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
            thousand_x_markets: Vec::new(),
        }
    }

    pub fn with_thousand_x_markets(mut self, symbols: Vec<String>) -> Self {
        self.thousand_x_markets = symbols;
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.mid_prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_position(&self, symbol: &str, position: f64) {
        self.positions.lock().unwrap().insert(symbol.to_string(), position);
    }

    pub fn fill_order(&self, order_id: &str) {
        if let Some(o) = self.orders.lock().unwrap().get_mut(order_id) {
            o.status = OrderStatus::Filled;
        }
    }

    pub fn reject_order(&self, order_id: &str) {
        if let Some(o) = self.orders.lock().unwrap().get_mut(order_id) {
            o.status = OrderStatus::Rejected;
        }
    }

    fn is_thousand_x(&self, symbol: &str) -> bool {
        self.thousand_x_markets.iter().any(|s| s == symbol)
    }

    fn next_id(&self) -> String {
        format!("sim-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SimVenue {
    fn default() -> Self {
        Self::new()
    }
}

const MIN_ORDER_VALUE_USD: f64 = 10.0;

#[async_trait]
impl VenueAdapter for SimVenue {
    async fn get_price(&self, symbol: &str) -> Result<f64, VenueError> {
        let wire_price = *self
            .mid_prices
            .lock()
            .unwrap()
            .get(symbol)
            .ok_or_else(|| VenueError::Unknown(format!("no price set for {symbol}")))?;
        Ok(if self.is_thousand_x(symbol) { wire_price / 1000.0 } else { wire_price })
    }

    async fn get_position(&self, symbol: &str) -> Result<f64, VenueError> {
        let wire_position = *self.positions.lock().unwrap().get(symbol).unwrap_or(&0.0);
        Ok(if self.is_thousand_x(symbol) { wire_position * 1000.0 } else { wire_position })
    }

    async fn place_limit_order(&self, symbol: &str, side: Side, size: f64, price: f64) -> Result<String, VenueError> {
        let value_usd = size * price;
        if value_usd < MIN_ORDER_VALUE_USD {
            return Err(VenueError::MinOrderValue { value_usd, min_usd: MIN_ORDER_VALUE_USD });
        }
        let base_amount = if self.is_thousand_x(symbol) { size / 1000.0 } else { size };
        if base_amount.floor() < 1.0 {
            return Err(VenueError::MinBaseAmount { base_amount });
        }

        let wire_price = if self.is_thousand_x(symbol) { price * 1000.0 } else { price };
        let order_id = self.next_id();
        self.orders.lock().unwrap().insert(
            order_id.clone(),
            SimOrder {
                order: Order {
                    order_id: order_id.clone(),
                    symbol: symbol.to_string(),
                    side,
                    size,
                    price: wire_price,
                    created_at: Utc::now(),
                },
                status: OrderStatus::Open,
            },
        );
        Ok(order_id)
    }

    async fn place_market_order(&self, symbol: &str, side: Side, size: f64) -> Result<String, VenueError> {
        let mid = self.get_price(symbol).await?;
        // Synthesised as an IOC limit at +/-0.2% from mid, immediately filled.
        let price = match side {
            Side::Buy => mid * 1.002,
            Side::Sell => mid * 0.998,
        };
        let order_id = self.next_id();
        self.orders.lock().unwrap().insert(
            order_id.clone(),
            SimOrder {
                order: Order { order_id: order_id.clone(), symbol: symbol.to_string(), side, size, price, created_at: Utc::now() },
                status: OrderStatus::Filled,
            },
        );
        let mut positions = self.positions.lock().unwrap();
        let delta = match side {
            Side::Buy => size,
            Side::Sell => -size,
        };
        let wire_delta = if self.is_thousand_x(symbol) { delta / 1000.0 } else { delta };
        *positions.entry(symbol.to_string()).or_insert(0.0) += wire_delta;
        Ok(order_id)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<u32, VenueError> {
        let mut orders = self.orders.lock().unwrap();
        let mut count = 0;
        for o in orders.values_mut() {
            if o.order.symbol == symbol && o.status == OrderStatus::Open {
                o.status = OrderStatus::Cancelled;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, VenueError> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Open)
            .filter(|o| symbol.map(|s| s == o.order.symbol).unwrap_or(true))
            .map(|o| o.order.clone())
            .collect())
    }

    async fn list_recent_fills(&self, symbol: Option<&str>, _window_minutes: f64) -> Result<Vec<Fill>, VenueError> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .values()
            .filter(|o| matches!(o.status, OrderStatus::Filled | OrderStatus::Partial))
            .filter(|o| symbol.map(|s| s == o.order.symbol).unwrap_or(true))
            .map(|o| Fill {
                order_id: o.order.order_id.clone(),
                symbol: o.order.symbol.clone(),
                side: o.order.side,
                filled_size: o.order.size,
                filled_price: o.order.price,
                filled_at: o.order.created_at,
            })
            .collect())
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus, VenueError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .map(|o| o.status)
            .ok_or_else(|| VenueError::Unknown(format!("unknown order_id {order_id}")))
    }
}

/// Stamp used by the Executor's double-check confirmation delay.
pub fn now() -> Instant {
    Instant::now()
}
