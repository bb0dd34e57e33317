use std::fmt;

/// Behavioural severity, independent of the Rust type carrying the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    Critical,
}

/// Error taxonomy for the hedging loop. Every collaborator-facing failure is
/// classified into one of these kinds so the cycle runner can decide whether
/// to retry, back off, notify, or shut down.
#[derive(Debug)]
pub enum HedgeError {
    /// Bad or missing configuration. Always fatal, always at startup.
    Config(String),
    /// Transport-level failure talking to a venue or pool collaborator.
    RecoverableIo { message: String, retry_after_secs: u64, max_retries: u32 },
    /// Collaborator responded with a rate-limit signal.
    RateLimit { message: String, retry_after_secs: u64 },
    /// A circuit breaker for some collaborator class is open.
    CircuitOpen { collaborator: String, reset_after_secs: u64 },
    /// Venue rejected an order (min size, bad price, etc).
    OrderRejected { symbol: String, message: String },
    /// StateStore invariant violated, or venue/state disagreement that cannot
    /// be safely reconciled.
    InconsistentState(String),
    /// Anything else; treated the same as RecoverableIo.
    Unknown(String),
}

impl HedgeError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HedgeError::Config(_) => ErrorSeverity::Critical,
            HedgeError::RecoverableIo { .. } => ErrorSeverity::Medium,
            HedgeError::RateLimit { .. } => ErrorSeverity::Low,
            HedgeError::CircuitOpen { .. } => ErrorSeverity::Medium,
            HedgeError::OrderRejected { .. } => ErrorSeverity::Medium,
            HedgeError::InconsistentState(_) => ErrorSeverity::Critical,
            HedgeError::Unknown(_) => ErrorSeverity::Medium,
        }
    }

    pub fn retry_after_secs(&self) -> u64 {
        match self {
            HedgeError::Config(_) => 0,
            HedgeError::RecoverableIo { retry_after_secs, .. } => *retry_after_secs,
            HedgeError::RateLimit { retry_after_secs, .. } => *retry_after_secs,
            HedgeError::CircuitOpen { reset_after_secs, .. } => *reset_after_secs,
            HedgeError::OrderRejected { .. } => 0,
            HedgeError::InconsistentState(_) => 0,
            HedgeError::Unknown(_) => 5,
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            HedgeError::RecoverableIo { max_retries, .. } => *max_retries,
            HedgeError::RateLimit { .. } => 1,
            HedgeError::Unknown(_) => 3,
            _ => 0,
        }
    }

    pub fn should_notify(&self) -> bool {
        matches!(
            self,
            HedgeError::InconsistentState(_) | HedgeError::OrderRejected { .. }
        )
    }

    /// Whether this error should propagate out of the cycle and reach the
    /// cycle runner (as opposed to being absorbed into a per-action result).
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    pub fn recoverable_io(message: impl Into<String>) -> Self {
        HedgeError::RecoverableIo { message: message.into(), retry_after_secs: 2, max_retries: 5 }
    }
}

impl fmt::Display for HedgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeError::Config(m) => write!(f, "config error: {m}"),
            HedgeError::RecoverableIo { message, .. } => write!(f, "recoverable I/O error: {message}"),
            HedgeError::RateLimit { message, .. } => write!(f, "rate limited: {message}"),
            HedgeError::CircuitOpen { collaborator, .. } => write!(f, "circuit open for {collaborator}"),
            HedgeError::OrderRejected { symbol, message } => write!(f, "order rejected for {symbol}: {message}"),
            HedgeError::InconsistentState(m) => write!(f, "inconsistent state: {m}"),
            HedgeError::Unknown(m) => write!(f, "unknown error: {m}"),
        }
    }
}

impl std::error::Error for HedgeError {}
