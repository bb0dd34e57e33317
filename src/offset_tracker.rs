use std::fmt;

const EPSILON: f64 = 1e-8;

/// Failure modes of the pure offset/cost-basis update. Distinct from the
/// collaborator-facing [`crate::error::HedgeError`] taxonomy: these never
/// cross an I/O boundary, so they carry no retry/severity metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetTrackerError {
    InvalidInput(String),
    NegativeCost(f64),
}

impl fmt::Display for OffsetTrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetTrackerError::InvalidInput(m) => write!(f, "invalid input: {m}"),
            OffsetTrackerError::NegativeCost(c) => write!(f, "computed negative cost basis: {c}"),
        }
    }
}

impl std::error::Error for OffsetTrackerError {}

/// Update `(offset, cost_basis)` from a fresh `(ideal, actual, price)` reading.
///
/// Every size change is treated as an additional fill of `delta` units at
/// `price`: cost basis drifts toward recent price as the residual grows,
/// stays put as it shrinks, and rebases once it crosses through zero.
pub fn update(
    ideal: f64,
    actual: f64,
    price: f64,
    old_offset: f64,
    old_cost: f64,
) -> Result<(f64, f64), OffsetTrackerError> {
    if !ideal.is_finite() || !actual.is_finite() || !price.is_finite() || !old_offset.is_finite() || !old_cost.is_finite() {
        return Err(OffsetTrackerError::InvalidInput("non-finite input".into()));
    }
    if price <= 0.0 {
        return Err(OffsetTrackerError::InvalidInput(format!("price must be positive: {price}")));
    }
    if old_cost < 0.0 {
        return Err(OffsetTrackerError::InvalidInput(format!("old cost basis must be >= 0: {old_cost}")));
    }

    let new_offset = actual - ideal;
    let delta = new_offset - old_offset;

    if delta.abs() < EPSILON {
        return Ok((new_offset, old_cost));
    }
    if new_offset.abs() < EPSILON {
        return Ok((0.0, 0.0));
    }
    if old_offset.abs() < EPSILON {
        return Ok((new_offset, price));
    }

    let new_cost = (old_offset * old_cost + delta * price) / new_offset;
    if new_cost < 0.0 {
        return Err(OffsetTrackerError::NegativeCost(new_cost));
    }
    Ok((new_offset, new_cost))
}
