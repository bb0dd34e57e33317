/// Offset bucket relative to the threshold band. `In(n)` is bucket `n`
/// (0-indexed from `threshold_min_usd`); `Breach` means `|offset_usd|`
/// exceeded `threshold_max_usd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Safe,
    In(u32),
    Breach,
}

impl Zone {
    pub fn is_breach(self) -> bool {
        matches!(self, Zone::Breach)
    }
}

/// Classify `offset_usd` into a threshold bucket.
pub fn classify(offset_usd: f64, min: f64, max: f64, step: f64) -> Zone {
    let abs = offset_usd.abs();
    if abs < min {
        Zone::Safe
    } else if abs > max {
        Zone::Breach
    } else {
        Zone::In(((abs - min) / step).floor() as u32)
    }
}

/// Inclusive `offset_usd` bounds of a bucket, for diagnostics. `Breach`'s
/// lower bound is `max`; it has no upper bound.
pub fn zone_range(zone: Zone, min: f64, max: f64, step: f64) -> (f64, Option<f64>) {
    match zone {
        Zone::Safe => (0.0, Some(min)),
        Zone::In(n) => {
            let lower = min + step * n as f64;
            (lower, Some((lower + step).min(max)))
        }
        Zone::Breach => (max, None),
    }
}
