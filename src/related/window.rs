use serde_json::Value;

use crate::graph::to_number;

/// Symmetric open interval `(center - half_width, center + half_width)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub center: f64,
    pub half_width: f64,
}

impl TimeWindow {
    pub fn new(center: f64, half_width: f64) -> Self {
        Self { center, half_width }
    }

    /// Window around a stored timestamp; `None` when the value is missing or not numeric.
    pub fn around(value: Option<&Value>, half_width: f64) -> Option<Self> {
        value.and_then(to_number).map(|center| Self::new(center, half_width))
    }

    /// Both bounds are exclusive.
    pub fn contains(&self, t: f64) -> bool {
        t > self.center - self.half_width && t < self.center + self.half_width
    }

    /// A missing or non-numeric timestamp is never inside.
    pub fn admits(&self, value: Option<&Value>) -> bool {
        value.and_then(to_number).map_or(false, |t| self.contains(t))
    }
}
