//! Small numeric helpers shared by retention, analytics and the recommender

/// Running avg/min/max/count over a stream of values, with the timestamps of
/// the first and last value seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub count: i64,
    pub first_at: i64,
    pub last_at: i64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
            first_at: i64::MAX,
            last_at: i64::MIN,
        }
    }

    pub fn push(&mut self, value: f64, at: i64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.first_at = self.first_at.min(at);
        self.last_at = self.last_at.max(at);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// max - min, zero when empty
    pub fn range(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max - self.min
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation as `sqrt(E[x²] - E[x]²)`.
///
/// The variance is clamped at zero so rounding on near-constant series never
/// yields NaN.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / n;
    (mean_sq - mean * mean).max(0.0).sqrt()
}

/// Share of `values` that are `<= value`, as 0-100
pub fn percentile_rank(value: f64, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let at_or_below = values.iter().filter(|v| **v <= value).count();
    at_or_below as f64 / values.len() as f64 * 100.0
}
