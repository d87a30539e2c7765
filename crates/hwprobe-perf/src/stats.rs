//! Benchmark sample statistics.

/// Compares floats with a tolerance scaled to their magnitude, `ulp` units in the last place.
///
/// Differences below the smallest normal value compare equal.
pub fn almost_equal(x: f64, y: f64, ulp: u32) -> bool {
    let diff = (x - y).abs();
    diff <= f64::EPSILON * (x + y).abs() * f64::from(ulp) || diff < f64::MIN_POSITIVE
}

/// Incremental mean and variance (Welford; Knuth TAOCP vol. 2, 3rd ed., p. 232).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean = x;
            self.m2 = 0.0;
        } else {
            let prev_mean = self.mean;
            self.mean += (x - prev_mean) / self.count as f64;
            self.m2 += (x - prev_mean) * (x - self.mean);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; zero with fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl PartialEq for RunningStat {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && almost_equal(self.mean, other.mean, 2)
            && almost_equal(self.m2, other.m2, 2)
    }
}

impl Extend<f64> for RunningStat {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}

impl FromIterator<f64> for RunningStat {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stat = Self::new();
        stat.extend(iter);
        stat
    }
}

/// Which side of the median the middle half of the samples leans towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Shape {
    Symmetric,
    /// The first quartile is further from the median than the third.
    Left,
    /// The third quartile is further from the median than the first.
    Right,
}

/// Inner quartile spreads within this fraction of the IQR count as symmetric.
const SYMMETRY_TOLERANCE: f64 = 0.1;

/// Order statistics and moments of a sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub first_quartile: f64,
    pub median: f64,
    pub third_quartile: f64,
    pub shape: Shape,
}

impl Summary {
    pub fn interquartile_range(&self) -> f64 {
        self.third_quartile - self.first_quartile
    }
}

/// A growable set of samples.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    values: Vec<f64>,
    running: RunningStat,
}

impl Samples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            running: RunningStat::new(),
        }
    }

    /// Adds a sample. NaN samples are ignored.
    pub fn push(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.values.push(x);
        self.running.push(x);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `None` when there are no samples.
    pub fn summary(&self) -> Option<Summary> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);

        let first_quartile = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let third_quartile = quantile(&sorted, 0.75);

        Some(Summary {
            count: self.running.len(),
            mean: self.running.mean(),
            std_dev: self.running.std_dev(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            first_quartile,
            median,
            third_quartile,
            shape: shape(first_quartile, median, third_quartile),
        })
    }
}

impl Extend<f64> for Samples {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}

impl FromIterator<f64> for Samples {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut samples = Self::new();
        samples.extend(iter);
        samples
    }
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn shape(q1: f64, median: f64, q3: f64) -> Shape {
    let lower = median - q1;
    let upper = q3 - median;
    let iqr = q3 - q1;
    if (upper - lower).abs() <= iqr * SYMMETRY_TOLERANCE {
        Shape::Symmetric
    } else if lower > upper {
        Shape::Left
    } else {
        Shape::Right
    }
}
