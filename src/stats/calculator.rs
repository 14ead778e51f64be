//! Statistics Calculator Module
//! Descriptive statistics over the non-missing values of a column.

use serde::Serialize;

/// Descriptive statistics for a set of values. Undefined entries are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptive {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
}

impl Default for Descriptive {
    fn default() -> Self {
        Self {
            count: 0,
            mean: None,
            median: None,
            std: None,
            min: None,
            max: None,
            q1: None,
            q3: None,
        }
    }
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn describe(values: &[f64]) -> Descriptive {
        let n = values.len();
        if n == 0 {
            return Descriptive::default();
        }

        let sorted = Self::sorted(values);
        let mean = Self::mean(values);

        Descriptive {
            count: n,
            mean,
            median: Self::median_sorted(&sorted),
            std: Self::sample_std(values),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            q1: Self::percentile(&sorted, 25.0),
            q3: Self::percentile(&sorted, 75.0),
        }
    }

    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Sample standard deviation (ddof = 1). A single value has zero spread.
    pub fn sample_std(values: &[f64]) -> Option<f64> {
        let n = values.len();
        let mean = Self::mean(values)?;
        if n == 1 {
            return Some(0.0);
        }
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(variance.sqrt())
    }

    pub fn median(values: &[f64]) -> Option<f64> {
        Self::median_sorted(&Self::sorted(values))
    }

    fn median_sorted(sorted: &[f64]) -> Option<f64> {
        let n = sorted.len();
        if n == 0 {
            None
        } else if n % 2 == 0 {
            Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
        } else {
            Some(sorted[n / 2])
        }
    }

    pub fn sorted(values: &[f64]) -> Vec<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
        let n = sorted_values.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(sorted_values[0]);
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            Some(sorted_values[lower])
        } else {
            Some(sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn describe_empty_is_undefined() {
        let d = StatsCalculator::describe(&[]);
        assert_eq!(d.count, 0);
        assert!(d.mean.is_none() && d.std.is_none() && d.q1.is_none());
    }

    #[test]
    fn describe_matches_pandas() {
        let d = StatsCalculator::describe(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(d.mean, Some(2.5));
        assert_eq!(d.median, Some(2.5));
        assert_eq!(d.min, Some(1.0));
        assert_eq!(d.max, Some(4.0));
        assert_eq!(d.q1, Some(1.75));
        assert_eq!(d.q3, Some(3.25));
        assert_relative_eq!(d.std.unwrap(), 1.2909944487358056, epsilon = 1e-12);
    }

    #[test]
    fn single_value_has_zero_std() {
        assert_eq!(StatsCalculator::sample_std(&[7.0]), Some(0.0));
        assert_eq!(StatsCalculator::median(&[7.0]), Some(7.0));
    }
}
