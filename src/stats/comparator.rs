//! Group Comparator Module
//! Kruskal-Wallis H test across country groups with mid-rank tie handling.

use crate::data::{CombinedDataset, Country, Metric};
use log::{debug, info, warn};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::BTreeSet;
use thiserror::Error;

/// Default significance level when the caller does not override it.
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompareError {
    #[error("Insufficient data for {metric}: {usable_groups} group(s) with observations, need 2")]
    InsufficientData { metric: Metric, usable_groups: usize },
    #[error("Chi-squared distribution error: {0}")]
    Distribution(String),
}

/// Observation count of one group entering the test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupCount {
    pub country: Country,
    pub n: usize,
}

/// Outcome of the rank test for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub metric: Metric,
    pub test_statistic: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub significant: bool,
    pub degrees_of_freedom: usize,
    pub n_total: usize,
    pub groups: Vec<GroupCount>,
    /// Requested groups left out because they had no observations.
    pub excluded_groups: Vec<Country>,
}

/// Per-metric outcome: either a result or the reason none could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricComparison {
    Computed(ComparisonResult),
    NotComputable { metric: Metric, reason: String },
}

impl MetricComparison {
    pub fn metric(&self) -> Metric {
        match self {
            MetricComparison::Computed(r) => r.metric,
            MetricComparison::NotComputable { metric, .. } => *metric,
        }
    }

    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            MetricComparison::Computed(r) => Some(r),
            MetricComparison::NotComputable { .. } => None,
        }
    }
}

/// Kruskal-Wallis statistic with its tie correction already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankStatistic {
    pub h: f64,
    pub tie_correction: f64,
}

pub struct Comparator;

impl Comparator {
    /// Test whether `metric` differs across `groups` at significance `alpha`.
    ///
    /// A country listed more than once in `groups` enters the test once.
    pub fn compare(
        combined: &CombinedDataset,
        metric: Metric,
        groups: &[Country],
        alpha: f64,
    ) -> Result<ComparisonResult, CompareError> {
        let mut samples: Vec<(Country, Vec<f64>)> = Vec::with_capacity(groups.len());
        let mut excluded_groups = Vec::new();
        let mut seen = BTreeSet::new();
        for &country in groups {
            if !seen.insert(country) {
                debug!("{metric}: ignoring repeated group {country}");
                continue;
            }
            let values = combined.values_for(country, metric);
            if values.is_empty() {
                excluded_groups.push(country);
            } else {
                samples.push((country, values));
            }
        }

        if samples.len() < 2 {
            return Err(CompareError::InsufficientData {
                metric,
                usable_groups: samples.len(),
            });
        }

        let slices: Vec<&[f64]> = samples.iter().map(|(_, v)| v.as_slice()).collect();
        let stat = Self::kruskal_wallis(&slices);
        let dof = samples.len() - 1;

        let p_value = if stat.tie_correction == 0.0 {
            1.0
        } else {
            let dist = ChiSquared::new(dof as f64)
                .map_err(|e| CompareError::Distribution(e.to_string()))?;
            dist.sf(stat.h)
        };

        let result = ComparisonResult {
            metric,
            test_statistic: stat.h,
            p_value,
            alpha,
            significant: p_value < alpha,
            degrees_of_freedom: dof,
            n_total: slices.iter().map(|s| s.len()).sum(),
            groups: samples
                .iter()
                .map(|(country, v)| GroupCount {
                    country: *country,
                    n: v.len(),
                })
                .collect(),
            excluded_groups,
        };
        info!(
            "{metric}: H={:.4} p={:.4e} significant={}",
            result.test_statistic, result.p_value, result.significant
        );
        Ok(result)
    }

    /// Compare each metric independently; one metric's failure does not stop the rest.
    pub fn compare_all(
        combined: &CombinedDataset,
        metrics: &[Metric],
        groups: &[Country],
        alpha: f64,
    ) -> Vec<MetricComparison> {
        metrics
            .iter()
            .map(|&metric| match Self::compare(combined, metric, groups, alpha) {
                Ok(result) => MetricComparison::Computed(result),
                Err(e) => {
                    warn!("{metric}: not computable ({e})");
                    MetricComparison::NotComputable {
                        metric,
                        reason: e.to_string(),
                    }
                }
            })
            .collect()
    }

    /// H statistic over k samples, corrected for ties.
    ///
    /// All-identical input gives a tie correction of 0 and H = 0.
    pub fn kruskal_wallis(samples: &[&[f64]]) -> RankStatistic {
        let pooled: Vec<f64> = samples.iter().flat_map(|s| s.iter().copied()).collect();
        let n = pooled.len() as f64;
        let (ranks, tie_term) = Self::midranks(&pooled);

        let mut offset = 0;
        let mut sum = 0.0;
        for sample in samples {
            let rank_sum: f64 = ranks[offset..offset + sample.len()].iter().sum();
            sum += rank_sum * rank_sum / sample.len() as f64;
            offset += sample.len();
        }

        // rounding can leave a hair below zero when rank sums are equal
        let h = (12.0 / (n * (n + 1.0)) * sum - 3.0 * (n + 1.0)).max(0.0);
        let tie_correction = 1.0 - tie_term / (n * n * n - n);
        if tie_correction == 0.0 {
            return RankStatistic { h: 0.0, tie_correction };
        }
        RankStatistic {
            h: h / tie_correction,
            tie_correction,
        }
    }

    /// Ranks (1-based, ties averaged) in input order, plus Σ(t³ − t) over tie groups.
    pub fn midranks(values: &[f64]) -> (Vec<f64>, f64) {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

        let mut ranks = vec![0.0; values.len()];
        let mut tie_term = 0.0;
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && values[order[end]] == values[order[start]] {
                end += 1;
            }
            // positions start..end hold ranks start+1..=end
            let rank = (start + 1 + end) as f64 / 2.0;
            for &idx in &order[start..end] {
                ranks[idx] = rank;
            }
            let t = (end - start) as f64;
            tie_term += t * t * t - t;
            start = end;
        }
        (ranks, tie_term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Aggregator, Dataset, Record, Schema};
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn combined(groups: &[(Country, Vec<Option<f64>>)]) -> CombinedDataset {
        let start = NaiveDate::from_ymd_opt(2021, 8, 9)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let mut map = BTreeMap::new();
        for (country, ghi) in groups {
            let records = ghi
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let mut r = Record::empty(start + Duration::minutes(i as i64), *country);
                    r.ghi = *v;
                    r
                })
                .collect();
            map.insert(
                *country,
                Dataset::new(*country, Schema::with_metrics(&[Metric::Ghi, Metric::Dni]), records),
            );
        }
        Aggregator::merge(&map).unwrap()
    }

    const PAIR: [Country; 2] = [Country::Benin, Country::Togo];

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn midranks_average_ties() {
        let (ranks, tie_term) = Comparator::midranks(&[3.0, 1.0, 2.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![5.5, 1.5, 3.5, 1.5, 5.5, 3.5]);
        assert_eq!(tie_term, 18.0);
    }

    #[test]
    fn tied_two_group_statistic_is_exact() {
        // rank sums 6.5 and 14.5 give H = 64/21, tie correction 32/35, corrected H = 10/3
        let stat = Comparator::kruskal_wallis(&[&[1.0, 1.0, 2.0], &[2.0, 3.0, 3.0]]);
        assert!((stat.tie_correction - 32.0 / 35.0).abs() < 1e-12);
        assert!((stat.h - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn compare_reports_p_value_from_chi_squared() {
        let c = combined(&[
            (Country::Benin, some(&[1.0, 1.0, 2.0])),
            (Country::Togo, some(&[2.0, 3.0, 3.0])),
        ]);
        let result = Comparator::compare(&c, Metric::Ghi, &PAIR, DEFAULT_ALPHA).unwrap();
        assert_eq!(result.degrees_of_freedom, 1);
        assert_eq!(result.n_total, 6);
        assert_relative_eq!(result.p_value, 0.067889154861829, epsilon = 1e-9);
        assert!(!result.significant);

        let loose = Comparator::compare(&c, Metric::Ghi, &PAIR, 0.1).unwrap();
        assert!(loose.significant);
    }

    #[test]
    fn well_separated_groups_are_significant() {
        let low: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let high: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let mid: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
        let c = combined(&[
            (Country::Benin, some(&low)),
            (Country::SierraLeone, some(&mid)),
            (Country::Togo, some(&high)),
        ]);

        let result = Comparator::compare(&c, Metric::Ghi, &Country::ALL, DEFAULT_ALPHA).unwrap();
        assert_eq!(result.degrees_of_freedom, 2);
        assert!(result.p_value < 1e-10);
        assert!(result.significant);
    }

    #[test]
    fn identical_observations_are_not_significant() {
        let c = combined(&[
            (Country::Benin, some(&[5.0, 5.0])),
            (Country::Togo, some(&[5.0, 5.0, 5.0])),
        ]);
        let result = Comparator::compare(&c, Metric::Ghi, &PAIR, DEFAULT_ALPHA).unwrap();
        assert_eq!(result.test_statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn empty_group_is_excluded() {
        let c = combined(&[
            (Country::Benin, vec![None, None]),
            (Country::SierraLeone, some(&[1.0, 2.0])),
            (Country::Togo, some(&[3.0, 4.0])),
        ]);
        let result = Comparator::compare(&c, Metric::Ghi, &Country::ALL, DEFAULT_ALPHA).unwrap();
        assert_eq!(result.excluded_groups, vec![Country::Benin]);
        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.n_total, 4);
    }

    #[test]
    fn single_usable_group_is_insufficient() {
        let c = combined(&[
            (Country::Benin, vec![None]),
            (Country::Togo, some(&[3.0, 4.0])),
        ]);
        let err = Comparator::compare(&c, Metric::Ghi, &PAIR, DEFAULT_ALPHA).unwrap_err();
        assert_eq!(
            err,
            CompareError::InsufficientData {
                metric: Metric::Ghi,
                usable_groups: 1
            }
        );
    }

    #[test]
    fn repeated_groups_count_once() {
        let c = combined(&[
            (Country::Benin, some(&[1.0, 2.0])),
            (Country::Togo, some(&[3.0, 4.0])),
        ]);
        let benin_twice = [Country::Benin, Country::Benin];
        let err = Comparator::compare(&c, Metric::Ghi, &benin_twice, DEFAULT_ALPHA).unwrap_err();
        assert_eq!(
            err,
            CompareError::InsufficientData {
                metric: Metric::Ghi,
                usable_groups: 1
            }
        );

        let groups = [Country::Benin, Country::Togo, Country::Benin];
        let result = Comparator::compare(&c, Metric::Ghi, &groups, DEFAULT_ALPHA).unwrap();
        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.degrees_of_freedom, 1);
        assert_eq!(result.n_total, 4);
    }

    #[test]
    fn compare_all_keeps_going_past_failures() {
        let c = combined(&[
            (Country::Benin, some(&[1.0, 2.0])),
            (Country::Togo, some(&[3.0, 4.0])),
        ]);
        let out = Comparator::compare_all(
            &c,
            &[Metric::Dni, Metric::Ghi],
            &[Country::Benin, Country::Togo],
            DEFAULT_ALPHA,
        );
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], MetricComparison::NotComputable { metric: Metric::Dni, .. }));
        assert!(out[1].result().is_some());
    }
}
