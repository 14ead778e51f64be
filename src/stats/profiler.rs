//! Column Profiler
//! Missingness and descriptive statistics per column, used to pick cleaning decisions.

use super::calculator::StatsCalculator;
use crate::data::{Dataset, Metric};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Quartiles of a column's non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Profile of one metric column. `None` marks a statistic that is undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub n: usize,
    pub missing_count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quartiles: Option<Quartiles>,
}

impl ColumnProfile {
    /// Share of records missing this column, in percent. Zero for an empty dataset.
    pub fn missing_pct(&self) -> f64 {
        let total = self.n + self.missing_count;
        if total == 0 {
            0.0
        } else {
            100.0 * self.missing_count as f64 / total as f64
        }
    }
}

pub struct Profiler;

impl Profiler {
    /// Profile every metric column of the dataset's schema.
    pub fn profile(dataset: &Dataset) -> BTreeMap<Metric, ColumnProfile> {
        dataset
            .schema()
            .metrics()
            .iter()
            .map(|&metric| (metric, Self::profile_column(dataset, metric)))
            .collect()
    }

    fn profile_column(dataset: &Dataset, metric: Metric) -> ColumnProfile {
        let values = dataset.values(metric);
        let d = StatsCalculator::describe(&values);
        let quartiles = match (d.q1, d.median, d.q3) {
            (Some(q1), Some(median), Some(q3)) => Some(Quartiles { q1, median, q3 }),
            _ => None,
        };
        let profile = ColumnProfile {
            n: d.count,
            missing_count: dataset.len() - values.len(),
            mean: d.mean,
            std: d.std,
            min: d.min,
            max: d.max,
            quartiles,
        };
        debug!(
            "{} {metric}: n={} missing={} mean={:?}",
            dataset.country(),
            profile.n,
            profile.missing_count,
            profile.mean
        );
        profile
    }

    /// Columns whose missing share exceeds `pct` percent.
    pub fn columns_above_missing(
        profiles: &BTreeMap<Metric, ColumnProfile>,
        pct: f64,
    ) -> Vec<Metric> {
        profiles
            .iter()
            .filter(|(_, p)| p.missing_pct() > pct)
            .map(|(m, _)| *m)
            .collect()
    }
}
