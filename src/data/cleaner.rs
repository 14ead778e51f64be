//! Data Cleaner Module
//! Z-score outlier detection with explicit per-column drop/impute decisions.

use super::model::{Dataset, Metric};
use crate::stats::StatsCalculator;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default |z| above which a value is an outlier.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// How flagged or missing values of a column are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleaningMethod {
    /// Replace with the column median of non-outlier values.
    Impute,
    /// Remove the whole record.
    Drop,
}

/// Caller-supplied cleaning policy for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleaningDecision {
    pub method: CleaningMethod,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

impl CleaningDecision {
    pub fn impute() -> Self {
        Self {
            method: CleaningMethod::Impute,
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    pub fn drop() -> Self {
        Self {
            method: CleaningMethod::Drop,
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// What cleaning did to one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnCleaning {
    pub n_outliers_detected: usize,
    pub n_missing: usize,
    pub n_records_dropped: usize,
    pub n_imputed: usize,
    /// Missing values left in place because the column had no usable median.
    pub n_unresolved: usize,
}

/// Mandatory account of everything the cleaner and loader discarded or changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub rejected_timestamps: usize,
    pub rejected_values: usize,
    pub columns: BTreeMap<Metric, ColumnCleaning>,
    /// Decisions naming a column the dataset does not have.
    pub skipped_decisions: Vec<Metric>,
}

impl CleaningReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }
}

/// Per-column statistics computed once on the input dataset.
struct ColumnPlan {
    metric: Metric,
    decision: CleaningDecision,
    mean: f64,
    std: f64,
    median: Option<f64>,
}

impl ColumnPlan {
    fn is_outlier(&self, value: f64) -> bool {
        if self.std == 0.0 || !self.std.is_finite() {
            return false;
        }
        ((value - self.mean) / self.std).abs() > self.decision.threshold
    }
}

enum Verdict {
    Keep,
    Outlier,
    Missing,
}

pub struct Cleaner;

impl Cleaner {
    /// Produce a cleaned copy of `dataset`. Columns without a decision pass through untouched.
    pub fn clean(
        dataset: &Dataset,
        decisions: &BTreeMap<Metric, CleaningDecision>,
    ) -> (Dataset, CleaningReport) {
        let mut plans = Vec::with_capacity(decisions.len());
        let mut skipped_decisions = Vec::new();
        for (&metric, &decision) in decisions {
            if dataset.schema().contains(metric) {
                plans.push(Self::plan(dataset, metric, decision));
            } else {
                warn!(
                    "{}: no {metric} column, skipping its cleaning decision",
                    dataset.country()
                );
                skipped_decisions.push(metric);
            }
        }

        let load = dataset.load_report();
        let mut report = CleaningReport {
            rows_in: dataset.len(),
            rejected_timestamps: load.rejected_timestamps,
            rejected_values: load.rejected_values,
            columns: plans
                .iter()
                .map(|p| (p.metric, ColumnCleaning::default()))
                .collect(),
            skipped_decisions,
            ..CleaningReport::default()
        };

        let mut records = Vec::with_capacity(dataset.len());
        for record in dataset.records() {
            let mut cleaned = record.clone();
            let mut drop_record = false;

            for plan in &plans {
                let verdict = match plan.metric.get(record) {
                    None => Verdict::Missing,
                    Some(v) if plan.is_outlier(v) => Verdict::Outlier,
                    Some(_) => Verdict::Keep,
                };
                let Some(column) = report.columns.get_mut(&plan.metric) else {
                    continue;
                };
                match verdict {
                    Verdict::Keep => continue,
                    Verdict::Outlier => column.n_outliers_detected += 1,
                    Verdict::Missing => column.n_missing += 1,
                }

                match plan.decision.method {
                    CleaningMethod::Drop => {
                        column.n_records_dropped += 1;
                        drop_record = true;
                    }
                    CleaningMethod::Impute => match plan.median {
                        Some(median) => {
                            plan.metric.set(&mut cleaned, Some(median));
                            column.n_imputed += 1;
                        }
                        None => {
                            plan.metric.set(&mut cleaned, None);
                            column.n_unresolved += 1;
                        }
                    },
                }
            }

            if !drop_record {
                records.push(cleaned);
            }
        }

        report.rows_out = records.len();
        for (metric, column) in &report.columns {
            debug!(
                "{} {metric}: outliers={} missing={} dropped={} imputed={}",
                dataset.country(),
                column.n_outliers_detected,
                column.n_missing,
                column.n_records_dropped,
                column.n_imputed
            );
        }
        info!(
            "{}: cleaned {} -> {} rows",
            dataset.country(),
            report.rows_in,
            report.rows_out
        );

        let cleaned = Dataset::new(dataset.country(), dataset.schema().clone(), records)
            .with_load_report(load.clone());
        (cleaned, report)
    }

    fn plan(dataset: &Dataset, metric: Metric, decision: CleaningDecision) -> ColumnPlan {
        let values = dataset.values(metric);
        let mean = StatsCalculator::mean(&values).unwrap_or(0.0);
        let std = StatsCalculator::sample_std(&values).unwrap_or(0.0);
        let mut plan = ColumnPlan {
            metric,
            decision,
            mean,
            std,
            median: None,
        };
        let inliers: Vec<f64> = values.iter().copied().filter(|v| !plan.is_outlier(*v)).collect();
        plan.median = StatsCalculator::median(&inliers);
        plan
    }
}
