//! Aggregator Module
//! Merges cleaned per-country datasets and computes grouped summaries.

use super::model::{Country, Dataset, Metric, Record, Schema, SemanticType, COUNTRY_COLUMN};
use crate::stats::StatsCalculator;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("Schema mismatch: {country} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        country: Country,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Dataset keyed as {key} holds records of {actual}")]
    CountryMismatch { key: Country, actual: Country },
    #[error("No datasets to merge")]
    NoDatasets,
}

/// All countries' records in one table, tagged by country.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedDataset {
    schema: Schema,
    countries: Vec<Country>,
    records: Vec<Record>,
}

impl CombinedDataset {
    /// Metric schema shared by every contributing dataset.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Columns of the shared schema followed by the `country` discriminant.
    pub fn columns(&self) -> Vec<(&'static str, SemanticType)> {
        let mut columns = self.schema.columns();
        columns.push((COUNTRY_COLUMN, SemanticType::Category));
        columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|(n, _)| n.to_string()).collect()
    }

    /// Contributing countries in canonical order.
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Non-missing values of `metric` for one country.
    pub fn values_for(&self, country: Country, metric: Metric) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.country == country)
            .filter_map(|r| metric.get(r))
            .collect()
    }

    pub fn count_for(&self, country: Country) -> usize {
        self.records.iter().filter(|r| r.country == country).count()
    }
}

/// Grouped statistics for one (country, metric) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub country: Country,
    pub metric: Metric,
    pub n: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

pub struct Aggregator;

impl Aggregator {
    /// The schema every dataset shares, or the first country that deviates from it.
    pub fn common_schema(datasets: &BTreeMap<Country, Dataset>) -> Result<Schema, AggregateError> {
        let first = datasets.values().next().ok_or(AggregateError::NoDatasets)?;
        let schema = first.schema();
        for (&country, dataset) in datasets {
            if dataset.schema() != schema {
                return Err(AggregateError::SchemaMismatch {
                    country,
                    expected: schema.column_names(),
                    found: dataset.schema().column_names(),
                });
            }
        }
        Ok(schema.clone())
    }

    /// Concatenate datasets in canonical country order. All schemas must match.
    pub fn merge(datasets: &BTreeMap<Country, Dataset>) -> Result<CombinedDataset, AggregateError> {
        let schema = Self::common_schema(datasets)?;

        for (&country, dataset) in datasets {
            if dataset.country() != country {
                return Err(AggregateError::CountryMismatch {
                    key: country,
                    actual: dataset.country(),
                });
            }
        }

        let total: usize = datasets.values().map(Dataset::len).sum();
        let mut records = Vec::with_capacity(total);
        for dataset in datasets.values() {
            records.extend(dataset.records().iter().cloned());
        }

        info!(
            "Merged {} countries into {} records",
            datasets.len(),
            records.len()
        );

        Ok(CombinedDataset {
            schema,
            countries: datasets.keys().copied().collect(),
            records,
        })
    }

    /// Summaries for every contributing country × requested metric.
    ///
    /// Countries come in canonical order, metrics in the order given.
    pub fn summarize(combined: &CombinedDataset, metrics: &[Metric]) -> Vec<GroupSummary> {
        let mut out = Vec::with_capacity(combined.countries().len() * metrics.len());
        for &country in combined.countries() {
            let rows = combined.count_for(country);
            for &metric in metrics {
                let values = combined.values_for(country, metric);
                let d = StatsCalculator::describe(&values);
                out.push(GroupSummary {
                    country,
                    metric,
                    n: d.count,
                    missing: rows - d.count,
                    mean: d.mean,
                    median: d.median,
                    std: d.std,
                    min: d.min,
                    q1: d.q1,
                    q3: d.q3,
                    max: d.max,
                });
            }
        }
        out
    }
}
