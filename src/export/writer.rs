//! Artifact Writer
//! Persists cleaned, combined and summary tables as CSV plus JSON views.

use crate::data::{
    CombinedDataset, Country, Dataset, GroupSummary, Metric, Record, Schema, COUNTRY_COLUMN,
    TIMESTAMP_COLUMN, TIMESTAMP_FORMAT,
};
use crate::stats::MetricComparison;
use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix of per-country cleaned files (`benin_clean.csv`).
pub const CLEAN_SUFFIX: &str = "_clean";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn clean_file_name(country: Country) -> String {
        format!("{}{CLEAN_SUFFIX}.csv", country.key())
    }

    /// Write a cleaned dataset with the same columns as its source.
    pub fn write_dataset(dataset: &Dataset, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(Self::clean_file_name(dataset.country()));
        let mut df = records_frame(dataset.schema(), dataset.records(), false)?;
        write_csv(&mut df, &path)?;
        Ok(path)
    }

    /// Write the combined table with its trailing `country` column.
    pub fn write_combined(combined: &CombinedDataset, path: &Path) -> Result<(), ExportError> {
        let mut df = records_frame(combined.schema(), combined.records(), true)?;
        write_csv(&mut df, path)
    }

    pub fn write_summaries(summaries: &[GroupSummary], path: &Path) -> Result<(), ExportError> {
        let col = |f: fn(&GroupSummary) -> Option<f64>| -> Vec<Option<f64>> {
            summaries.iter().map(f).collect()
        };
        let mut df = DataFrame::new(vec![
            Column::new(
                "country".into(),
                summaries.iter().map(|s| s.country.to_string()).collect::<Vec<_>>(),
            ),
            Column::new(
                "metric".into(),
                summaries.iter().map(|s| s.metric.to_string()).collect::<Vec<_>>(),
            ),
            Column::new("n".into(), summaries.iter().map(|s| s.n as u64).collect::<Vec<_>>()),
            Column::new(
                "missing".into(),
                summaries.iter().map(|s| s.missing as u64).collect::<Vec<_>>(),
            ),
            Column::new("mean".into(), col(|s| s.mean)),
            Column::new("median".into(), col(|s| s.median)),
            Column::new("std".into(), col(|s| s.std)),
            Column::new("min".into(), col(|s| s.min)),
            Column::new("q1".into(), col(|s| s.q1)),
            Column::new("q3".into(), col(|s| s.q3)),
            Column::new("max".into(), col(|s| s.max)),
        ])?;
        write_csv(&mut df, path)
    }

    pub fn write_comparisons(results: &[MetricComparison], path: &Path) -> Result<(), ExportError> {
        let mut metric = Vec::new();
        let mut status = Vec::new();
        let mut statistic = Vec::new();
        let mut p_value = Vec::new();
        let mut alpha = Vec::new();
        let mut significant = Vec::new();
        let mut groups = Vec::new();
        let mut reason = Vec::new();

        for entry in results {
            metric.push(entry.metric().to_string());
            match entry {
                MetricComparison::Computed(r) => {
                    status.push("computed".to_string());
                    statistic.push(Some(r.test_statistic));
                    p_value.push(Some(r.p_value));
                    alpha.push(Some(r.alpha));
                    significant.push(Some(r.significant));
                    groups.push(
                        r.groups
                            .iter()
                            .map(|g| g.country.as_str())
                            .collect::<Vec<_>>()
                            .join(";"),
                    );
                    reason.push(String::new());
                }
                MetricComparison::NotComputable { reason: why, .. } => {
                    status.push("not_computable".to_string());
                    statistic.push(None);
                    p_value.push(None);
                    alpha.push(None);
                    significant.push(None);
                    groups.push(String::new());
                    reason.push(why.clone());
                }
            }
        }

        let mut df = DataFrame::new(vec![
            Column::new("metric".into(), metric),
            Column::new("status".into(), status),
            Column::new("test_statistic".into(), statistic),
            Column::new("p_value".into(), p_value),
            Column::new("alpha".into(), alpha),
            Column::new("significant".into(), significant),
            Column::new("groups".into(), groups),
            Column::new("reason".into(), reason),
        ])?;
        write_csv(&mut df, path)
    }

    pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    /// Countries that have a cleaned file in `dir`, in canonical order.
    pub fn available_countries(dir: &Path) -> Result<Vec<Country>, ExportError> {
        let mut countries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(key) = stem.strip_suffix(CLEAN_SUFFIX) else {
                continue;
            };
            match key.parse::<Country>() {
                Ok(country) => countries.push(country),
                Err(e) => warn!("Skipping {}: {e}", path.display()),
            }
        }
        countries.sort();
        countries.dedup();
        Ok(countries)
    }
}

fn records_frame(
    schema: &Schema,
    records: &[Record],
    with_country: bool,
) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(schema.metrics().len() + 2);
    columns.push(Column::new(
        TIMESTAMP_COLUMN.into(),
        records
            .iter()
            .map(|r| r.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .collect::<Vec<_>>(),
    ));
    for metric in schema.metrics() {
        columns.push(metric_column(*metric, records));
    }
    if with_country {
        columns.push(Column::new(
            COUNTRY_COLUMN.into(),
            records.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(),
        ));
    }
    DataFrame::new(columns)
}

fn metric_column(metric: Metric, records: &[Record]) -> Column {
    Column::new(
        metric.column_name().into(),
        records.iter().map(|r| metric.get(r)).collect::<Vec<_>>(),
    )
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
