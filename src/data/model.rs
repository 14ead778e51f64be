//! Data Model
//! Fixed measurement schema shared by every pipeline stage.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the timestamp column in source and output files.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Name of the discriminant column added by the aggregator.
pub const COUNTRY_COLUMN: &str = "country";

/// Canonical textual form of timestamps in written files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown country: {0}")]
    UnknownCountry(String),
    #[error("Unknown metric column: {0}")]
    UnknownMetric(String),
}

/// Countries covered by the measurement campaign, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(alias = "benin")]
    Benin,
    #[serde(alias = "sierraleone", alias = "sierra_leone", alias = "Sierra Leone")]
    SierraLeone,
    #[serde(alias = "togo")]
    Togo,
}

impl Country {
    pub const ALL: [Country; 3] = [Country::Benin, Country::SierraLeone, Country::Togo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Benin => "Benin",
            Country::SierraLeone => "SierraLeone",
            Country::Togo => "Togo",
        }
    }

    /// Lower-case key used in file names (`benin_clean.csv`).
    pub fn key(&self) -> &'static str {
        match self {
            Country::Benin => "benin",
            Country::SierraLeone => "sierraleone",
            Country::Togo => "togo",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Country {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "benin" => Ok(Country::Benin),
            "sierraleone" => Ok(Country::SierraLeone),
            "togo" => Ok(Country::Togo),
            _ => Err(ModelError::UnknownCountry(s.to_string())),
        }
    }
}

/// Numeric measurement channels of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "GHI")]
    Ghi,
    #[serde(rename = "DNI")]
    Dni,
    #[serde(rename = "DHI")]
    Dhi,
    #[serde(rename = "Tamb")]
    Temperature,
    #[serde(rename = "RH")]
    Humidity,
    #[serde(rename = "WS")]
    WindSpeed,
    #[serde(rename = "WD")]
    WindDirection,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Ghi,
        Metric::Dni,
        Metric::Dhi,
        Metric::Temperature,
        Metric::Humidity,
        Metric::WindSpeed,
        Metric::WindDirection,
    ];

    /// Column header used in source and output files.
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Ghi => "GHI",
            Metric::Dni => "DNI",
            Metric::Dhi => "DHI",
            Metric::Temperature => "Tamb",
            Metric::Humidity => "RH",
            Metric::WindSpeed => "WS",
            Metric::WindDirection => "WD",
        }
    }

    pub fn get(&self, record: &Record) -> Option<f64> {
        match self {
            Metric::Ghi => record.ghi,
            Metric::Dni => record.dni,
            Metric::Dhi => record.dhi,
            Metric::Temperature => record.temperature,
            Metric::Humidity => record.humidity,
            Metric::WindSpeed => record.wind_speed,
            Metric::WindDirection => record.wind_direction,
        }
    }

    pub fn set(&self, record: &mut Record, value: Option<f64>) {
        let slot = match self {
            Metric::Ghi => &mut record.ghi,
            Metric::Dni => &mut record.dni,
            Metric::Dhi => &mut record.dhi,
            Metric::Temperature => &mut record.temperature,
            Metric::Humidity => &mut record.humidity,
            Metric::WindSpeed => &mut record.wind_speed,
            Metric::WindDirection => &mut record.wind_direction,
        };
        *slot = value;
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Metric {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.column_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownMetric(s.to_string()))
    }
}

/// One timestamped observation. Missing measurements are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub ghi: Option<f64>,
    pub dni: Option<f64>,
    pub dhi: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub country: Country,
}

impl Record {
    /// Record with every measurement missing.
    pub fn empty(timestamp: NaiveDateTime, country: Country) -> Self {
        Self {
            timestamp,
            ghi: None,
            dni: None,
            dhi: None,
            temperature: None,
            humidity: None,
            wind_speed: None,
            wind_direction: None,
            country,
        }
    }
}

/// Semantic type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SemanticType {
    Timestamp,
    Float,
    Category,
}

/// Column set of a dataset: the timestamp followed by its metric columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    metrics: Vec<Metric>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::solar()
    }
}

impl Schema {
    /// Full station schema with every measurement channel.
    pub fn solar() -> Self {
        Self {
            metrics: Metric::ALL.to_vec(),
        }
    }

    /// Schema restricted to the given metrics, kept in canonical order.
    pub fn with_metrics(metrics: &[Metric]) -> Self {
        let mut metrics = metrics.to_vec();
        metrics.sort();
        metrics.dedup();
        Self { metrics }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    /// Column name → semantic type, in file order.
    pub fn columns(&self) -> Vec<(&'static str, SemanticType)> {
        std::iter::once((TIMESTAMP_COLUMN, SemanticType::Timestamp))
            .chain(
                self.metrics
                    .iter()
                    .map(|m| (m.column_name(), SemanticType::Float)),
            )
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|(n, _)| n.to_string()).collect()
    }
}

/// Counts of source rows the loader could not turn into records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rejected_timestamps: usize,
    pub rejected_values: usize,
    /// Per-column count of unparsable cells, in schema order.
    pub rejected_by_column: Vec<(String, usize)>,
}

impl LoadReport {
    pub fn rejected_total(&self) -> usize {
        self.rejected_timestamps + self.rejected_values
    }
}

/// Ordered records of a single country plus their schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    country: Country,
    schema: Schema,
    records: Vec<Record>,
    load_report: LoadReport,
}

impl Dataset {
    /// Build a dataset, retagging every record with `country`.
    pub fn new(country: Country, schema: Schema, mut records: Vec<Record>) -> Self {
        for record in &mut records {
            record.country = country;
        }
        let load_report = LoadReport {
            rows_read: records.len(),
            rows_loaded: records.len(),
            ..LoadReport::default()
        };
        Self {
            country,
            schema,
            records,
            load_report,
        }
    }

    pub(crate) fn with_load_report(mut self, report: LoadReport) -> Self {
        self.load_report = report;
        self
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Non-missing values of a metric, in record order.
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.records.iter().filter_map(|r| metric.get(r)).collect()
    }
}
