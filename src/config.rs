//! Pipeline Configuration
//! TOML-backed settings: sources, cleaning decisions, metrics and significance level.

use crate::data::{
    CleaningDecision, CleaningMethod, Country, LoadOptions, Metric, Schema,
    DEFAULT_TIMESTAMP_FORMATS, DEFAULT_Z_THRESHOLD,
};
use crate::stats::DEFAULT_ALPHA;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// One country's raw input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub country: Country,
    /// Relative paths resolve against `data_dir`.
    pub path: PathBuf,
}

/// Cleaning decision for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    pub column: Metric,
    pub method: CleaningMethod,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub alpha: f64,
    /// Metrics summarized and compared, in report order.
    pub metrics: Vec<Metric>,
    /// Columns every source must provide. Defaults to the full station schema.
    pub columns: Vec<Metric>,
    pub timestamp_formats: Vec<String>,
    pub sources: Vec<SourceConfig>,
    pub cleaning: Vec<CleaningConfig>,
    pub max_series_points: usize,
    pub top_n: usize,
    /// Missing share (percent) above which a column is reported by the profiler.
    pub missing_warn_pct: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data"),
            alpha: DEFAULT_ALPHA,
            metrics: vec![Metric::Ghi, Metric::Dni, Metric::Dhi],
            columns: Metric::ALL.to_vec(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            sources: Country::ALL
                .iter()
                .map(|c| SourceConfig {
                    country: *c,
                    path: PathBuf::from(format!("{}.csv", c.key())),
                })
                .collect(),
            cleaning: [Metric::Ghi, Metric::Dni, Metric::Dhi, Metric::WindSpeed]
                .iter()
                .map(|m| CleaningConfig {
                    column: *m,
                    method: CleaningMethod::Impute,
                    threshold: DEFAULT_Z_THRESHOLD,
                })
                .collect(),
            max_series_points: 5000,
            top_n: 10,
            missing_warn_pct: 5.0,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.metrics.is_empty() {
            return Err(ConfigError::Invalid("metrics must not be empty".into()));
        }
        if let Some(m) = self.metrics.iter().find(|m| !self.columns.contains(*m)) {
            return Err(ConfigError::Invalid(format!(
                "metric {m} is not among the required columns"
            )));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one source is required".into()));
        }

        let mut seen = BTreeSet::new();
        for source in &self.sources {
            if !seen.insert(source.country) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source for {}",
                    source.country
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for entry in &self.cleaning {
            if !self.columns.contains(&entry.column) {
                return Err(ConfigError::Invalid(format!(
                    "cleaning entry for {} names a column not among the required columns",
                    entry.column
                )));
            }
            if !(entry.threshold.is_finite() && entry.threshold > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "threshold for {} must be a positive number, got {}",
                    entry.column, entry.threshold
                )));
            }
            if !seen.insert(entry.column) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate cleaning entry for {}",
                    entry.column
                )));
            }
        }
        Ok(())
    }

    /// Replace every cleaning threshold.
    pub fn set_threshold(&mut self, threshold: f64) {
        for entry in &mut self.cleaning {
            entry.threshold = threshold;
        }
    }

    pub fn decisions(&self) -> BTreeMap<Metric, CleaningDecision> {
        self.cleaning
            .iter()
            .map(|c| {
                (
                    c.column,
                    CleaningDecision {
                        method: c.method,
                        threshold: c.threshold,
                    },
                )
            })
            .collect()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            schema: Schema::with_metrics(&self.columns),
            timestamp_formats: self.timestamp_formats.clone(),
        }
    }

    /// Input path for a source, resolved against `data_dir`.
    pub fn source_path(&self, source: &SourceConfig) -> PathBuf {
        if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.data_dir.join(&source.path)
        }
    }

    pub fn source_for(&self, country: Country) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.country == country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.decisions()[&Metric::Ghi], CleaningDecision::impute());
        assert_eq!(
            config.source_path(&config.sources[1]),
            PathBuf::from("data/sierraleone.csv")
        );
    }

    #[test]
    fn parses_toml_with_partial_fields() {
        let text = r#"
            alpha = 0.01
            metrics = ["GHI", "Tamb"]

            [[sources]]
            country = "benin"
            path = "benin-malanville.csv"

            [[sources]]
            country = "Togo"
            path = "/abs/togo-dapaong_qc.csv"

            [[cleaning]]
            column = "GHI"
            method = "drop"
            threshold = 2.5

            [[cleaning]]
            column = "WS"
            method = "impute"
        "#;
        let config = PipelineConfig::from_toml(text).unwrap();
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.metrics, vec![Metric::Ghi, Metric::Temperature]);
        assert_eq!(config.sources[0].country, Country::Benin);
        assert_eq!(
            config.source_path(&config.sources[1]),
            PathBuf::from("/abs/togo-dapaong_qc.csv")
        );
        let decisions = config.decisions();
        assert_eq!(decisions[&Metric::Ghi], CleaningDecision::drop().with_threshold(2.5));
        assert_eq!(decisions[&Metric::WindSpeed], CleaningDecision::impute());
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PipelineConfig::from_toml("alpha = 1.5").is_err());
        assert!(PipelineConfig::from_toml("metrics = []").is_err());

        let dup = r#"
            [[cleaning]]
            column = "GHI"
            method = "drop"
            [[cleaning]]
            column = "GHI"
            method = "impute"
        "#;
        assert!(matches!(
            PipelineConfig::from_toml(dup),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = PipelineConfig::default();
        config.set_threshold(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cleaning_for_unrequired_column() {
        let text = r#"
            columns = ["GHI", "DNI"]
            metrics = ["GHI"]

            [[cleaning]]
            column = "GHI"
            method = "impute"

            [[cleaning]]
            column = "WS"
            method = "drop"
        "#;
        match PipelineConfig::from_toml(text) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("WS"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }

        let narrow = text.replace("column = \"WS\"", "column = \"DNI\"");
        let config = PipelineConfig::from_toml(&narrow).unwrap();
        assert_eq!(config.decisions().len(), 2);
    }
}
