//! Pipeline Orchestration
//! Runs Loader → Profiler → Cleaner → Aggregator → Comparator → Exporter in order.

use crate::config::PipelineConfig;
use crate::data::{
    Aggregator, Cleaner, CleaningReport, CombinedDataset, Country, DataLoader, Dataset,
    GroupSummary, Metric,
};
use crate::export::{ArtifactWriter, ExportBundle, ExportOptions, Exporter};
use crate::stats::{ColumnProfile, Comparator, MetricComparison, Profiler};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-country account of loading and cleaning.
#[derive(Debug, Clone, Serialize)]
pub struct CountryReport {
    pub country: Country,
    pub profile: BTreeMap<Metric, ColumnProfile>,
    pub cleaning: CleaningReport,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reports: Vec<CountryReport>,
    pub cleaned: BTreeMap<Country, Dataset>,
    pub combined: CombinedDataset,
    pub summaries: Vec<GroupSummary>,
    pub comparisons: Vec<MetricComparison>,
    pub bundle: ExportBundle,
}

/// Paths of the files a run wrote.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    pub cleaned: Vec<PathBuf>,
    pub combined: PathBuf,
    pub summary: PathBuf,
    pub comparisons: PathBuf,
    pub cleaning_report: PathBuf,
    pub dataset_view: PathBuf,
    pub summary_view: PathBuf,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load every configured source. Any schema or read failure aborts the run.
    pub fn load_sources(&self) -> Result<BTreeMap<Country, Dataset>> {
        let options = self.config.load_options();
        let mut datasets = BTreeMap::new();
        for source in &self.config.sources {
            let path = self.config.source_path(source);
            let dataset = DataLoader::load(&path, source.country, &options)
                .with_context(|| format!("loading {} from {}", source.country, path.display()))?;
            datasets.insert(source.country, dataset);
        }
        Ok(datasets)
    }

    /// Run every stage on already-loaded datasets.
    ///
    /// Datasets with differing schemas are rejected before any of them is cleaned.
    pub fn process(&self, raw: &BTreeMap<Country, Dataset>) -> Result<RunOutcome> {
        Aggregator::common_schema(raw).context("checking loaded schemas")?;

        let decisions = self.config.decisions();
        let mut cleaned = BTreeMap::new();
        let mut reports = Vec::with_capacity(raw.len());

        for (&country, dataset) in raw {
            let profile = Profiler::profile(dataset);
            let sparse = Profiler::columns_above_missing(&profile, self.config.missing_warn_pct);
            if !sparse.is_empty() {
                warn!(
                    "{country}: columns above {}% missing: {sparse:?}",
                    self.config.missing_warn_pct
                );
            }

            let (clean, cleaning) = Cleaner::clean(dataset, &decisions);
            cleaned.insert(country, clean);
            reports.push(CountryReport {
                country,
                profile,
                cleaning,
            });
        }

        let combined = Aggregator::merge(&cleaned).context("merging cleaned datasets")?;
        let summaries = Aggregator::summarize(&combined, &self.config.metrics);
        let comparisons = Comparator::compare_all(
            &combined,
            &self.config.metrics,
            combined.countries(),
            self.config.alpha,
        );
        let bundle = Exporter::export(
            &combined,
            &summaries,
            &comparisons,
            &ExportOptions {
                max_series_points: self.config.max_series_points,
                top_n: self.config.top_n,
            },
        );

        Ok(RunOutcome {
            reports,
            cleaned,
            combined,
            summaries,
            comparisons,
            bundle,
        })
    }

    /// Load, process and write every artifact to `output_dir`.
    pub fn run(&self) -> Result<(RunOutcome, Artifacts)> {
        let raw = self.load_sources()?;
        let outcome = self.process(&raw)?;
        let artifacts = self.write(&outcome)?;
        info!("Run complete: {} combined records", outcome.combined.len());
        Ok((outcome, artifacts))
    }

    fn write(&self, outcome: &RunOutcome) -> Result<Artifacts> {
        let out = &self.config.output_dir;
        std::fs::create_dir_all(out)
            .with_context(|| format!("creating output directory {}", out.display()))?;

        let cleaned = outcome
            .cleaned
            .values()
            .map(|dataset| ArtifactWriter::write_dataset(dataset, out))
            .collect::<Result<Vec<_>, _>>()?;

        let artifacts = Artifacts {
            cleaned,
            combined: out.join("combined.csv"),
            summary: out.join("summary.csv"),
            comparisons: out.join("comparisons.csv"),
            cleaning_report: out.join("cleaning_report.json"),
            dataset_view: out.join("dataset_view.json"),
            summary_view: out.join("summary_view.json"),
        };

        ArtifactWriter::write_combined(&outcome.combined, &artifacts.combined)?;
        ArtifactWriter::write_summaries(&outcome.summaries, &artifacts.summary)?;
        ArtifactWriter::write_comparisons(&outcome.comparisons, &artifacts.comparisons)?;
        ArtifactWriter::write_json(&outcome.reports, &artifacts.cleaning_report)?;
        ArtifactWriter::write_json(&outcome.bundle.dataset_view, &artifacts.dataset_view)?;
        ArtifactWriter::write_json(&outcome.bundle.summary_view, &artifacts.summary_view)?;
        Ok(artifacts)
    }
}
