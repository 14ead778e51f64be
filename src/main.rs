//! Solar Compare - command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solar_compare::data::{Country, DataLoader};
use solar_compare::export::ArtifactWriter;
use solar_compare::stats::{MetricComparison, Profiler};
use solar_compare::{Pipeline, PipelineConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "solar-compare", version, about = "Clean and compare solar irradiance logs")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, env = "SOLAR_COMPARE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write every artifact
    Run {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Significance level for the rank test
        #[arg(long)]
        alpha: Option<f64>,
        /// Z-score threshold applied to every cleaned column
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Print column profiles of one source as JSON
    Profile {
        #[arg(long)]
        country: Country,
        /// Source file; defaults to the configured one
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List countries with cleaned files
    Countries {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Run {
            data_dir,
            output_dir,
            alpha,
            threshold,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(alpha) = alpha {
                config.alpha = alpha;
            }
            if let Some(threshold) = threshold {
                config.set_threshold(threshold);
            }
            config.validate()?;

            let (outcome, artifacts) = Pipeline::new(config).run()?;
            for entry in &outcome.comparisons {
                match entry {
                    MetricComparison::Computed(r) => println!(
                        "{}: H = {:.3}, p = {:.3e} -> {}",
                        r.metric,
                        r.test_statistic,
                        r.p_value,
                        if r.significant { "significant" } else { "not significant" }
                    ),
                    MetricComparison::NotComputable { metric, reason } => {
                        println!("{metric}: not computable ({reason})")
                    }
                }
            }
            println!("Summary written to {}", artifacts.summary_view.display());
        }
        Command::Profile { country, file } => {
            let path = match file {
                Some(path) => path,
                None => {
                    let source = config
                        .source_for(country)
                        .with_context(|| format!("no source configured for {country}"))?;
                    config.source_path(source)
                }
            };
            let dataset = DataLoader::load(&path, country, &config.load_options())
                .with_context(|| format!("loading {}", path.display()))?;
            let profiles = Profiler::profile(&dataset);
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        Command::Countries { dir } => {
            let dir = dir.unwrap_or_else(|| config.output_dir.clone());
            for country in ArtifactWriter::available_countries(&dir)? {
                println!("{}", country.key());
            }
        }
    }

    Ok(())
}
