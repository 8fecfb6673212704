//! Command-line front-end: CSV in, per-location variance components out.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use u_msa::config::StudyConfig;
use u_msa::io::SurfaceData;
use u_msa::study::Study;
use u_msa::variance::DegeneracyPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Variance components and SNR per measurement location")]
struct Args {
    /// Long-format CSV with day, sample and one column per channel
    #[arg(value_name = "CSV")]
    input: PathBuf,

    /// Study configuration (TOML); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of production cycles (a)
    #[arg(long)]
    days: Option<u32>,

    /// Replicates per cycle (r)
    #[arg(long)]
    samples: Option<u32>,

    /// Number of locations; ids are 1..=N
    #[arg(long)]
    locations: Option<u32>,

    /// Value column to analyse; repeat for several channels
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Column holding the location id (default: position within each cell)
    #[arg(long)]
    location_column: Option<String>,

    /// Abort when a location has zero within-cycle variance
    #[arg(long, default_value_t = false)]
    fail_on_degenerate: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,
}

impl Args {
    fn study_config(&self) -> anyhow::Result<StudyConfig> {
        let mut cfg = match &self.config {
            Some(path) => StudyConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => StudyConfig::default(),
        };
        if let Some(days) = self.days {
            cfg.days = days;
        }
        if let Some(samples) = self.samples {
            cfg.samples_per_day = samples;
        }
        if let Some(n) = self.locations {
            cfg = cfg.with_location_count(n);
        }
        if !self.channels.is_empty() {
            cfg.channels = self.channels.clone();
        }
        if self.location_column.is_some() {
            cfg.location_column = self.location_column.clone();
        }
        if self.fail_on_degenerate {
            cfg.degeneracy = DegeneracyPolicy::Fail;
        }
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = args.study_config()?;
    let reference = cfg.snr_reference;
    let location_column = cfg.location_column.clone();
    let study = Study::new(cfg)?;

    let data = SurfaceData::from_path(&args.input, location_column.as_deref())
        .with_context(|| format!("reading {}", args.input.display()))?;
    let reports = study.analyze(&data)?;

    match args.format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Format::Table => {
            for report in &reports {
                println!("channel: {}", report.channel);
                print!("{}", report.estimates);
                let above = report.above_reference(reference);
                println!(
                    "{} of {} locations at or above SNR {reference}: {above:?}",
                    above.len(),
                    report.estimates.len()
                );
                println!();
            }
        }
    }
    Ok(())
}
