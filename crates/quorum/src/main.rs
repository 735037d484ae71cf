use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use quorum_agents::{StabilityHarness, Variant, WeightScenario};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quorum", about = "Multi-agent equity rating and forward-return attribution")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/quorum.toml")]
    config: String,

    /// As-of date (YYYY-MM-DD); nothing after it may influence a rating
    #[arg(long)]
    as_of: NaiveDate,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Also emit pick and performance rows
    #[arg(long)]
    rows: bool,

    /// Re-run on these dates and report label stability
    #[arg(long, value_delimiter = ',')]
    stability_dates: Vec<NaiveDate>,

    /// Re-run the as-of date under the default weight scenarios
    #[arg(long)]
    weight_sensitivity: bool,

    /// Compare against the variant in this config file over the stability
    /// dates (or the as-of date alone)
    #[arg(long)]
    compare: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = quorum::load_config(&cli.config)?;
    let pipeline = quorum::build_pipeline(&config).context("Failed to build pipeline")?;
    let reader = quorum::build_reader(&config)?;

    let snapshot = reader
        .load_snapshot(&config.universe)
        .await
        .context("Failed to load snapshot")?;
    let snapshot = Arc::new(snapshot);
    info!(instruments = snapshot.universe.len(), as_of = %cli.as_of, "Snapshot ready");

    let report = pipeline
        .run(Arc::clone(&snapshot), cli.as_of)
        .await
        .context("Run failed")?;

    let extras = cli.rows
        || cli.weight_sensitivity
        || cli.compare.is_some()
        || !cli.stability_dates.is_empty();

    let output = if !extras {
        serde_json::to_value(&report)?
    } else {
        let mut out = Map::new();
        if cli.rows {
            out.insert("picks".to_string(), serde_json::to_value(report.pick_rows())?);
            out.insert(
                "performance".to_string(),
                serde_json::to_value(report.performance_rows())?,
            );
        }

        let harness = StabilityHarness::new(pipeline.clone(), Arc::clone(&snapshot));
        if !cli.stability_dates.is_empty() {
            let stability = harness
                .stability_across_dates(&cli.stability_dates)
                .await
                .context("Date stability failed")?;
            out.insert("date_stability".to_string(), serde_json::to_value(stability)?);
        }
        if cli.weight_sensitivity {
            let sensitivity = harness
                .stability_across_weights(cli.as_of, &WeightScenario::defaults())
                .await
                .context("Weight sensitivity failed")?;
            out.insert(
                "weight_sensitivity".to_string(),
                serde_json::to_value(sensitivity)?,
            );
        }
        if let Some(path) = &cli.compare {
            let challenger = quorum::load_config(path)?;
            let dates = if cli.stability_dates.is_empty() {
                vec![cli.as_of]
            } else {
                cli.stability_dates.clone()
            };
            let comparison = harness
                .compare_variants(
                    &dates,
                    &Variant::new(&cli.config, config.clone()),
                    &Variant::new(path, challenger),
                )
                .await
                .context("Variant comparison failed")?;
            out.insert("comparison".to_string(), serde_json::to_value(comparison)?);
        }

        out.insert("report".to_string(), serde_json::to_value(&report)?);
        Value::Object(out)
    };

    // Output JSON to stdout
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}
