// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// `clap` and delegates everything else to Layer 2.
//
// Three commands are supported:
//   1. `retrain` — one training run on one architecture
//   2. `sweep`   — a grid of runs, summarised in a CSV report
//   3. `cache`   — pre-compute bottlenecks only

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CacheArgs, Commands, RetrainArgs, SweepArgs};

#[derive(Parser, Debug)]
#[command(
    name = "bottleneck-retrain",
    version = "0.1.0",
    about = "Retrain a classifier head on cached bottlenecks of a frozen image backbone."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Retrain(args) => run_retrain(args),
            Commands::Sweep(args)   => run_sweep(args),
            Commands::Cache(args)   => run_cache(args),
        }
    }
}

fn run_retrain(args: RetrainArgs) -> Result<()> {
    use crate::application::retrain_use_case::RetrainUseCase;

    tracing::info!("Retraining on images in: {}", args.data.image_dir);
    let summary = RetrainUseCase::new(args.into()).execute()?;

    println!("Retrained a {}-class head in {:.2}s.", summary.class_count, summary.elapsed.as_secs_f64());
    if let Some(accuracy) = summary.outcome.test_accuracy {
        println!("Final test accuracy: {:.2}% (N={})", accuracy * 100.0, summary.outcome.test_count);
    }
    println!("Head:   {}", summary.head_path.display());
    println!("Labels: {}", summary.labels_path.display());
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<()> {
    use crate::application::sweep_use_case::SweepUseCase;

    let summary = SweepUseCase::new(args.into()).execute()?;
    println!("Sweep complete: {} runs written to {}", summary.runs, summary.report_path.display());
    Ok(())
}

fn run_cache(args: CacheArgs) -> Result<()> {
    use crate::application::cache_use_case::CacheUseCase;

    let summary = CacheUseCase::new(args.into()).execute()?;
    println!("Cached {} bottlenecks for {} labels.", summary.entries, summary.class_count);
    Ok(())
}
