use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thermozone::io::read_config;
use thermozone::sim::energy::{ConstantBoundary, Simulation};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "thermozone")]
#[command(about = "Single-zone coupled heat balance simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model under its configured boundary conditions
    Run {
        /// Model configuration (JSON)
        config: PathBuf,

        /// Override the number of steps
        #[arg(long)]
        steps: Option<usize>,

        /// Override the timestep in seconds
        #[arg(long)]
        dt_s: Option<f64>,

        /// Override the number of warm-up days
        #[arg(long)]
        warmup_days: Option<usize>,

        /// Write the run summary here instead of stdout
        #[arg(short, long)]
        output_file: Option<PathBuf>,
    },
    /// Validate a model configuration without running it
    Check {
        /// Model configuration (JSON)
        config: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            dt_s,
            warmup_days,
            output_file,
        } => {
            let cfg = read_config(&config)?;
            let mut model = cfg
                .build()
                .with_context(|| format!("Invalid model: {}", config.display()))?;
            if let Some(steps) = steps {
                model.run.steps = steps;
            }
            if let Some(dt) = dt_s {
                model.run.dt_s = dt;
            }
            if let Some(days) = warmup_days {
                model.run.warmup_days = days;
            }
            let run = model.run.clone();
            info!(
                zone = %model.solver.zone().name,
                dt_s = run.dt_s,
                steps = run.steps,
                "model loaded"
            );

            let mut sim = Simulation::from_model(model);
            let mut provider = ConstantBoundary(run.boundary.clone());
            sim.warm_up(&mut provider, run.warmup_days, run.dt_s)?;
            let summary = sim.run(&mut provider, run.steps, run.dt_s)?;

            let output = serde_json::to_string_pretty(&summary)?;
            if let Some(path) = output_file {
                std::fs::write(&path, output)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Summary saved to {:?}", path);
            } else {
                println!("{}", output);
            }
        }
        Commands::Check { config } => {
            let cfg = read_config(&config)?;
            let model = cfg
                .build()
                .with_context(|| format!("Invalid model: {}", config.display()))?;
            let zone = model.solver.zone();
            println!(
                "{}: {} surfaces, {} windows, {:.1} m3",
                zone.name,
                zone.surfaces.len(),
                zone.windows.len(),
                zone.volume()
            );
        }
    }

    Ok(())
}
