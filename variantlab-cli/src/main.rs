use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use variantlab::{
    EngineConfig, ExperimentData, SpendingFunction, StatsEngine, StatsError, VariantObservation,
};

#[derive(Parser)]
#[command(name = "variantlab", version, about = "Statistics for conversion experiments")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Two-tailed confidence level in (0, 1).
    #[arg(long, global = true, env = "VARIANTLAB_CONFIDENCE_LEVEL")]
    confidence_level: Option<f64>,
    /// Visitors per variant before results are considered readable.
    #[arg(long, global = true, env = "VARIANTLAB_MIN_SAMPLE_SIZE")]
    minimum_sample_size: Option<u64>,
    /// Posterior draws per arm for the Bayesian comparison.
    #[arg(long, global = true, env = "VARIANTLAB_MC_SAMPLES")]
    monte_carlo_samples: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a report from an experiment JSON file
    Report {
        file: PathBuf,
        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Compare the first two variants: significance, Bayesian and sequential
    Compare {
        file: PathBuf,
        #[arg(long, default_value = "obrien-fleming")]
        spending_function: SpendingFunction,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Recommend a variant by Thompson sampling from a JSON map of observations
    Bandit {
        file: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Visitors needed per variant to detect a relative lift
    SampleSize {
        #[arg(long)]
        baseline: f64,
        /// Relative minimum detectable effect (0.05 = 5% lift)
        #[arg(long)]
        mde: Option<f64>,
        #[arg(long)]
        power: Option<f64>,
    },
}

fn engine_config(cli: &Cli) -> variantlab::Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(level) = cli.confidence_level {
        config.set_confidence_level(level)?;
    }
    if let Some(n) = cli.minimum_sample_size {
        config.set_minimum_sample_size(n)?;
    }
    if let Some(samples) = cli.monte_carlo_samples {
        config.monte_carlo_samples = samples;
    }
    config.validate()?;
    Ok(config)
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn load_experiment(path: &Path) -> variantlab::Result<ExperimentData> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn run(cli: Cli) -> variantlab::Result<()> {
    let mut config = engine_config(&cli)?;

    match cli.command {
        Command::Report { file, json } => {
            let data = load_experiment(&file)?;
            let report = StatsEngine::new(config)?.create_test_report(&data);
            tracing::info!(
                experiment = %report.experiment_name,
                winner = ?report.winner,
                "report generated"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.to_text());
            }
        }
        Command::Compare {
            file,
            spending_function,
            seed,
        } => {
            let data = load_experiment(&file)?;
            let mut arms = data.variants.iter();
            let (Some((control_key, control)), Some((treatment_key, treatment))) =
                (arms.next(), arms.next())
            else {
                return Err(StatsError::InvalidInput(format!(
                    "compare needs at least two variants, '{}' has {}",
                    data.name,
                    data.variants.len()
                )));
            };

            let engine = StatsEngine::new(config)?;
            let mut rng = rng_from_seed(seed);
            let significance = engine.calculate_significance(control, treatment)?;
            let bayesian = engine.calculate_bayesian_probability(control, treatment, &mut rng)?;
            let sequential = engine.sequential_test(control, treatment, spending_function)?;

            let out = json!({
                "control": control_key,
                "treatment": treatment_key,
                "significance": significance,
                "bayesian": bayesian,
                "sequential": sequential,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Bandit { file, seed } => {
            let raw = std::fs::read_to_string(&file)?;
            let variants: BTreeMap<String, VariantObservation> = serde_json::from_str(&raw)?;
            let mut rng = rng_from_seed(seed);
            let recommendation = StatsEngine::new(config)?.thompson_sampling(&variants, &mut rng)?;
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
        Command::SampleSize {
            baseline,
            mde,
            power,
        } => {
            if let Some(mde) = mde {
                config.minimum_detectable_effect = mde;
            }
            if let Some(power) = power {
                config.power_threshold = power;
            }
            let engine = StatsEngine::new(config)?;
            let per_variant =
                engine.calculate_sample_size(baseline, engine.config().minimum_detectable_effect)?;
            println!("{}", per_variant);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
