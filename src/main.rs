//! Command-line driver: train and persist a model, or run a hyperparameter
//! sweep, from a TOML run configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use multimodel::config::RunConfig;
use multimodel::{Dataset, Metrics, ModelManager};
use tracing::info;

#[derive(Parser)]
#[command(name = "multimodel")]
#[command(about = "Fit, persist and reload multi-output regression models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Default log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the configured model, save it and check the reloaded copy
    Train {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Cross-validate sampled hyperparameters of the configured model
    Sweep {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Print the full result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    multimodel::logging::init(&cli.log_level)?;

    match cli.command {
        Commands::Train { config } => train(&RunConfig::load(&config)?),
        Commands::Sweep { config, json } => sweep(&RunConfig::load(&config)?, json),
    }
}

fn load_data(config: &RunConfig) -> Result<Dataset> {
    let dataset = config
        .data
        .loader()
        .load(&config.data.path)
        .with_context(|| format!("loading {}", config.data.path.display()))?;
    info!(
        samples = dataset.n_samples(),
        input_dim = dataset.n_features(),
        output_dim = dataset.n_outputs(),
        "loaded dataset"
    );
    Ok(dataset)
}

fn train(config: &RunConfig) -> Result<()> {
    let dataset = load_data(config)?;
    let (train, test) = dataset.split(0.8);

    let mut manager = ModelManager::new();
    manager.build_model(&config.model.algorithm, config.model.scale_data)?;
    manager.fit(train.records(), train.targets(), config.model.fit_separate)?;

    let pred = manager.predict(test.records())?;
    println!(
        "{}: test R2 = {:.4}, RMSE = {:.6} ({} models)",
        config.model.algorithm,
        Metrics::r2(test.targets(), pred.view()),
        Metrics::rmse(test.targets(), pred.view()),
        manager.n_models()
    );

    let output = &config.model.output;
    manager.save_model(output)?;
    let mut reloaded = ModelManager::new();
    reloaded.load_model(output, config.model.scale_data, manager.is_separate())?;
    if reloaded.predict(test.records())? != pred {
        bail!("predictions of the model reloaded from {} differ", output.display());
    }
    println!("saved to {}", output.display());
    Ok(())
}

fn sweep(config: &RunConfig, json: bool) -> Result<()> {
    let Some(sweep) = &config.sweep else {
        bail!("config has no [sweep] section");
    };
    let dataset = load_data(config)?;

    let mut manager = ModelManager::new();
    manager.build_model(&config.model.algorithm, config.model.scale_data)?;
    let result = manager.sweep(
        dataset.records(),
        dataset.targets(),
        &sweep.params,
        &sweep.search,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("{:>5}  {:>10}  {:>10}  params", "rank", "mean", "std");
    for trial in &result.cv_results {
        let params: Vec<String> = trial
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!(
            "{:>5}  {:>10.4}  {:>10.4}  {}",
            trial.rank_test_score,
            trial.mean_test_score,
            trial.std_test_score,
            params.join(" ")
        );
    }
    println!("best score {:.4}", result.best_score());
    Ok(())
}
