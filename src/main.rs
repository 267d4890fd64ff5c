use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crime_report_classifier::{
    config::Config, observability, Predictor, Trainer, TrainingReport,
};

#[derive(Parser)]
#[command(name = "crime-report-classifier")]
#[command(version, about = "Category and sub-category classification of crime reports", long_about = None)]
struct Cli {
    /// Configuration file (defaults to CRC_CONFIG_PATH or config/local.toml)
    #[arg(short, long, global = true, env = "CRC_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both label columns and write the model and metrics report
    Train {
        /// Training CSV
        #[arg(long)]
        train: Option<PathBuf>,

        /// Held-out test CSV
        #[arg(long)]
        test: Option<PathBuf>,

        /// Output model bundle
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output metrics report
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Skip the hyperparameter grid search
        #[arg(long)]
        no_search: bool,
    },

    /// Classify texts given as arguments, or one per line on stdin
    Predict {
        /// Model bundle
        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(value_name = "TEXT")]
        texts: Vec<String>,
    },

    /// Print a summary of a metrics report
    Report {
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Print the raw JSON instead
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    observability::init_tracing(&config.observability)?;

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Train {
            train,
            test,
            model,
            metrics,
            no_search,
        } => {
            if let Some(path) = train {
                config.data.train_path = path;
            }
            if test.is_some() {
                config.data.test_path = test;
            }
            if let Some(path) = model {
                config.output.model_path = path;
            }
            if let Some(path) = metrics {
                config.output.metrics_path = path;
            }
            if no_search {
                config.search.enabled = false;
            }

            let mut trainer = Trainer::new(config);
            let outcome = trainer.run().map_err(|e| {
                tracing::error!(code = e.error_code(), error = %e, "Training run aborted");
                e
            })?;
            println!("{}", outcome.report.summary());
        }

        Commands::Predict { model, texts } => {
            let model_path = model.unwrap_or_else(|| config.output.model_path.clone());
            let predictor = Predictor::load(&model_path, &config.prediction)
                .with_context(|| format!("Failed to load model {}", model_path.display()))?;

            let texts = if texts.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .collect::<io::Result<Vec<String>>>()
                    .context("Failed to read texts from stdin")?
            } else {
                texts
            };

            for prediction in predictor.predict_batch(&texts) {
                println!("{}", serde_json::to_string(&prediction)?);
            }
        }

        Commands::Report { metrics, json } => {
            let path = metrics.unwrap_or_else(|| config.output.metrics_path.clone());
            let report = TrainingReport::load(&path)
                .with_context(|| format!("Failed to read report {}", path.display()))?;

            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.summary());
            }
        }
    }

    Ok(())
}
