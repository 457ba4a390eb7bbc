use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rusty_wrench::batch::{BatchPredictor, abandon_dataset, process_dataset};
use rusty_wrench::config::Settings;
use rusty_wrench::error::BatchError;
use rusty_wrench::model::{ModelHandle, ModelStore};
use rusty_wrench::persistence::{PredictionRepository, SqliteRepository};
use rusty_wrench::stats::StatsAggregator;

#[derive(Parser)]
#[command(name = "rusty-wrench")]
#[command(about = "Predict machine failures from sensor datasets")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/rusty-wrench/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the model directory
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score one or more datasets and store the predictions
    Predict {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Re-run an existing dataset instead of registering a new one
        #[arg(long)]
        dataset_id: Option<i64>,
    },

    /// Print dataset statistics as JSON
    Stats { file: PathBuf },

    /// Show the model that would be used for prediction
    ModelInfo,

    /// Print stored predictions and status for a dataset
    Results { dataset_id: i64 },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default(),
    };
    if let Some(dir) = cli.model_dir {
        settings.model_dir = dir;
    }
    if let Some(db) = cli.database {
        settings.database = db;
    }

    match cli.command {
        Command::Predict { files, dataset_id } => predict(&settings, &files, dataset_id),
        Command::Stats { file } => {
            let report = StatsAggregator::with_bins(settings.histogram_bins).aggregate_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::ModelInfo => {
            let info = ModelStore::new(&settings.model_dir).model_info()?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Results { dataset_id } => {
            let repo = open_repo(&settings)?;
            let file_path = repo.file_path(dataset_id)?;
            let status = repo.status(dataset_id)?;
            let predictions = repo.predictions(dataset_id)?;
            let out = serde_json::json!({
                "dataset_id": dataset_id,
                "file_path": file_path,
                "status": status,
                "predictions": predictions,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_repo(settings: &Settings) -> Result<SqliteRepository> {
    SqliteRepository::open(&settings.database)
        .with_context(|| format!("Cannot open database {}", settings.database.display()))
}

/// Each file runs on its own thread; all share one model handle and one
/// repository.
fn predict(settings: &Settings, files: &[PathBuf], dataset_id: Option<i64>) -> Result<ExitCode> {
    if dataset_id.is_some() && files.len() > 1 {
        anyhow::bail!("--dataset-id takes exactly one file");
    }

    let handle = ModelHandle::from_store(&ModelStore::new(&settings.model_dir));
    let predictor = BatchPredictor::new(handle);
    if !predictor.handle().is_loaded() {
        log::warn!(
            "No usable model in {}; datasets keep their current status",
            settings.model_dir.display()
        );
    }
    let repo = open_repo(settings)?;

    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let id = match dataset_id {
            Some(id) => id,
            None => repo.register_dataset(&path.to_string_lossy())?,
        };
        jobs.push((id, path.as_path()));
    }

    let outcomes: Vec<(i64, &Path, Result<_, BatchError>)> = thread::scope(|s| {
        let workers: Vec<_> = jobs
            .iter()
            .map(|&(id, path)| {
                let predictor = &predictor;
                let repo = &repo;
                (id, path, s.spawn(move || process_dataset(id, path, predictor, repo)))
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|(id, path, w)| match w.join() {
                Ok(outcome) => Some((id, path, outcome)),
                Err(_) => {
                    log::error!("dataset {id}: worker panicked");
                    if let Err(e) = abandon_dataset(id, &repo, "worker panicked") {
                        log::error!("dataset {id}: cannot record panic: {e}");
                    }
                    None
                }
            })
            .collect()
    });

    let mut failed = outcomes.len() < jobs.len();
    for (id, path, outcome) in outcomes {
        match outcome {
            Ok(summary) => println!(
                "dataset {id} ({}): {}",
                path.display(),
                serde_json::to_string(&summary)?
            ),
            Err(e) => {
                failed = true;
                println!(
                    "dataset {id} ({}): {}",
                    path.display(),
                    serde_json::to_string(&e.to_json())?
                );
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

