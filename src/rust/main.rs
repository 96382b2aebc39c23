use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use pme_classifier::{
    init_logger, load_and_validate, Classifier, DatasetSchema, DecisionTable, ModelManager, Settings,
};

#[derive(Parser)]
#[command(author, version, about = "Classify French customer messages and map them to business actions", long_about = None)]
struct Args {
    /// CSV dataset with text and label columns
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Model artifact to write (train) or read (predict, health)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// JSON file replacing the built-in decision table
    #[arg(long, global = true)]
    decision_table: Option<PathBuf>,

    /// Confidence percentage below which human review is recommended
    #[arg(long, global = true)]
    review_threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the dataset, train, evaluate and persist the model
    Train {
        /// Print the evaluation report as JSON
        #[arg(long)]
        json: bool,
        #[arg(long)]
        test_size: Option<f64>,
        #[arg(long)]
        random_state: Option<u64>,
        #[arg(long)]
        cv_folds: Option<usize>,
        /// Inverse regularisation strength
        #[arg(long)]
        c: Option<f64>,
    },
    /// Classify one message and print the workflow record
    Predict {
        text: String,
    },
    /// List classes with their automatic actions and replies
    Classes,
    /// Report whether a model can be loaded
    Health,
}

fn settings_from(args: &Args) -> Result<Settings> {
    let mut settings = Settings::from_env().context("invalid environment configuration")?;
    if let Some(path) = &args.dataset {
        settings.dataset_path = path.clone();
    }
    if let Some(path) = &args.model {
        settings.model_path = path.clone();
    }
    if let Some(path) = &args.decision_table {
        settings.decision_table = Some(path.clone());
    }
    if args.review_threshold.is_some() {
        settings.review_threshold = args.review_threshold;
    }
    if let Command::Train {
        test_size,
        random_state,
        cv_folds,
        c,
        ..
    } = &args.command
    {
        let training = &mut settings.training;
        training.test_size = test_size.unwrap_or(training.test_size);
        training.random_state = random_state.unwrap_or(training.random_state);
        training.cv_folds = cv_folds.unwrap_or(training.cv_folds);
        training.c = c.unwrap_or(training.c);
    }
    settings.validate()?;
    Ok(settings)
}

fn train(settings: &Settings, json: bool) -> Result<()> {
    info!("=== Training message classifier ===");
    let start = Instant::now();

    let dataset = load_and_validate(&settings.dataset_path, &DatasetSchema::from(settings))
        .with_context(|| format!("dataset {:?} failed validation", settings.dataset_path))?;

    let (classifier, report) = Classifier::builder()
        .with_config(settings.training.clone())
        .with_dataset(dataset)
        .build()
        .context("training failed")?;

    classifier
        .save(&settings.model_path)
        .context("could not persist the trained model")?;

    info!(
        "=== Model {} saved to {:?} (took {:.2?}) ===",
        classifier.metadata().model_id,
        settings.model_path,
        start.elapsed()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn predict(settings: &Settings, text: &str) -> Result<()> {
    let table = DecisionTable::from_settings(settings)?;
    let classifier = Classifier::load(&settings.model_path)
        .context("no usable model, run `train` first")?;

    let prediction = classifier.predict(text)?;
    info!(
        "Prediction: '{}' -> {} ({}%)",
        text.chars().take(50).collect::<String>(),
        prediction.predicted_class,
        prediction.confidence
    );

    if let Some(threshold) = table.review_threshold() {
        info!("Human review below {}% confidence", threshold);
    }
    let record = table.compose(prediction);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn classes(settings: &Settings) -> Result<()> {
    let table = DecisionTable::from_settings(settings)?;
    println!("{}", serde_json::to_string_pretty(&table.catalog())?);
    Ok(())
}

fn health(settings: &Settings) -> Result<()> {
    let dir = settings
        .model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(ModelManager::get_default_models_dir);
    let manager = ModelManager::new(dir).context("cannot open the models directory")?;
    if let Err(e) = manager.load(&settings.model_path) {
        warn!("{}", e);
    }
    println!("{}", serde_json::to_string_pretty(&manager.health())?);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let settings = settings_from(&args)?;
    match &args.command {
        Command::Train { json, .. } => train(&settings, *json),
        Command::Predict { text } => predict(&settings, text),
        Command::Classes => classes(&settings),
        Command::Health => health(&settings),
    }
}

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
