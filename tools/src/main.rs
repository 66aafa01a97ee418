//! churn-clv: train, label, and serve the churn + CLV scoring pipeline.
//!
//! Usage:
//!   churn-clv --config config/pipeline.json prepare
//!   churn-clv train
//!   churn-clv label
//!   churn-clv predict --preset high-activity
//!   churn-clv predict --features '{"avg_order_value": 350, ...}' --raw-clv 500
//!   churn-clv serve            (JSON lines on stdin/stdout)

use anyhow::{Context, Result};
use churn_clv_core::{
    config::PipelineConfig,
    dataset::prepare_model_input,
    labeling::label_file,
    presets::CustomerPreset,
    scoring::ScoringContext,
    service::serve,
    store::ExperimentStore,
    training::TrainingPipeline,
};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline config file. Built-in defaults are used when absent.
    #[arg(short, long, env = "CHURN_CLV_CONFIG")]
    config: Option<PathBuf>,

    /// Override the artifact bundle directory.
    #[arg(long, env = "CHURN_CLV_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean the churn-ready table into the model input CSV and feature list.
    Prepare {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fit the classifier, log the run, and write the artifact bundle.
    Train {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Experiment database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Batch-label the churn-ready table with churn probability and CLV segment.
    Label {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score one customer.
    Predict {
        /// Customer record as a JSON object.
        #[arg(long, conflicts_with = "preset")]
        features: Option<String>,
        /// Named sample customer (default, high-activity, low-activity, new-customer).
        #[arg(long)]
        preset: Option<String>,
        /// Raw CLV estimate; defaults to the preset's value.
        #[arg(long)]
        raw_clv: Option<f64>,
    },
    /// Serve predictions as JSON lines over stdin/stdout.
    Serve,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(&path.display().to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.model_dir {
        config.paths.model_dir = dir.clone();
    }

    match cli.command {
        Command::Prepare { input, output } => {
            if let Some(p) = input {
                config.paths.churn_ready_csv = p;
            }
            if let Some(p) = output {
                config.paths.model_input_csv = p;
            }
            run_prepare(&config)
        }
        Command::Train { input, db } => {
            if let Some(p) = input {
                config.paths.model_input_csv = p;
            }
            if let Some(p) = db {
                config.paths.experiment_db = p;
            }
            run_train(&config)
        }
        Command::Label { input, output } => {
            if let Some(p) = input {
                config.paths.churn_ready_csv = p;
            }
            if let Some(p) = output {
                config.paths.final_output_csv = p;
            }
            run_label(&config)
        }
        Command::Predict { features, preset, raw_clv } => {
            run_predict(&config, features.as_deref(), preset.as_deref(), raw_clv)
        }
        Command::Serve => run_serve(&config),
    }
}

fn run_prepare(config: &PipelineConfig) -> Result<()> {
    let set = prepare_model_input(
        &config.paths.churn_ready_csv,
        &config.paths.model_input_csv,
        &config.paths.model_dir,
        &config.model,
    )?;
    println!("Saved: {} ({} rows, {} churners)",
        config.paths.model_input_csv.display(), set.len(), set.positives());
    Ok(())
}

fn run_train(config: &PipelineConfig) -> Result<()> {
    let db = config.paths.experiment_db.display().to_string();
    let store = ExperimentStore::open(&db)?;
    store.migrate()?;

    let outcome = TrainingPipeline::new(config, &store).run_from_disk()?;
    let r = &outcome.report;

    println!("=== TRAINING RUN ===");
    println!("  run_id:      {}", outcome.run_id);
    println!("  experiment:  {}", config.training.experiment);
    println!("  train/test:  {} / {}", outcome.train_rows, outcome.test_rows);
    println!("  trees:       {}", outcome.model.trees.len());
    match r.roc_auc {
        Some(auc) => println!("  roc_auc:     {auc:.4}"),
        None      => println!("  roc_auc:     n/a (single-class test split)"),
    }
    println!();
    println!("  threshold  accuracy  recall  precision");
    for m in [&r.naive, &r.tuned] {
        println!("  {:>9.2}  {:>8.3}  {:>6.3}  {:>9.3}", m.threshold, m.accuracy, m.recall, m.precision);
    }
    println!();
    for path in &outcome.artifacts {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn run_label(config: &PipelineConfig) -> Result<()> {
    let context = load_context(config)?;
    let summary = label_file(
        &config.paths.churn_ready_csv,
        &config.paths.final_output_csv,
        &context,
        &config.model.revenue_column,
    )?;
    println!("Saved: {} ({} rows)", config.paths.final_output_csv.display(), summary.rows);
    for (segment, count) in &summary.segment_counts {
        println!("  {segment:<10} {count}");
    }
    println!("  raw CLV total:   {:.2}", summary.total_raw_clv);
    println!("  final CLV total: {:.2}", summary.total_final_clv);
    Ok(())
}

fn run_predict(
    config: &PipelineConfig,
    features: Option<&str>,
    preset: Option<&str>,
    raw_clv: Option<f64>,
) -> Result<()> {
    let (record, preset_clv) = match (features, preset) {
        (Some(json), _) => {
            let record: serde_json::Value =
                serde_json::from_str(json).context("--features must be a JSON object")?;
            (record, None)
        }
        (None, name) => {
            let name = name.unwrap_or("default");
            let preset = CustomerPreset::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown preset '{name}'"))?;
            let (customer, clv) = preset.sample();
            (serde_json::to_value(customer)?, Some(clv))
        }
    };
    let raw_clv = raw_clv
        .or(preset_clv)
        .ok_or_else(|| anyhow::anyhow!("--raw-clv is required with --features"))?;

    let context = load_context(config)?;
    let valuation = context.value_customer(&record, raw_clv)?;

    println!("Churn probability: {:.3}", valuation.churn.probability);
    println!("Threshold:         {:.2}", valuation.churn.threshold);
    println!("Prediction:        {}",
        if valuation.churn.prediction == 1 { "Churn" } else { "Not Churn" });
    println!("Raw CLV:           {:.2}", valuation.clv.raw_clv);
    println!("Final CLV:         {:.2}", valuation.clv.final_clv);
    println!("CLV segment:       {}", valuation.segment);
    Ok(())
}

fn run_serve(config: &PipelineConfig) -> Result<()> {
    // Artifacts load fully before the first line is read; no degraded mode.
    let context = load_context(config)?;
    log::info!("serve: ready, reading commands from stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&context, stdin.lock(), stdout.lock())?;
    Ok(())
}

fn load_context(config: &PipelineConfig) -> Result<ScoringContext> {
    ScoringContext::load(&config.paths.model_dir).with_context(|| {
        format!("cannot load model artifacts from {}", config.paths.model_dir.display())
    })
}
