//! Banana leaf classifier trainer
//!
//! Trains the CNN on `dataset/train/<class>/*` and writes the model artifact.
//! With no flags this runs the fixed configuration from the library constants.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use banana_leaf::backend::{backend_name, TrainingBackend};
use banana_leaf::training::{run_training, TrainingConfig};
use banana_leaf::utils::logging::{init_logging, LogConfig};

/// Train the banana leaf disease classifier
#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(version)]
#[command(about = "Train the banana leaf disease CNN", long_about = None)]
struct Args {
    /// Number of training epochs
    #[arg(short, long, default_value_t = banana_leaf::EPOCHS)]
    epochs: usize,

    /// Random seed for shuffling and augmentation
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _ = init_logging(&LogConfig::from_verbose_flag(args.verbose));

    print_banner();

    let config = TrainingConfig {
        epochs: args.epochs,
        seed: args.seed,
        ..TrainingConfig::default()
    };
    info!("Backend: {}", backend_name());
    info!("Training configuration: {:?}", config);

    let history = run_training::<TrainingBackend>(&config)?;
    info!(
        "Trained {} epochs on {} images ({} held out)",
        history.epochs.len(),
        history.train_samples,
        history.validation_samples
    );

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ==========================================================
   🍌 Banana Leaf Disease Classifier - Training
   CNN training with Burn + Rust
 ==========================================================
  "#
        .green()
    );
}
