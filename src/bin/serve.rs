//! Banana leaf classifier web server
//!
//! Loads the trained artifact and serves the upload form on
//! `http://127.0.0.1:5000/` by default.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use banana_leaf::backend::{backend_name, default_device, DefaultBackend};
use banana_leaf::model::artifact::artifact_exists;
use banana_leaf::server::{self, AppState, ServerConfig};
use banana_leaf::utils::logging::{init_logging, LogConfig};

/// Serve the banana leaf upload form
#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(version)]
#[command(about = "Serve banana leaf disease predictions over HTTP", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _ = init_logging(&LogConfig::from_verbose_flag(args.verbose));

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    println!(
        "{}",
        "🍌 Banana Leaf Disease Classifier - Server".green().bold()
    );
    info!("Backend: {}", backend_name());
    info!("Loading model from {:?}", config.artifact);

    let artifact = config.artifact.clone();
    let state = match AppState::<DefaultBackend>::load(config, default_device()) {
        Ok(state) => state,
        Err(e) if !artifact_exists(&artifact) => {
            anyhow::bail!("Trained model not found at {:?} - run `train` first. ({})", artifact, e)
        }
        Err(e) => return Err(e).context("Failed to load the trained model"),
    };
    info!("Serving {} classes: {:?}", state.labels().len(), state.labels());

    server::serve(Arc::new(state))
        .await
        .context("Server error")?;

    Ok(())
}
