//! HTTP server binary entry point.
//!
//! This binary starts the recommendation service. It binds the listener right
//! away and loads the index bundle in the background; until the load finishes
//! (or if it fails) every recommendation request answers 503.
//!
//! # Examples
//!
//! ```bash
//! server --bundle recipe_index --port 5000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use recipe_recommender::{
    query::{LoadedIndex, ModelSlot, DEFAULT_TOP_K},
    server::{self, ServerConfig},
    DEFAULT_BUNDLE_DIR,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// HTTP front-end for the recipe recommender
#[derive(Parser, Debug)]
#[command(
    name = "server",
    version,
    about = "Serve recipe recommendations over HTTP",
    long_about = "Serves POST /recommend and GET /health. The index bundle is loaded once in the \
                  background after the listener is bound.

EXAMPLES:
  Default address (0.0.0.0:5000):
    server --bundle recipe_index

  Local only, ten results per request by default:
    server --host 127.0.0.1 --port 8080 --default-k 10"
)]
struct Args {
    /// Index bundle directory
    #[arg(long, value_name = "DIR", env = "RECIPE_BUNDLE", default_value = DEFAULT_BUNDLE_DIR)]
    bundle: PathBuf,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Result count for requests that do not send `top_k`
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_K)]
    default_k: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    if args.default_k == 0 {
        anyhow::bail!("--default-k must be a positive integer");
    }

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        default_top_k: args.default_k,
    };

    // Load the bundle in the background; requests see 503 until it lands
    let slot = Arc::new(ModelSlot::new());
    let loader_slot = Arc::clone(&slot);
    let bundle = args.bundle;
    tokio::spawn(async move {
        info!("Loading index bundle from {}", bundle.display());
        loader_slot.install(LoadedIndex::load(&bundle).await);
    });

    server::serve(&config, slot)
        .await
        .with_context(|| format!("Server on {}:{} stopped", config.host, config.port))?;

    Ok(())
}
