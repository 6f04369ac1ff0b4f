//! Index builder binary entry point.
//!
//! This binary runs the offline indexer: it reads a recipe corpus, fits the
//! TF-IDF vectorizer and the cosine neighbor index, and writes the bundle the
//! front-ends load.
//!
//! # Examples
//!
//! Build from the cleaned CSV export:
//! ```bash
//! build-index --input cleaned_recipe_data.csv --output recipe_index
//! ```
//!
//! Build from a JSON dump with a file name that hides its format:
//! ```bash
//! build-index --input recipes.dump --format json
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use recipe_recommender::{
    ingestion::CorpusIndexer,
    models::RecipeRow,
    provider::{CorpusFormat, CsvRecipeProvider, JsonRecipeProvider, ProviderResult, RecipeProvider},
    storage::DirectoryStorage,
    DEFAULT_BUNDLE_DIR,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wrapper enum for corpus readers to allow dynamic dispatch
enum DynamicProvider {
    Csv(CsvRecipeProvider),
    Json(JsonRecipeProvider),
}

#[async_trait]
impl RecipeProvider for DynamicProvider {
    async fn fetch_recipes(&self) -> ProviderResult<Vec<RecipeRow>> {
        match self {
            DynamicProvider::Csv(p) => p.fetch_recipes().await,
            DynamicProvider::Json(p) => p.fetch_recipes().await,
        }
    }

    async fn count_recipes(&self) -> ProviderResult<usize> {
        match self {
            DynamicProvider::Csv(p) => p.count_recipes().await,
            DynamicProvider::Json(p) => p.count_recipes().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            DynamicProvider::Csv(p) => p.name(),
            DynamicProvider::Json(p) => p.name(),
        }
    }
}

/// Corpus file format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Comma-separated export with a header row
    Csv,
    /// JSON array of recipe objects
    Json,
}

impl From<FormatArg> for CorpusFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => CorpusFormat::Csv,
            FormatArg::Json => CorpusFormat::Json,
        }
    }
}

/// Index builder CLI for the recipe recommender
#[derive(Parser, Debug)]
#[command(
    name = "build-index",
    version,
    about = "Build the recipe similarity index bundle",
    long_about = "Offline indexer: normalizes every recipe's ingredients, fits TF-IDF weights and a cosine neighbor index, and saves them with the recipe table as one bundle.

EXAMPLES:
  Build from CSV:
    build-index --input cleaned_recipe_data.csv

  Build into a custom directory:
    build-index --input recipes.json --output /srv/recipes/index

  Verbose logging:
    build-index --input cleaned_recipe_data.csv --log-level debug"
)]
struct BuildArgs {
    /// Corpus file (CSV or JSON)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Bundle directory to write
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_BUNDLE_DIR)]
    output: PathBuf,

    /// Corpus format; inferred from the file extension when omitted
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Open the corpus with the reader matching its format
async fn create_provider(args: &BuildArgs) -> Result<DynamicProvider> {
    let format = match args.format {
        Some(format) => format.into(),
        None => CorpusFormat::from_path(&args.input).context("Use --format to name the corpus format")?,
    };
    debug!("Corpus format: {:?}", format);

    let provider = match format {
        CorpusFormat::Csv => DynamicProvider::Csv(
            CsvRecipeProvider::from_file(&args.input)
                .await
                .with_context(|| format!("Failed to read CSV corpus {:?}", args.input))?,
        ),
        CorpusFormat::Json => DynamicProvider::Json(
            JsonRecipeProvider::from_file(&args.input)
                .await
                .with_context(|| format!("Failed to read JSON corpus {:?}", args.input))?,
        ),
    };
    Ok(provider)
}

/// Create a spinner for the fitting phase
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = BuildArgs::parse();

    // Initialize logging
    init_logging(&args.log_level).context("Failed to initialize logging")?;

    info!("Starting recipe index build");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    // Validate input file exists
    if !args.input.exists() {
        error!("Input file does not exist: {:?}", args.input);
        anyhow::bail!("Input file not found: {:?}", args.input);
    }
    info!("Input file: {:?}", args.input);

    // Load corpus
    let provider = create_provider(&args).await?;
    let recipe_count = provider.count_recipes().await?;
    info!("Found {} recipes in {}", recipe_count, provider.name());

    if recipe_count == 0 {
        warn!("No recipes found in input file");
        anyhow::bail!("Corpus {:?} is empty, nothing to index", args.input);
    }

    // Fit and save
    let indexer = CorpusIndexer::new(DirectoryStorage::new(&args.output));
    let spinner = create_spinner(&format!("Indexing {} recipes", recipe_count));
    let outcome = indexer.build(&provider).await;
    spinner.finish_and_clear();
    let stats = outcome.context("Failed to build index")?;

    // Display final statistics
    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Index Build Completed             ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Recipes indexed:      {:>16} ║", stats.rows_indexed);
    println!("║ Vocabulary size:      {:>16} ║", stats.vocabulary_size);
    println!("║ Empty ingredients:    {:>16} ║", stats.empty_ingredients);
    println!("║ Fallback-parsed:      {:>16} ║", stats.fallback_parsed);
    println!("║ Duplicate ids:        {:>16} ║", stats.duplicate_ids);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");
    println!("Bundle written to {}", args.output.display());

    if stats.empty_ingredients > 0 {
        warn!(
            "{} recipes have no ingredients and will never match a query",
            stats.empty_ingredients
        );
    }

    info!("Index build completed successfully");

    Ok(())
}
