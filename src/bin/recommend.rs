//! Recommendation binary entry point.
//!
//! This binary provides a command-line interface for recipe recommendations from
//! a pre-built index bundle. It supports both single-query and interactive REPL
//! modes, with flexible output formatting (table or JSON).
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! recommend --bundle recipe_index --ingredients "egg, flour, milk"
//! ```
//!
//! JSON output with display filters:
//! ```bash
//! recommend --ingredients "chicken, rice" --format json --min-rating 4 --max-calories 500
//! ```
//!
//! Interactive mode:
//! ```bash
//! recommend --bundle recipe_index --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use recipe_recommender::{
    display::{format_ingredient_set, parse_ingredient_input, DisplayFilter},
    models::RecommendationResult,
    query::{LoadedIndex, Recommender, DEFAULT_TOP_K},
    DEFAULT_BUNDLE_DIR,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for recommendations
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored similarity
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Recommendation CLI for the recipe index
#[derive(Parser, Debug)]
#[command(
    name = "recommend",
    version,
    about = "Recommend recipes for the ingredients you have",
    long_about = "Query the recipe index with a comma-separated ingredient list. Supports both \
                  single-query and interactive modes with flexible output formatting.

EXAMPLES:
  Single query:
    recommend --ingredients \"egg, flour, milk\"

  JSON output, well-rated light recipes only:
    recommend --ingredients \"chicken, rice\" --format json --min-rating 4 --max-calories 500

  Interactive mode:
    recommend --bundle recipe_index --interactive"
)]
struct Args {
    /// Index bundle directory
    #[arg(long, value_name = "DIR", env = "RECIPE_BUNDLE", default_value = DEFAULT_BUNDLE_DIR)]
    bundle: PathBuf,

    /// Comma-separated ingredients (required for single-query mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    ingredients: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Only show recipes rated at least this high
    #[arg(long, value_name = "RATING")]
    min_rating: Option<f64>,

    /// Only show recipes with at most this many calories
    #[arg(long, value_name = "KCAL")]
    max_calories: Option<f64>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();
}

/// Run a query and apply display filters
fn execute_query(
    index: &LoadedIndex,
    input: &str,
    top_k: usize,
    filter: &DisplayFilter,
) -> Result<Vec<RecommendationResult>> {
    let ingredients = parse_ingredient_input(input);
    if ingredients.is_empty() {
        anyhow::bail!("Please enter at least one ingredient, separated by commas");
    }
    debug!("Executing query for ingredients: {:?}", ingredients);

    let results = index
        .recommend(&ingredients, top_k)
        .with_context(|| format!("Failed to recommend recipes for '{}'", input))?;

    Ok(filter.apply(results))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format results as a pretty table
fn format_results_table(results: &[RecommendationResult]) -> String {
    if results.is_empty() {
        return "No recipes found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    // Add header
    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Recipe").add_attribute(Attribute::Bold),
        Cell::new("Rating").add_attribute(Attribute::Bold),
        Cell::new("Calories").add_attribute(Attribute::Bold),
        Cell::new("You have").add_attribute(Attribute::Bold),
        Cell::new("Missing").add_attribute(Attribute::Bold),
        Cell::new("Similarity").add_attribute(Attribute::Bold),
    ]);

    // Add rows
    for (idx, result) in results.iter().enumerate() {
        let color = match result.similarity {
            s if s >= 0.75 => Color::Green,
            s if s >= 0.5 => Color::Cyan,
            s if s >= 0.25 => Color::Yellow,
            _ => Color::White,
        };

        table.add_row(vec![
            Cell::new(format!("{}", idx + 1)),
            Cell::new(truncate(&result.recipe.name, 50)),
            Cell::new(format!("{:.1}", result.recipe.rating)),
            Cell::new(format!("{:.0}", result.recipe.nutrition.calories)),
            Cell::new(truncate(&format_ingredient_set(&result.available), 40)),
            Cell::new(truncate(&format_ingredient_set(&result.missing), 40)),
            Cell::new(format!("{:.2}", result.similarity)).fg(color),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[RecommendationResult]) -> Result<String> {
    serde_json::to_string_pretty(results)
        .with_context(|| "Failed to serialize results to JSON")
}

/// Display detailed view of a single result
fn display_result_detail(result: &RecommendationResult, rank: usize) {
    let recipe = &result.recipe;
    let nutrition = &recipe.nutrition;

    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Recipe: {} (id {})", recipe.name, recipe.id);
    println!("Rating: {:.2} from {} reviews", recipe.rating, recipe.review_count);
    println!("Similarity: {:.2}", result.similarity);
    if !recipe.image_url.is_empty() {
        println!("Image: {}", recipe.image_url);
    }
    println!("\nIngredients: {}", result.ingredients.join(", "));
    println!("You have:    {}", format_ingredient_set(&result.available));
    println!("Missing:     {}", format_ingredient_set(&result.missing));
    println!(
        "\nCalories: {:.0} kcal | Fat: {:.1} g | Carbohydrates: {:.1} g | Protein: {:.1} g",
        nutrition.calories, nutrition.fat, nutrition.carbohydrates, nutrition.protein
    );
    println!(
        "Cholesterol: {:.1} mg | Sodium: {:.1} mg | Fiber: {:.1} g",
        nutrition.cholesterol, nutrition.sodium, nutrition.fiber
    );
    println!("{}", "═".repeat(80));
}

fn print_results(results: &[RecommendationResult], format: &OutputFormat, elapsed_secs: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(results));
            println!("\nFound {} recipes in {:.2}s", results.len(), elapsed_secs);
        }
        OutputFormat::Json => {
            println!("{}", format_results_json(results)?);
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  <ingredients>     - Comma-separated ingredients, e.g. egg, flour, milk");
    println!("  /top N            - Set number of results to N");
    println!("  /rating MIN       - Only show recipes rated at least MIN");
    println!("  /rating clear     - Clear rating filter");
    println!("  /calories MAX     - Only show recipes with at most MAX calories");
    println!("  /calories clear   - Clear calorie filter");
    println!("  /format table     - Use table output format");
    println!("  /format json      - Use JSON output format");
    println!("  /detail N         - Show full details for result rank N");
    println!("  /help             - Show this help");
    println!("  Ctrl+D or Ctrl+C  - Exit");
}

/// Parse a `/rating` or `/calories` argument: a number, or `clear`.
fn parse_threshold(arg: &str) -> Option<Option<f64>> {
    if arg == "clear" {
        return Some(None);
    }
    arg.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}

/// Run interactive REPL mode
fn run_interactive(
    index: LoadedIndex,
    mut top_k: usize,
    mut filter: DisplayFilter,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Recipe Recommender ({} recipes)", index.len());
    print_help();
    println!();

    let mut rl = DefaultEditor::new()
        .with_context(|| "Failed to create readline editor")?;

    let mut last_results: Vec<RecommendationResult> = Vec::new();

    loop {
        let readline = rl.readline("Ingredients> ");
        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)
                    .ok(); // Ignore errors from adding to history

                // Handle commands
                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/top" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /top N");
                                continue;
                            }
                            match parts[1].parse::<usize>() {
                                Ok(n) if n > 0 => {
                                    top_k = n;
                                    println!("Set top-k to {}", top_k);
                                }
                                _ => eprintln!("Invalid number: must be a positive integer"),
                            }
                        }
                        "/rating" => match parts.get(1).and_then(|arg| parse_threshold(arg)) {
                            Some(min) if parts.len() == 2 => {
                                filter.min_rating = min;
                                match min {
                                    Some(v) => println!("Set minimum rating to {}", v),
                                    None => println!("Cleared rating filter"),
                                }
                            }
                            _ => eprintln!("Usage: /rating MIN  or  /rating clear"),
                        },
                        "/calories" => match parts.get(1).and_then(|arg| parse_threshold(arg)) {
                            Some(max) if parts.len() == 2 => {
                                filter.max_calories = max;
                                match max {
                                    Some(v) => println!("Set maximum calories to {}", v),
                                    None => println!("Cleared calorie filter"),
                                }
                            }
                            _ => eprintln!("Usage: /calories MAX  or  /calories clear"),
                        },
                        "/format" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /format [table|json]");
                                continue;
                            }
                            match parts[1] {
                                "table" => {
                                    format = OutputFormat::Table;
                                    println!("Set output format to table");
                                }
                                "json" => {
                                    format = OutputFormat::Json;
                                    println!("Set output format to JSON");
                                }
                                _ => eprintln!("Invalid format: must be 'table' or 'json'"),
                            }
                        }
                        "/detail" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /detail N");
                                continue;
                            }
                            match parts[1].parse::<usize>() {
                                Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                    display_result_detail(&last_results[rank - 1], rank);
                                }
                                Ok(rank) if rank > last_results.len() => {
                                    eprintln!("Rank {} out of range (last query had {} results)",
                                        rank, last_results.len());
                                }
                                _ => eprintln!("Invalid rank: must be a positive integer"),
                            }
                        }
                        _ => eprintln!("Unknown command: {}. Type /help for available commands.", parts[0]),
                    }
                } else {
                    // Execute query
                    let start = Instant::now();
                    match execute_query(&index, line, top_k, &filter) {
                        Ok(results) => {
                            let elapsed = start.elapsed().as_secs_f64();
                            if let Err(e) = print_results(&results, &format, elapsed) {
                                eprintln!("Error formatting results: {}", e);
                            }
                            last_results = results;
                        }
                        Err(e) => {
                            eprintln!("Query failed: {:#}", e);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level);

    // Validate arguments
    if args.top_k == 0 {
        anyhow::bail!("--top-k must be a positive integer");
    }

    let ingredients = match (&args.ingredients, args.interactive) {
        (_, true) => None,
        (Some(text), false) => Some(text.clone()),
        (None, false) => anyhow::bail!(
            "Either --ingredients or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    // Check bundle exists
    if !args.bundle.exists() {
        anyhow::bail!(
            "Index bundle not found: {}\n\
             Please run the build-index binary first to create it.",
            args.bundle.display()
        );
    }

    info!("Loading index bundle from: {}", args.bundle.display());
    let index = LoadedIndex::load(&args.bundle)
        .await
        .with_context(|| format!("Failed to load index bundle {}", args.bundle.display()))?;
    info!(
        "Index contains {} recipes, vocabulary {}",
        index.len(),
        index.vocabulary_size()
    );

    let filter = DisplayFilter::new(args.min_rating, args.max_calories);

    // Run in appropriate mode
    match ingredients {
        None => run_interactive(index, args.top_k, filter, args.format)?,
        Some(text) => {
            let start = Instant::now();
            let results = execute_query(&index, &text, args.top_k, &filter)?;
            print_results(&results, &args.format, start.elapsed().as_secs_f64())?;
        }
    }

    Ok(())
}
