mod config;
mod models;
mod services;
#[cfg(feature = "http-server")]
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::Config;
use models::{AnalysisKind, FoodRecord, UserProfile};
use services::{NutritionAnalyzer, OpenAiService, OpenFoodFactsClient, PromptBuilder};

#[derive(Parser)]
#[command(name = "nutrition-analyzer", version, about = "Personalised nutrition analysis for food products")]
struct Cli {
    /// Directory holding the *_prompt_template.txt files (overrides PROMPT_TEMPLATE_DIR)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one food record
    Analyze {
        kind: AnalysisKind,
        /// User profile JSON file (defaults to an empty profile)
        #[arg(long)]
        user: Option<PathBuf>,
        /// Food record JSON file
        #[arg(long, required_unless_present = "barcode", conflicts_with = "barcode")]
        food: Option<PathBuf>,
        /// Look the product up in OpenFoodFacts instead of reading a file
        #[arg(long)]
        barcode: Option<String>,
        /// Exit with an error instead of printing the error message
        #[arg(long)]
        strict: bool,
    },
    /// Analyze every record of a JSON array of food records
    Batch {
        kind: AnalysisKind,
        #[arg(long)]
        user: Option<PathBuf>,
        #[arg(long)]
        foods: PathBuf,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Print the rendered prompt without calling the API
    Render {
        kind: AnalysisKind,
        #[arg(long)]
        user: Option<PathBuf>,
        #[arg(long, required_unless_present = "barcode", conflicts_with = "barcode")]
        food: Option<PathBuf>,
        #[arg(long)]
        barcode: Option<String>,
    },
    /// Run the HTTP API
    #[cfg(feature = "http-server")]
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env applies
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            kind,
            user,
            food,
            barcode,
        } => {
            let template_dir = cli.templates.unwrap_or_else(config::template_dir_from_env);
            let builder = PromptBuilder::new(template_dir);
            let food = load_food(food.as_deref(), barcode.as_deref(), config::food_db_url_from_env()).await?;
            let prompt = builder.render(kind.template_name(), &load_user(user.as_deref())?, &food)?;
            println!("{}", prompt);
        }
        Command::Analyze {
            kind,
            user,
            food,
            barcode,
            strict,
        } => {
            let config = Config::from_env()?;
            let analyzer = build_analyzer_with(&config, cli.templates)?;
            let user = load_user(user.as_deref())?;
            let food = load_food(food.as_deref(), barcode.as_deref(), config.food_db_url.clone()).await?;

            if strict {
                let analysis = analyzer.analyze(kind, &user, &food).await?;
                println!("{}", analysis);
            } else {
                println!("{}", analyzer.request_analysis(kind, &user, &food).await);
            }
        }
        Command::Batch {
            kind,
            user,
            foods,
            concurrency,
        } => {
            let analyzer = build_analyzer(cli.templates)?;
            analyzer.prompts().validate_all()?;

            let user = load_user(user.as_deref())?;
            let foods: Vec<FoodRecord> = read_json(&foods)?;

            let items = analyzer.analyze_batch(kind, &user, &foods, concurrency).await;
            let failed = items.iter().filter(|i| i.result.is_err()).count();

            for (index, item) in items.iter().enumerate() {
                println!("=== {}. {} ===", index + 1, item.food);
                match &item.result {
                    Ok(text) => println!("{}\n", text),
                    Err(e) => println!("{}{}\n", services::analysis::ERROR_PREFIX, e),
                }
            }

            log::info!("🎉 Batch finished: {} ok, {} failed", items.len() - failed, failed);
        }
        #[cfg(feature = "http-server")]
        Command::Serve => {
            let config = Config::from_env()?;
            let analyzer = Arc::new(build_analyzer_with(&config, cli.templates)?);
            analyzer.prompts().validate_all()?;

            let food_db = Arc::new(OpenFoodFactsClient::with_base_url(config.food_db_url.clone()));
            let app = server::create_router(analyzer, food_db);
            let listener = tokio::net::TcpListener::bind(&config.server_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.server_addr))?;

            log::info!("🌐 HTTP server listening on {}", config.server_addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                    log::info!("🛑 Shutting down...");
                })
                .await?;
        }
    }

    Ok(())
}

async fn load_food(path: Option<&Path>, barcode: Option<&str>, food_db_url: String) -> Result<FoodRecord> {
    match (path, barcode) {
        (_, Some(barcode)) => {
            let food = OpenFoodFactsClient::with_base_url(food_db_url).lookup(barcode).await?;
            Ok(food)
        }
        (Some(path), None) => read_json(path),
        (None, None) => anyhow::bail!("either --food or --barcode is required"),
    }
}

fn build_analyzer(templates: Option<PathBuf>) -> Result<NutritionAnalyzer> {
    let config = Config::from_env()?;
    build_analyzer_with(&config, templates)
}

fn build_analyzer_with(config: &Config, templates: Option<PathBuf>) -> Result<NutritionAnalyzer> {
    let client = Arc::new(OpenAiService::with_base_url(
        config.api_key.clone(),
        config.base_url.clone(),
    ));
    let prompts = PromptBuilder::new(templates.unwrap_or_else(|| config.template_dir.clone()));

    let analyzer = NutritionAnalyzer::new(prompts, client, config.model.clone());
    log::info!(
        "✅ Analyzer initialized with model: {} (templates: {})",
        analyzer.model(),
        analyzer.prompts().template_dir().display()
    );
    Ok(analyzer)
}

fn load_user(path: Option<&Path>) -> Result<UserProfile> {
    match path {
        Some(path) => read_json(path),
        None => Ok(UserProfile::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid JSON in {}", path.display()))
}
