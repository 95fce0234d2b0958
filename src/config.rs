use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::services::analysis::DEFAULT_MODEL;
use crate::services::openai::DEFAULT_BASE_URL;
use crate::services::openfoodfacts::DEFAULT_BASE_URL as DEFAULT_FOOD_DB_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub template_dir: PathBuf,
    pub food_db_url: String,
    pub server_addr: String,
}

impl Config {
    /// Read configuration from the process environment. Call `dotenv().ok()` first
    /// to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set in the environment or .env file")?;

        Ok(Self {
            api_key,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            template_dir: template_dir(get("PROMPT_TEMPLATE_DIR")),
            food_db_url: food_db_url(get("OPENFOODFACTS_BASE_URL")),
            server_addr: get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }
}

/// Template directory alone, for commands that never call the API.
pub fn template_dir_from_env() -> PathBuf {
    template_dir(env::var("PROMPT_TEMPLATE_DIR").ok().filter(|v| !v.trim().is_empty()))
}

/// OpenFoodFacts base URL alone, for commands that never call the chat API.
pub fn food_db_url_from_env() -> String {
    food_db_url(env::var("OPENFOODFACTS_BASE_URL").ok().filter(|v| !v.trim().is_empty()))
}

fn food_db_url(value: Option<String>) -> String {
    value.unwrap_or_else(|| DEFAULT_FOOD_DB_URL.to_string())
}

fn template_dir(value: Option<String>) -> PathBuf {
    value
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("prompts"))
}
