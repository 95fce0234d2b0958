use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::models::{AnalysisKind, FoodRecord, UserProfile};
use crate::services::openai::{ChatClient, ChatError, ChatMessage, ChatRequest};
use crate::services::prompt::{PromptBuilder, PromptError};

pub const SYSTEM_INSTRUCTION: &str = "You are a nutritionist AI assistant.";
pub const TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Prefix of every failure string returned by [`NutritionAnalyzer::request_analysis`].
pub const ERROR_PREFIX: &str = "An error occurred while generating the analysis: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Template missing or malformed.
    Input,
    /// Anything that went wrong talking to the chat API.
    Remote,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Remote(#[from] ChatError),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Prompt(_) => ErrorKind::Input,
            AnalysisError::Remote(_) => ErrorKind::Remote,
        }
    }
}

/// One entry of a batch run, in the same position as its input record.
#[derive(Debug)]
pub struct BatchItem {
    pub food: String,
    pub result: Result<String, AnalysisError>,
}

pub struct NutritionAnalyzer {
    prompts: PromptBuilder,
    client: Arc<dyn ChatClient>,
    model: String,
}

impl NutritionAnalyzer {
    pub fn new(prompts: PromptBuilder, client: Arc<dyn ChatClient>, model: String) -> Self {
        Self {
            prompts,
            client,
            model,
        }
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, kind: AnalysisKind, prompt: String) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_INSTRUCTION),
                ChatMessage::user(prompt),
            ],
            max_tokens: kind.max_tokens(),
            temperature: TEMPERATURE,
        }
    }

    /// Render the prompt for `kind` and ask the model for an analysis.
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        user: &UserProfile,
        food: &FoodRecord,
    ) -> Result<String, AnalysisError> {
        let prompt = self.prompts.render(kind.template_name(), user, food)?;
        log::debug!(
            "📝 Rendered {} prompt for '{}' ({} chars)",
            kind,
            food.display_name(),
            prompt.chars().count()
        );

        let request = self.build_request(kind, prompt);
        let content = self.client.complete(&request).await?;

        log::info!("✅ Received {} analysis for '{}'", kind, food.display_name());
        Ok(content.trim().to_string())
    }

    /// String-only variant of [`analyze`](Self::analyze): failures come back as
    /// text starting with [`ERROR_PREFIX`] instead of an error.
    pub async fn request_analysis(
        &self,
        kind: AnalysisKind,
        user: &UserProfile,
        food: &FoodRecord,
    ) -> String {
        match self.analyze(kind, user, food).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("❌ {} analysis failed ({:?}): {}", kind, e.kind(), e);
                format!("{}{}", ERROR_PREFIX, e)
            }
        }
    }

    /// Analyze several records for the same user, at most `concurrency` at a time.
    /// Results keep the input order.
    pub async fn analyze_batch(
        &self,
        kind: AnalysisKind,
        user: &UserProfile,
        foods: &[FoodRecord],
        concurrency: usize,
    ) -> Vec<BatchItem> {
        log::info!(
            "📦 Starting {} batch of {} records (concurrency {})",
            kind,
            foods.len(),
            concurrency
        );

        stream::iter(foods.iter().map(move |food| async move {
            BatchItem {
                food: food.display_name().to_string(),
                result: self.analyze(kind, user, food).await,
            }
        }))
        .buffered(concurrency.max(1))
        .collect()
        .await
    }
}
