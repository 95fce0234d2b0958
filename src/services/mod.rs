pub mod analysis;
pub mod openai; // OpenAI-compatible chat completions
pub mod openfoodfacts; // Barcode product lookup
pub mod prompt;

pub use analysis::{ErrorKind, NutritionAnalyzer};
pub use openai::OpenAiService;
pub use openfoodfacts::{FoodLookupError, OpenFoodFactsClient};
pub use prompt::PromptBuilder;
