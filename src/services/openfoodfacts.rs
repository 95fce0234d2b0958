use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::FoodRecord;

pub const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.org";

// OpenFoodFacts asks every client to identify itself
const USER_AGENT: &str = concat!("nutrition-analyzer/", env!("CARGO_PKG_VERSION"));

/// Per-100g nutriment keys and the names they get in [`FoodRecord::nutrition`].
const NUTRIMENTS: &[(&str, &str)] = &[
    ("energy-kcal_100g", "energy_kcal"),
    ("proteins_100g", "proteins_g"),
    ("carbohydrates_100g", "carbohydrates_g"),
    ("sugars_100g", "sugars_g"),
    ("fat_100g", "fat_g"),
    ("saturated-fat_100g", "saturated_fat_g"),
    ("fiber_100g", "fiber_g"),
    ("salt_100g", "salt_g"),
    ("sodium_100g", "sodium_g"),
];

#[derive(Debug, Error)]
pub enum FoodLookupError {
    #[error("invalid barcode '{0}' (expected digits only)")]
    InvalidBarcode(String),

    #[error("product {0} not found in OpenFoodFacts")]
    NotFound(String),

    #[error("request to OpenFoodFacts failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenFoodFacts error ({status}): {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<Product>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Product {
    product_name: Option<String>,
    brands: Option<String>,
    categories: Option<String>,
    ingredients_text: Option<String>,
    serving_size: Option<String>,
    serving_quantity: Option<Value>,
    nutriments: Map<String, Value>,
    nutrition_grades: Option<String>,
    nova_group: Option<Value>,
    ecoscore_grade: Option<String>,
    allergens_tags: Vec<String>,
    labels_tags: Vec<String>,
    additives_tags: Vec<String>,
}

/// Client for the OpenFoodFacts product database.
pub struct OpenFoodFactsClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenFoodFactsClient {
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn product_url(&self, barcode: &str) -> String {
        format!("{}/api/v2/product/{}", self.base_url, barcode)
    }

    /// Fetch a product by barcode and turn it into a [`FoodRecord`].
    pub async fn lookup(&self, barcode: &str) -> Result<FoodRecord, FoodLookupError> {
        let barcode = barcode.trim();
        if barcode.is_empty() || !barcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(FoodLookupError::InvalidBarcode(barcode.to_string()));
        }

        log::info!("🔎 Looking up barcode {} in OpenFoodFacts", barcode);

        let response = self
            .client
            .get(self.product_url(barcode))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenFoodFacts response status: {}", status);

        // Unknown products come back as 404 with a `status: 0` body
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FoodLookupError::NotFound(barcode.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("❌ OpenFoodFacts error ({}): {}", status, body);
            return Err(FoodLookupError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProductResponse = response.json().await?;
        match parsed.product {
            Some(product) if parsed.status == 1 => {
                let food = to_food_record(product);
                log::info!("✅ Found '{}' for barcode {}", food.display_name(), barcode);
                Ok(food)
            }
            _ => {
                log::warn!("⚠️ Product not found in OpenFoodFacts for barcode: {}", barcode);
                Err(FoodLookupError::NotFound(barcode.to_string()))
            }
        }
    }
}

fn to_food_record(product: Product) -> FoodRecord {
    let mut serving = Map::new();
    insert_some(&mut serving, "size", product.serving_size.map(Value::from));
    insert_some(&mut serving, "quantity", product.serving_quantity);

    let mut nutrition = Map::new();
    if !product.nutriments.is_empty() {
        nutrition.insert("per".to_string(), Value::from("100g"));
    }
    for (source, target) in NUTRIMENTS {
        if let Some(value) = product.nutriments.get(*source).filter(|v| !v.is_null()) {
            nutrition.insert(target.to_string(), value.clone());
        }
    }

    let mut nutrition_scores = Map::new();
    insert_some(&mut nutrition_scores, "nutriscore_grade", product.nutrition_grades.map(Value::from));
    insert_some(&mut nutrition_scores, "nova_group", product.nova_group);
    insert_some(&mut nutrition_scores, "ecoscore_grade", product.ecoscore_grade.clone().map(Value::from));

    let mut dietary_info = Map::new();
    dietary_info.insert("allergens".to_string(), tag_list(&product.allergens_tags));
    dietary_info.insert("labels".to_string(), tag_list(&product.labels_tags));
    dietary_info.insert("additives".to_string(), tag_list(&product.additives_tags));
    insert_some(&mut dietary_info, "categories", product.categories.map(Value::from));
    insert_some(&mut dietary_info, "ingredients", product.ingredients_text.map(Value::from));

    let mut environmental_impact = Map::new();
    insert_some(&mut environmental_impact, "ecoscore_grade", product.ecoscore_grade.map(Value::from));

    FoodRecord {
        name: product.product_name.filter(|s| !s.trim().is_empty()),
        brand: product.brands.filter(|s| !s.trim().is_empty()),
        serving,
        nutrition,
        nutrition_scores,
        dietary_info,
        environmental_impact,
    }
}

fn insert_some(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value.filter(|v| !v.is_null()) {
        map.insert(key.to_string(), value);
    }
}

/// `["en:milk", "en:nuts"]` -> `["milk", "nuts"]`
fn tag_list(tags: &[String]) -> Value {
    tags.iter()
        .map(|tag| tag.split_once(':').map(|(_, name)| name).unwrap_or(tag.as_str()))
        .map(|name| Value::from(name.replace('-', " ")))
        .collect()
}
