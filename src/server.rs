use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{AnalysisKind, FoodRecord, UserProfile};
use crate::services::{ErrorKind, FoodLookupError, NutritionAnalyzer, OpenFoodFactsClient};

pub struct AppState {
    pub analyzer: Arc<NutritionAnalyzer>,
    pub food_db: Arc<OpenFoodFactsClient>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub user: UserProfile,
    pub food: FoodRecord,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub kind: AnalysisKind,
    pub food: String,
    pub analysis: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router(analyzer: Arc<NutritionAnalyzer>, food_db: Arc<OpenFoodFactsClient>) -> Router {
    let state = Arc::new(AppState { analyzer, food_db });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/analysis/:kind", post(analysis_handler))
        .route("/api/food/:barcode", get(food_lookup_handler))
        .with_state(state)
}

async fn food_lookup_handler(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
) -> Result<Json<FoodRecord>, ApiError> {
    state.food_db.lookup(&barcode).await.map(Json).map_err(|e| {
        let (status, kind) = match &e {
            FoodLookupError::InvalidBarcode(_) => (StatusCode::BAD_REQUEST, ErrorKind::Input),
            FoodLookupError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorKind::Input),
            FoodLookupError::Http(_) | FoodLookupError::Api { .. } => {
                (StatusCode::BAD_GATEWAY, ErrorKind::Remote)
            }
        };
        log::error!("❌ Barcode lookup failed: {}", e);
        (
            status,
            Json(ErrorResponse {
                error: e.to_string(),
                kind,
            }),
        )
    })
}

async fn analysis_handler(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(body): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let kind = AnalysisKind::from_string(&kind).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown analysis kind '{}'", kind),
                kind: ErrorKind::Input,
            }),
        )
    })?;

    log::info!("🔔 {} analysis requested for '{}'", kind, body.food.display_name());

    match state.analyzer.analyze(kind, &body.user, &body.food).await {
        Ok(analysis) => Ok(Json(AnalysisResponse {
            kind,
            food: body.food.display_name().to_string(),
            analysis,
            generated_at: Utc::now(),
        })),
        Err(e) => {
            log::error!("❌ {} analysis failed: {}", kind, e);
            let status = match e.kind() {
                ErrorKind::Input => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Remote => StatusCode::BAD_GATEWAY,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                    kind: e.kind(),
                }),
            ))
        }
    }
}

async fn root_handler() -> &'static str {
    "Nutrition Analyzer - POST /api/analysis/{simple|detailed} with {\"user\": ..., \"food\": ...}, GET /api/food/{barcode}"
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openai::{ChatClient, ChatError, ChatRequest};
    use crate::services::PromptBuilder;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct FixedClient(Result<&'static str, u16>);

    #[async_trait::async_trait]
    impl ChatClient for FixedClient {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(ChatError::Api {
                    status,
                    body: "upstream failure".to_string(),
                }),
            }
        }
    }

    fn router_with(client: FixedClient, template_dir: &std::path::Path, food_db_url: String) -> Router {
        let analyzer = NutritionAnalyzer::new(
            PromptBuilder::new(template_dir),
            Arc::new(client),
            "gpt-4o-mini".to_string(),
        );
        create_router(
            Arc::new(analyzer),
            Arc::new(OpenFoodFactsClient::with_base_url(food_db_url)),
        )
    }

    fn router(client: FixedClient) -> Router {
        router_with(
            client,
            std::path::Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts")),
            "http://127.0.0.1:9".to_string(),
        )
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analysis_success() {
        let app = router(FixedClient(Ok("\n Looks balanced. \n")));
        let request = post_json(
            "/api/analysis/detailed",
            serde_json::json!({
                "user": {"age": 29, "allergies": "peanuts"},
                "food": {"name": "Trail Mix", "brand": "Hike Co"}
            }),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "detailed");
        assert_eq!(body["food"], "Trail Mix");
        assert_eq!(body["analysis"], "Looks balanced.");
    }

    #[tokio::test]
    async fn test_remote_error_maps_to_bad_gateway() {
        let app = router(FixedClient(Err(429)));
        let request = post_json("/api/analysis/simple", serde_json::json!({"food": {}}));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "remote");
        assert!(body["error"].as_str().unwrap().contains("429"));
    }

    #[tokio::test]
    async fn test_missing_template_maps_to_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_with(FixedClient(Ok("unused")), dir.path(), "http://127.0.0.1:9".to_string());
        let request = post_json("/api/analysis/simple", serde_json::json!({"food": {}}));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "input");
        assert!(body["error"].as_str().unwrap().contains("simple_prompt_template.txt"));
    }

    #[tokio::test]
    async fn test_food_lookup() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/product/5000159484695")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":1,"product":{"product_name":"Digestive","brands":"McVitie's","nutrition_grades":"d"}}"#)
            .create_async()
            .await;
        let app = router_with(
            FixedClient(Ok("unused")),
            std::path::Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts")),
            server.url(),
        );
        let request = Request::builder()
            .uri("/api/food/5000159484695")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["name"], "Digestive");
        assert_eq!(body["brand"], "McVitie's");
        assert_eq!(body["nutrition_scores"]["nutriscore_grade"], "d");
    }

    #[tokio::test]
    async fn test_food_lookup_bad_barcode() {
        let app = router(FixedClient(Ok("unused")));
        let request = Request::builder()
            .uri("/api/food/not-a-barcode")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["kind"], "input");
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let app = router(FixedClient(Ok("unused")));
        let request = post_json("/api/analysis/weekly", serde_json::json!({"food": {}}));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = router(FixedClient(Ok("unused")));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
