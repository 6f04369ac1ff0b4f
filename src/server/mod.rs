//! HTTP server module.
//!
//! This module exposes the recommendation engine over HTTP:
//!
//! - `POST /recommend` with `{"ingredients": "egg, flour", "top_k": 5}` returns
//!   a JSON array of recommendations. `ingredients` may also be a JSON array.
//! - `GET /health` reports whether the index has finished loading.
//!
//! The server starts listening before the index is loaded. Until the model
//! slot is filled, `/recommend` answers 503.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::display::parse_ingredient_input;
use crate::models::RecommendationResult;
use crate::query::{ModelSlot, QueryError, Recommender, SlotState, DEFAULT_TOP_K};

/// Errors that can occur while running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration (e.g. an unparsable bind address)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listening socket could not be opened
    #[error("Failed to bind {addr}: {reason}")]
    BindError { addr: String, reason: String },

    /// The server stopped with an error
    #[error("Server error: {0}")]
    ServeError(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Message returned for any load or availability failure.
pub const SERVICE_UNAVAILABLE: &str = "service unavailable";

/// Message returned when the request carries no usable ingredient.
pub const NO_INGREDIENTS: &str = "No ingredients provided";

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Result count used when a request does not set `top_k`
    pub default_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if host and port do not form a socket address
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::InvalidConfig(format!("{}:{}: {}", self.host, self.port, e)))
    }
}

/// Ingredients as sent by a client: comma-separated text or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngredientInput {
    Text(String),
    List(Vec<String>),
}

impl Default for IngredientInput {
    fn default() -> Self {
        IngredientInput::Text(String::new())
    }
}

impl IngredientInput {
    /// Clean tokens: trimmed, lower-cased, no empties.
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            IngredientInput::Text(text) => parse_ingredient_input(&text),
            IngredientInput::List(items) => items
                .iter()
                .flat_map(|item| parse_ingredient_input(item))
                .collect(),
        }
    }
}

/// Request payload for `POST /recommend`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub ingredients: IngredientInput,

    /// Number of results; defaults to the server's configured value
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Error body returned with any non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response payload for `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `loading`, `ready`, or `failed`
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipes: Option<usize>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    slot: Arc<ModelSlot>,
    default_top_k: usize,
}

impl AppState {
    pub fn new(slot: Arc<ModelSlot>, default_top_k: usize) -> Self {
        Self {
            slot,
            default_top_k,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn query_error_response(err: QueryError) -> ApiError {
    match err {
        QueryError::InvalidQuery(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        QueryError::ModelUnavailable(reason) => {
            debug!(reason = %reason, "Rejecting query, model unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, SERVICE_UNAVAILABLE)
        }
    }
}

/// Handle `POST /recommend`.
///
/// A body that is not a JSON request object is treated like one without
/// ingredients.
pub async fn recommend_handler(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<Vec<RecommendationResult>>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Rejecting malformed request body");
        error_response(StatusCode::BAD_REQUEST, NO_INGREDIENTS)
    })?;
    let ingredients = request.ingredients.into_tokens();
    if ingredients.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, NO_INGREDIENTS));
    }
    let k = request.top_k.unwrap_or(state.default_top_k);

    let slot = Arc::clone(&state.slot);
    let outcome = tokio::task::spawn_blocking(move || slot.recommend(&ingredients, k))
        .await
        .map_err(|e| {
            error!(error = %e, "Recommendation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        })?;

    outcome.map(Json).map_err(query_error_response)
}

/// Handle `GET /health`.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.slot.state() {
        SlotState::Ready => {
            let recipes = state.slot.get().ok().map(|index| index.len());
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "ready".to_string(),
                    recipes,
                }),
            )
        }
        SlotState::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "loading".to_string(),
                recipes: None,
            }),
        ),
        SlotState::Failed => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "failed".to_string(),
                recipes: None,
            }),
        ),
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/recommend", post(recommend_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
///
/// # Arguments
/// * `config` - Network settings and request defaults
/// * `slot` - Model slot, possibly still empty; it is filled by the caller
///
/// # Errors
/// Returns `ServerError` if the address is invalid, cannot be bound, or the
/// server stops with an error
pub async fn serve(config: &ServerConfig, slot: Arc<ModelSlot>) -> ServerResult<()> {
    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindError {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    info!(addr = %addr, "Listening");
    let app = router(AppState::new(slot, config.default_top_k));
    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::ServeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::build_bundle;
    use crate::models::{RawField, RawIngredients, RecipeRow};
    use crate::query::LoadedIndex;
    use crate::storage::LoadError;

    fn create_test_row(id: f64, ingredients: &str) -> RecipeRow {
        RecipeRow {
            recipe_id: RawField::Number(id),
            recipe_name: format!("Recipe {}", id),
            ingredients_list: RawIngredients::from(ingredients),
            image_url: String::new(),
            aver_rate: RawField::Number(4.0),
            review_nums: RawField::Number(10.0),
            calories: RawField::Number(200.0),
            fat: RawField::Number(5.0),
            carbohydrates: RawField::Number(20.0),
            protein: RawField::Number(8.0),
            cholesterol: RawField::Number(30.0),
            sodium: RawField::Number(100.0),
            fiber: RawField::Number(2.0),
        }
    }

    fn ready_state() -> AppState {
        let (bundle, _) = build_bundle(vec![
            create_test_row(1.0, "['egg', 'flour']"),
            create_test_row(2.0, "['egg', 'milk', 'sugar']"),
            create_test_row(3.0, "['chicken', 'rice']"),
        ])
        .unwrap();
        let index = LoadedIndex::from_bundle(bundle).unwrap();
        AppState::new(Arc::new(ModelSlot::ready(index)), 2)
    }

    fn request(body: serde_json::Value) -> Result<Json<RecommendRequest>, JsonRejection> {
        Ok(Json(serde_json::from_value(body).unwrap()))
    }

    /// Serve `state` on an ephemeral port and send one raw HTTP request.
    async fn raw_post(state: AppState, content_type: Option<&str>, body: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let mut head = format!(
            "POST /recommend HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nContent-Length: {}\r\n",
            addr,
            body.len()
        );
        if let Some(content_type) = content_type {
            head.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        head.push_str("\r\n");

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.default_top_k, DEFAULT_TOP_K);
        assert!(config.socket_addr().is_ok());

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(bad.socket_addr(), Err(ServerError::InvalidConfig(_))));
    }

    #[test]
    fn test_request_deserialization() {
        let req: RecommendRequest =
            serde_json::from_str(r#"{"ingredients": "Egg, flour,  "}"#).unwrap();
        assert_eq!(req.ingredients.into_tokens(), vec!["egg", "flour"]);
        assert!(req.top_k.is_none());

        let req: RecommendRequest =
            serde_json::from_str(r#"{"ingredients": ["Egg", " rice "], "top_k": 3}"#).unwrap();
        assert_eq!(req.ingredients.into_tokens(), vec!["egg", "rice"]);
        assert_eq!(req.top_k, Some(3));

        let req: RecommendRequest = serde_json::from_str("{}").unwrap();
        assert!(req.ingredients.into_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_handler_success() {
        let response = recommend_handler(
            State(ready_state()),
            request(serde_json::json!({"ingredients": "egg, flour"})),
        )
        .await
        .unwrap();

        let results = response.0;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].recipe.id, 1);
        assert_eq!(results[1].recipe.id, 2);
    }

    #[tokio::test]
    async fn test_recommend_handler_empty_input() {
        let err = recommend_handler(
            State(ready_state()),
            request(serde_json::json!({"ingredients": " , "})),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1 .0.error, NO_INGREDIENTS);
    }

    #[tokio::test]
    async fn test_recommend_handler_zero_k() {
        let err = recommend_handler(
            State(ready_state()),
            request(serde_json::json!({"ingredients": "egg", "top_k": 0})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recommend_handler_while_loading() {
        let state = AppState::new(Arc::new(ModelSlot::new()), 5);
        let err = recommend_handler(State(state), request(serde_json::json!({"ingredients": "egg"})))
            .await
            .unwrap_err();

        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.1 .0.error, SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_bad_request() {
        let cases = [
            (None, "garbage"),
            (Some("application/json"), "garbage"),
            (Some("application/json"), r#"{"ingredients": 5}"#),
            (Some("text/plain"), r#"{"ingredients": "egg"}"#),
        ];

        for (content_type, body) in cases {
            let response = raw_post(ready_state(), content_type, body).await;
            assert!(
                response.starts_with("HTTP/1.1 400"),
                "{:?} {:?} answered: {}",
                content_type,
                body,
                response
            );
            assert!(response.contains(r#"{"error":"No ingredients provided"}"#), "{}", response);
        }
    }

    #[tokio::test]
    async fn test_well_formed_body_over_http() {
        let response = raw_post(
            ready_state(),
            Some("application/json"),
            r#"{"ingredients": "egg, flour", "top_k": 1}"#,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains(r#""recipe_id":1"#), "{}", response);
    }

    #[tokio::test]
    async fn test_health_handler_states() {
        let (status, body) = health_handler(State(ready_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0.status, "ready");
        assert_eq!(body.0.recipes, Some(3));

        let slot = Arc::new(ModelSlot::new());
        let state = AppState::new(Arc::clone(&slot), 5);
        let (status, body) = health_handler(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0.status, "loading");

        slot.install(Err(LoadError::Missing("recipes.json".to_string())));
        let (status, body) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0.status, "failed");
    }
}
