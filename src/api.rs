//! HTTP API Server
//!
//! REST endpoints for the frontend and the chat serving layer: personalized
//! recommendation feeds, interaction tracking, usage/cost summaries and
//! model resolution.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::persona::{self, Exchange, DEFAULT_HISTORY_WINDOW};
use crate::recommendation::{
    engine::{RecommendationEngine, ScoredCharacter},
    interactions::{record_interaction, InteractionEvent, InteractionKind},
};
use crate::usage::{
    cost::{calculate_token_cost, CostBreakdown},
    ledger,
    routing::{model_for_user, normalize_model_id, ModelRequest},
};

/// Shared application state
pub struct AppState {
    pub pool: PgPool,
    pub engine: RecommendationEngine,
    pub config: Arc<Config>,
}

/// Query params for feed endpoints
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub category: Option<String>,
    #[serde(default)]
    pub include_nsfw: bool,
}

fn default_limit() -> usize {
    20
}

/// Response for feed endpoints
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<ScoredCharacter>,
    pub total: usize,
}

/// Request body for recording interactions
#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub user_id: String,
    pub character_id: String,
    pub kind: String,
    pub source: Option<String>,
}

/// Request body for reporting an assistant turn's usage
#[derive(Debug, Deserialize)]
pub struct RecordUsageRequest {
    pub user_id: String,
    pub conversation_id: Uuid,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Request body for cost estimation
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    #[serde(default)]
    pub model: String,
    pub input_tokens: f64,
    pub output_tokens: f64,
}

/// Request body for preparing a chat turn
#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    pub character_id: Uuid,
    #[serde(default)]
    pub is_pro: bool,
    pub requested_model: Option<String>,
    #[serde(default)]
    pub history: Vec<Exchange>,
    pub message: String,
}

/// A prepared chat turn: the routed model plus the rendered prompt
#[derive(Debug, Serialize)]
pub struct PreparedTurn {
    pub model: &'static str,
    pub prompt: String,
}

/// Model resolution response
#[derive(Debug, Serialize)]
pub struct ResolvedModel {
    pub requested: String,
    pub resolved: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Start the API server
pub async fn start_server(pool: PgPool, config: Arc<Config>) -> Result<()> {
    let engine = RecommendationEngine::new(pool.clone(), config.recommendation.clone());

    let state = Arc::new(AppState {
        pool,
        engine,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Recommendation feeds
        .route(
            "/api/v1/recommendations/:user_id",
            get(get_recommendations),
        )
        .route("/api/v1/trending", get(get_trending))
        // Interaction tracking
        .route("/api/v1/interactions", post(record_user_interaction))
        // Usage accounting
        .route("/api/v1/usage", post(report_usage))
        .route("/api/v1/usage/:user_id", get(get_usage_summary))
        .route(
            "/api/v1/usage/conversation/:conversation_id",
            get(get_conversation_usage),
        )
        .route("/api/v1/usage/estimate", post(estimate_cost))
        // Model routing for the serving layer
        .route("/api/v1/chat/prepare", post(prepare_turn))
        .route("/api/v1/models/resolve/:model_id", get(resolve_model))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get personalized recommendations for a user
async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, Error> {
    let items = state
        .engine
        .get_recommendations(
            &user_id,
            query.limit,
            query.category.as_deref(),
            query.include_nsfw,
        )
        .await
        .map_err(|e| {
            error!("Failed to get recommendations: {:?}", e);
            Error::recommendation("failed to generate recommendations")
        })?;

    let total = items.len();
    Ok(Json(FeedResponse { items, total }))
}

/// Get trending characters (no personalization)
async fn get_trending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, Error> {
    let items = state
        .engine
        .get_trending(query.limit, query.category.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to get trending: {:?}", e);
            Error::recommendation("failed to rank trending characters")
        })?;

    let total = items.len();
    Ok(Json(FeedResponse { items, total }))
}

/// Record a user interaction
async fn record_user_interaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractionRequest>,
) -> Result<StatusCode, Error> {
    let Some(kind) = InteractionKind::parse(&req.kind) else {
        return Err(Error::bad_request(format!(
            "unknown interaction kind: {}",
            req.kind
        )));
    };

    let event = InteractionEvent {
        user_id: req.user_id,
        character_id: req.character_id,
        kind,
        source: req.source,
    };

    record_interaction(&state.pool, &event).await.map_err(|e| {
        error!("Failed to record interaction: {:?}", e);
        Error::database("failed to record interaction")
    })?;

    Ok(StatusCode::CREATED)
}

/// Record a turn's token usage, returning its cost breakdown
///
/// The response is advisory telemetry for the caller; recording never fails
/// over an unknown model id.
async fn report_usage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordUsageRequest>,
) -> Result<Json<CostBreakdown>, Error> {
    let row = ledger::UsageRow {
        model: req.model,
        input_tokens: req.input_tokens,
        output_tokens: req.output_tokens,
    };

    ledger::record_usage(&state.pool, &req.user_id, req.conversation_id, &row)
        .await
        .map_err(|e| {
            error!("Failed to record usage: {:?}", e);
            Error::database("failed to record usage")
        })?;

    Ok(Json(calculate_token_cost(
        &row.model,
        row.input_tokens as f64,
        row.output_tokens as f64,
    )))
}

/// Aggregated usage/cost summary for a user
async fn get_usage_summary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ledger::UsageSummary>, Error> {
    let rows = ledger::load_user_usage(
        &state.pool,
        &user_id,
        state.config.usage.summary_row_limit,
    )
    .await
    .map_err(|e| {
        error!("Failed to load usage rows: {:?}", e);
        Error::database("failed to load usage history")
    })?;

    Ok(Json(ledger::aggregate_usage(&rows)))
}

/// Aggregated usage/cost summary for a single conversation
async fn get_conversation_usage(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ledger::UsageSummary>, Error> {
    let rows = ledger::load_conversation_usage(
        &state.pool,
        conversation_id,
        state.config.usage.summary_row_limit,
    )
    .await
    .map_err(|e| {
        error!("Failed to load conversation usage: {:?}", e);
        Error::database("failed to load usage history")
    })?;

    Ok(Json(ledger::aggregate_usage(&rows)))
}

/// Pure cost estimation for a hypothetical turn
async fn estimate_cost(Json(req): Json<EstimateRequest>) -> Json<CostBreakdown> {
    Json(calculate_token_cost(
        &req.model,
        req.input_tokens,
        req.output_tokens,
    ))
}

/// Route the model and render the persona prompt for a chat turn
async fn prepare_turn(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PrepareRequest>,
) -> Result<Json<PreparedTurn>, Error> {
    let persona = persona::load_template(&state.pool, req.character_id)
        .await
        .map_err(|e| {
            error!("Failed to load persona template: {:?}", e);
            Error::database("failed to load character")
        })?
        .ok_or_else(|| Error::not_found("character", req.character_id.to_string()))?;

    let model = model_for_user(&ModelRequest {
        is_pro: req.is_pro,
        requested_model_id: req.requested_model,
    });

    let prompt = persona::render_prompt(&persona, &req.history, &req.message, DEFAULT_HISTORY_WINDOW);

    Ok(Json(PreparedTurn { model, prompt }))
}

/// Resolve an arbitrary (possibly retired) model id for the serving layer
async fn resolve_model(Path(model_id): Path<String>) -> Json<ResolvedModel> {
    Json(ResolvedModel {
        resolved: normalize_model_id(&model_id),
        requested: model_id,
    })
}
