// =============================================================================
// REST API Endpoints - Axum 0.7
// =============================================================================
//
// All endpoints live under the configured prefix (`/api/v1` by default).
// Errors are returned as `{"detail": "<message>"}` with a status derived from
// the ServiceError variant.
//
// CORS is configured permissively; the API is read-only and unauthenticated.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::types::{AnalysisReport, CompanyInfo, PriceBar, StockQuote};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS, request tracing and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        .route("/health", get(health))
        .route("/stock/:ticker", get(stock_quote))
        .route("/stock/:ticker/analysis", get(stock_analysis))
        .route("/search/:query", get(search))
        .route("/analysis", post(analyze_bars));

    let prefix = state.config.api_prefix.trim_end_matches('/').to_string();
    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
    .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Data(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Network(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %detail, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %detail, "request rejected");
        }

        (status, Json(ErrorBody { detail })).into_response()
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    project: String,
    uptime_secs: u64,
    cached_analyses: usize,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        project: state.config.project_name.clone(),
        uptime_secs: state.uptime_secs(),
        cached_analyses: state.service.cached_analyses(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Stock info & analysis
// =============================================================================

async fn stock_quote(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<StockQuote>, ServiceError> {
    Ok(Json(state.service.stock_quote(&ticker).await?))
}

#[derive(Deserialize)]
struct AnalysisQuery {
    #[serde(default)]
    days: Option<u32>,
}

async fn stock_analysis(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    query: Result<Query<AnalysisQuery>, QueryRejection>,
) -> Result<Json<AnalysisReport>, ServiceError> {
    let Query(query) = query.map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    Ok(Json(state.service.analyze_stock(&ticker, query.days).await?))
}

#[derive(Serialize)]
struct SearchResponse {
    ticker: String,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Result<Json<SearchResponse>, ServiceError> {
    let ticker = state.service.search_company(&query).await?;
    Ok(Json(SearchResponse { ticker }))
}

// =============================================================================
// Caller-supplied analysis
// =============================================================================

#[derive(Deserialize)]
struct AnalyzeBarsRequest {
    company_info: CompanyInfo,
    historical_prices: Vec<PriceBar>,
}

async fn analyze_bars(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeBarsRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, ServiceError> {
    let Json(req) = payload.map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    let report = state
        .service
        .analyze_bars(req.historical_prices, req.company_info)
        .await?;
    Ok(Json(report))
}
