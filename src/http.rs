use crate::error::AppError;
use crate::ingest::IngestStatusSnapshot;
use crate::readings::store;
use crate::readings::types::{CompleteReadingDto, ReadingStats, WeatherRecord};
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

const LANDING_PAGE: &str = include_str!("../assets/index.html");

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/api/data", get(get_data))
        .route("/api/stats", get(get_stats))
        .route("/api/health", get(get_health))
        .with_state(state)
}

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn get_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CompleteReadingDto>>, AppError> {
    let records = store::list_complete(&state.db_pool).await?;
    let data = records
        .iter()
        .filter_map(WeatherRecord::to_complete)
        .collect();
    Ok(Json(data))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<ReadingStats>, AppError> {
    let stats = store::aggregate(&state.db_pool).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u128,
    pub db: &'static str,
    pub ingest: IngestStatusSnapshot,
}

pub async fn build_health_response(
    started_at: Instant,
    pool: &SqlitePool,
    ingest: IngestStatusSnapshot,
) -> HealthResponse {
    let db_status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
    {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    HealthResponse {
        status: "ok",
        uptime_ms: started_at.elapsed().as_millis(),
        db: db_status,
        ingest,
    }
}

async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ingest = state.ingest_status.read().await.clone();
    Json(build_health_response(state.started_at, &state.db_pool, ingest).await)
}
