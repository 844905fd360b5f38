use crate::ingest::{IngestStatusSnapshot, SharedIngestStatus};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

pub struct AppState {
    pub started_at: Instant,
    pub db_pool: SqlitePool,
    pub ingest_status: SharedIngestStatus,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, topic_filter: String) -> Self {
        let ingest_status =
            IngestStatusSnapshot::stopped(topic_filter, Some("ingest idle".to_string()));

        Self {
            started_at: Instant::now(),
            db_pool,
            ingest_status: Arc::new(RwLock::new(ingest_status)),
        }
    }
}
