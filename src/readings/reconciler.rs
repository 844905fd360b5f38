//! Update-or-insert decision for incoming readings.
//!
//! Matching is an implicit join over arrival time: a reading joins the most
//! recent record within the tolerance window, or starts a new one. Callers
//! must serialize invocations; the ingest loop is the only writer, and the
//! read-then-write sequence below relies on that.

use crate::error::AppError;
use crate::readings::store;
use crate::readings::types::{ReadingEvent, WeatherRecord};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Updated { id: i64 },
    Inserted { id: i64 },
}

impl ReconcileOutcome {
    pub fn record_id(self) -> i64 {
        match self {
            Self::Updated { id } | Self::Inserted { id } => id,
        }
    }
}

/// At most one candidate: the latest record within `observed_at ± tolerance`.
/// Read-only.
pub async fn find_candidate(
    pool: &SqlitePool,
    observed_at: DateTime<Utc>,
    tolerance: Duration,
) -> Result<Option<WeatherRecord>, AppError> {
    store::find_in_window(pool, observed_at, tolerance).await
}

/// Exactly one store mutation per event: fill (or overwrite, last-write-wins)
/// the matching field of a windowed candidate, else insert a fresh record
/// with the sibling field unset. A failure affects this event only.
pub async fn reconcile(
    pool: &SqlitePool,
    event: &ReadingEvent,
    tolerance: Duration,
) -> Result<ReconcileOutcome, AppError> {
    match find_candidate(pool, event.observed_at, tolerance).await? {
        Some(candidate) => {
            store::update_field(pool, candidate.id, event.kind, event.value).await?;
            Ok(ReconcileOutcome::Updated { id: candidate.id })
        }
        None => {
            let id = store::insert(pool, event.observed_at, event.kind, event.value).await?;
            Ok(ReconcileOutcome::Inserted { id })
        }
    }
}
