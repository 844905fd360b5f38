use crate::error::AppError;
use crate::readings::types::{FieldStats, ReadingKind, ReadingStats, WeatherRecord};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<WeatherRecord, AppError> {
    Ok(WeatherRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        temperature: row.try_get("temperature")?,
        humidity: row.try_get("humidity")?,
    })
}

/// Most recent record whose timestamp lies in the inclusive interval
/// `[center - tolerance, center + tolerance]`. Latest-first is the tie-break
/// when bursty arrival leaves several rows inside one window.
pub async fn find_in_window(
    pool: &SqlitePool,
    center: DateTime<Utc>,
    tolerance: Duration,
) -> Result<Option<WeatherRecord>, AppError> {
    let row = sqlx::query(
        "SELECT rowid AS id, timestamp, temperature, humidity \
         FROM weather_readings \
         WHERE timestamp >= ? AND timestamp <= ? \
         ORDER BY timestamp DESC \
         LIMIT 1",
    )
    .bind(center - tolerance)
    .bind(center + tolerance)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_record_row).transpose()
}

/// Writes the value unconditionally; an already-set field is overwritten
/// (last-write-wins inside the window). `timestamp` is never touched.
pub async fn update_field(
    pool: &SqlitePool,
    id: i64,
    kind: ReadingKind,
    value: f64,
) -> Result<(), AppError> {
    let sql = match kind {
        ReadingKind::Temperature => "UPDATE weather_readings SET temperature = ? WHERE rowid = ?",
        ReadingKind::Humidity => "UPDATE weather_readings SET humidity = ? WHERE rowid = ?",
    };

    let result = sqlx::query(sql).bind(value).bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::RecordNotFound(id));
    }

    Ok(())
}

/// Inserts a record with exactly one field set and returns its rowid.
pub async fn insert(
    pool: &SqlitePool,
    timestamp: DateTime<Utc>,
    kind: ReadingKind,
    value: f64,
) -> Result<i64, AppError> {
    let sql = match kind {
        ReadingKind::Temperature => {
            "INSERT INTO weather_readings (timestamp, temperature, humidity) VALUES (?, ?, NULL)"
        }
        ReadingKind::Humidity => {
            "INSERT INTO weather_readings (timestamp, temperature, humidity) VALUES (?, NULL, ?)"
        }
    };

    let result = sqlx::query(sql)
        .bind(timestamp)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Records with both fields set, newest first.
pub async fn list_complete(pool: &SqlitePool) -> Result<Vec<WeatherRecord>, AppError> {
    let rows = sqlx::query(
        "SELECT rowid AS id, timestamp, temperature, humidity \
         FROM weather_readings \
         WHERE temperature IS NOT NULL AND humidity IS NOT NULL \
         ORDER BY timestamp DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(map_record_row(&row)?);
    }

    Ok(records)
}

/// Count of rows carrying at least one reading, plus per-field min/max/avg
/// over the non-NULL values. Every statistic is zero-defaulted when no
/// values exist so the query response never carries nulls.
pub async fn aggregate(pool: &SqlitePool) -> Result<ReadingStats, AppError> {
    let row = sqlx::query(
        "SELECT \
             COUNT(*) AS total_readings, \
             COALESCE(MIN(temperature), 0.0) AS min_temperature, \
             COALESCE(MAX(temperature), 0.0) AS max_temperature, \
             COALESCE(AVG(temperature), 0.0) AS avg_temperature, \
             COALESCE(MIN(humidity), 0.0) AS min_humidity, \
             COALESCE(MAX(humidity), 0.0) AS max_humidity, \
             COALESCE(AVG(humidity), 0.0) AS avg_humidity \
         FROM weather_readings \
         WHERE temperature IS NOT NULL \
         OR humidity IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok(ReadingStats {
        total_readings: row.try_get("total_readings")?,
        temperature: FieldStats {
            min: row.try_get("min_temperature")?,
            max: row.try_get("max_temperature")?,
            avg: row.try_get("avg_temperature")?,
        },
        humidity: FieldStats {
            min: row.try_get("min_humidity")?,
            max: row.try_get("max_humidity")?,
            avg: row.try_get("avg_humidity")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn tolerance() -> Duration {
        Duration::seconds(5)
    }

    #[tokio::test]
    async fn insert_sets_exactly_one_field() {
        let pool = memory_pool().await;
        let t0 = base_time();

        let id = insert(&pool, t0, ReadingKind::Temperature, 21.5)
            .await
            .expect("insert should succeed");

        let record = find_in_window(&pool, t0, tolerance())
            .await
            .expect("lookup should succeed")
            .expect("record should be found");

        assert_eq!(record.id, id);
        assert_eq!(record.timestamp, t0);
        assert_eq!(record.temperature, Some(21.5));
        assert_eq!(record.humidity, None);
    }

    #[tokio::test]
    async fn window_bounds_are_inclusive() {
        let pool = memory_pool().await;
        let t0 = base_time();
        insert(&pool, t0, ReadingKind::Humidity, 55.0)
            .await
            .expect("insert should succeed");

        let at_edge = find_in_window(&pool, t0 + Duration::seconds(5), tolerance())
            .await
            .expect("lookup should succeed");
        assert!(at_edge.is_some());

        let past_edge = find_in_window(&pool, t0 + Duration::seconds(6), tolerance())
            .await
            .expect("lookup should succeed");
        assert!(past_edge.is_none());
    }

    #[tokio::test]
    async fn window_match_prefers_latest_record() {
        let pool = memory_pool().await;
        let t0 = base_time();
        insert(&pool, t0, ReadingKind::Temperature, 20.0)
            .await
            .expect("insert should succeed");
        let newer = insert(
            &pool,
            t0 + Duration::seconds(3),
            ReadingKind::Temperature,
            21.0,
        )
        .await
        .expect("insert should succeed");

        let record = find_in_window(&pool, t0 + Duration::seconds(2), tolerance())
            .await
            .expect("lookup should succeed")
            .expect("a record should qualify");

        assert_eq!(record.id, newer);
    }

    #[tokio::test]
    async fn update_field_leaves_sibling_and_timestamp_untouched() {
        let pool = memory_pool().await;
        let t0 = base_time();
        let id = insert(&pool, t0, ReadingKind::Temperature, 21.5)
            .await
            .expect("insert should succeed");

        update_field(&pool, id, ReadingKind::Humidity, 55.0)
            .await
            .expect("update should succeed");

        let record = find_in_window(&pool, t0, tolerance())
            .await
            .expect("lookup should succeed")
            .expect("record should be found");

        assert_eq!(record.timestamp, t0);
        assert_eq!(record.temperature, Some(21.5));
        assert_eq!(record.humidity, Some(55.0));
        assert!(record.is_complete());
    }

    #[tokio::test]
    async fn update_field_reports_vanished_row() {
        let pool = memory_pool().await;

        let result = update_field(&pool, 4242, ReadingKind::Temperature, 21.5).await;

        assert!(matches!(result, Err(AppError::RecordNotFound(4242))));
    }

    #[tokio::test]
    async fn list_complete_filters_partial_records_newest_first() {
        let pool = memory_pool().await;
        let t0 = base_time();

        let first = insert(&pool, t0, ReadingKind::Temperature, 20.0)
            .await
            .expect("insert should succeed");
        update_field(&pool, first, ReadingKind::Humidity, 50.0)
            .await
            .expect("update should succeed");

        insert(
            &pool,
            t0 + Duration::seconds(30),
            ReadingKind::Temperature,
            21.0,
        )
        .await
        .expect("insert should succeed");

        let second = insert(&pool, t0 + Duration::seconds(60), ReadingKind::Humidity, 52.0)
            .await
            .expect("insert should succeed");
        update_field(&pool, second, ReadingKind::Temperature, 22.0)
            .await
            .expect("update should succeed");

        let records = list_complete(&pool).await.expect("listing should succeed");

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(WeatherRecord::is_complete));
        assert_eq!(records[0].id, second);
        assert_eq!(records[1].id, first);
    }

    #[tokio::test]
    async fn aggregate_on_empty_store_is_all_zeros() {
        let pool = memory_pool().await;

        let stats = aggregate(&pool).await.expect("aggregate should succeed");

        assert_eq!(stats, ReadingStats::default());
    }

    #[tokio::test]
    async fn aggregate_computes_min_max_avg_per_field() {
        let pool = memory_pool().await;
        let t0 = base_time();

        for (offset, temperature) in [(0, 10.0), (60, 20.0), (120, 30.0)] {
            let id = insert(
                &pool,
                t0 + Duration::seconds(offset),
                ReadingKind::Temperature,
                temperature,
            )
            .await
            .expect("insert should succeed");
            update_field(&pool, id, ReadingKind::Humidity, 50.0)
                .await
                .expect("update should succeed");
        }

        let stats = aggregate(&pool).await.expect("aggregate should succeed");

        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.temperature, FieldStats { min: 10.0, max: 30.0, avg: 20.0 });
        assert_eq!(stats.humidity, FieldStats { min: 50.0, max: 50.0, avg: 50.0 });
    }

    #[tokio::test]
    async fn aggregate_counts_partial_records_and_zeroes_missing_field() {
        let pool = memory_pool().await;
        let t0 = base_time();

        insert(&pool, t0, ReadingKind::Temperature, 18.0)
            .await
            .expect("insert should succeed");

        let stats = aggregate(&pool).await.expect("aggregate should succeed");

        assert_eq!(stats.total_readings, 1);
        assert_eq!(stats.temperature, FieldStats { min: 18.0, max: 18.0, avg: 18.0 });
        assert_eq!(stats.humidity, FieldStats::default());
    }
}
