use chrono::{DateTime, Utc};
use serde::Serialize;

/// The two reading streams the service reconciles. The topic decides the
/// kind; there is no correlation id on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    Temperature,
    Humidity,
}

impl ReadingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }
}

/// One scalar measurement, consumed immediately by the reconciler and never
/// persisted as-is. `observed_at` is assigned at receipt by the ingest loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingEvent {
    pub kind: ReadingKind,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// A reconciled storage row. Created with exactly one field set, completed
/// by at most one opposite-kind update; `timestamp` never changes after
/// insert.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl WeatherRecord {
    pub fn is_complete(&self) -> bool {
        self.temperature.is_some() && self.humidity.is_some()
    }

    pub fn to_complete(&self) -> Option<CompleteReadingDto> {
        Some(CompleteReadingDto {
            timestamp: self.timestamp.to_rfc3339(),
            temperature: self.temperature?,
            humidity: self.humidity?,
        })
    }
}

/// Wire shape of one `/api/data` element.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompleteReadingDto {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Per-field aggregate block. Zero-defaulted when no values contributed,
/// per the query contract.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Wire shape of `/api/stats`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReadingStats {
    pub total_readings: i64,
    pub temperature: FieldStats,
    pub humidity: FieldStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(temperature: Option<f64>, humidity: Option<f64>) -> WeatherRecord {
        WeatherRecord {
            id: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            temperature,
            humidity,
        }
    }

    #[test]
    fn kind_names_match_store_columns() {
        assert_eq!(ReadingKind::Temperature.as_str(), "temperature");
        assert_eq!(ReadingKind::Humidity.as_str(), "humidity");
    }

    #[test]
    fn completeness_requires_both_fields() {
        assert!(!record(Some(21.5), None).is_complete());
        assert!(!record(None, Some(55.0)).is_complete());
        assert!(record(Some(21.5), Some(55.0)).is_complete());
    }

    #[test]
    fn partial_record_yields_no_dto() {
        assert!(record(Some(21.5), None).to_complete().is_none());

        let dto = record(Some(21.5), Some(55.0))
            .to_complete()
            .expect("complete record should convert");
        assert_eq!(dto.temperature, 21.5);
        assert_eq!(dto.humidity, 55.0);
        assert!(dto.timestamp.starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn stats_default_to_zero() {
        let stats = ReadingStats::default();
        assert_eq!(stats.total_readings, 0);
        assert_eq!(stats.temperature.min, 0.0);
        assert_eq!(stats.humidity.avg, 0.0);
    }
}
