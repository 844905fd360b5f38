use crate::error::AppError;
use crate::readings::types::{ReadingEvent, ReadingKind};
use chrono::{DateTime, Utc};

/// Kind marker is a case-sensitive substring of the topic; temperature wins
/// when a topic somehow carries both markers.
pub fn kind_from_topic(topic: &str) -> Option<ReadingKind> {
    if topic.contains("temperature") {
        Some(ReadingKind::Temperature)
    } else if topic.contains("humidity") {
        Some(ReadingKind::Humidity)
    } else {
        None
    }
}

/// Decodes one inbound message. `Ok(None)` means the topic carries no
/// recognized kind marker and the message is dropped; a malformed payload is
/// an error for the caller to log, never a fatal condition.
pub fn parse_reading(
    topic: &str,
    payload: &[u8],
    observed_at: DateTime<Utc>,
) -> Result<Option<ReadingEvent>, AppError> {
    let Some(kind) = kind_from_topic(topic) else {
        return Ok(None);
    };

    let text = std::str::from_utf8(payload)
        .map_err(|_| AppError::InvalidPayload(format!("non-utf8 payload on topic '{topic}'")))?;
    let value = text.trim().parse::<f64>()?;
    if !value.is_finite() {
        return Err(AppError::InvalidPayload(format!(
            "{} value must be finite, got '{}'",
            kind.as_str(),
            text.trim()
        )));
    }

    Ok(Some(ReadingEvent {
        kind,
        value,
        observed_at,
    }))
}
