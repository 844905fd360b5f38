//! MQTT ingestion context. One task drives the event loop and owns every
//! store mutation; messages are handled strictly one at a time.

use crate::config::{AppConfig, MQTT_KEEP_ALIVE};
use crate::error::AppError;
use crate::readings::{parser, reconciler};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestState {
    Connecting,
    Live,
    Reconnecting,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStatusSnapshot {
    pub state: IngestState,
    pub topic_filter: String,
    pub reason: Option<String>,
}

impl IngestStatusSnapshot {
    pub fn stopped(topic_filter: String, reason: Option<String>) -> Self {
        Self {
            state: IngestState::Stopped,
            topic_filter,
            reason,
        }
    }
}

pub type SharedIngestStatus = Arc<RwLock<IngestStatusSnapshot>>;

async fn publish_status(status: &SharedIngestStatus, state: IngestState, reason: Option<String>) {
    let mut writable = status.write().await;
    writable.state = state;
    writable.reason = reason;
}

/// Runs until cancelled. Connection errors reconnect with capped backoff;
/// per-message failures log and never tear the loop down.
pub async fn run_ingest(
    config: AppConfig,
    pool: SqlitePool,
    status: SharedIngestStatus,
    cancel_token: CancellationToken,
) {
    let tolerance = config.window();

    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(MQTT_KEEP_ALIVE);
    let (client, mut event_loop) = AsyncClient::new(options, 64);

    publish_status(
        &status,
        IngestState::Connecting,
        Some(format!(
            "connecting to {}:{}",
            config.broker_host, config.broker_port
        )),
    )
    .await;

    let mut reconnect_attempt = 0_u32;
    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            // The broker does not replay subscriptions across reconnects,
            // so every ConnAck re-subscribes.
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                match client
                    .subscribe(config.topic_filter.clone(), QoS::AtMostOnce)
                    .await
                {
                    Ok(()) => {
                        reconnect_attempt = 0;
                        log::info!("subscribed to '{}'", config.topic_filter);
                        publish_status(
                            &status,
                            IngestState::Live,
                            Some("broker connected".to_string()),
                        )
                        .await;
                    }
                    Err(error) => {
                        log::error!(
                            "failed to subscribe to '{}': {error}",
                            config.topic_filter
                        );
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&pool, tolerance, &publish.topic, &publish.payload).await;
            }
            Ok(_) => {}
            Err(error) => {
                reconnect_attempt = reconnect_attempt.saturating_add(1);
                let delay = reconnect_delay(reconnect_attempt);
                log::warn!("mqtt connection error: {error}; retrying in {delay:?}");
                publish_status(
                    &status,
                    IngestState::Reconnecting,
                    Some(format!("connection error: {error}")),
                )
                .await;
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    publish_status(
        &status,
        IngestState::Stopped,
        Some("ingest stopped".to_string()),
    )
    .await;
    log::info!("ingest loop stopped");
}

/// One inbound message: stamp arrival time, parse, reconcile. Drops are
/// logged and the loop moves on; a vanished row between match and update is
/// an anomaly worth a louder note.
async fn handle_publish(
    pool: &SqlitePool,
    tolerance: chrono::Duration,
    topic: &str,
    payload: &[u8],
) {
    let observed_at = Utc::now();

    let event = match parser::parse_reading(topic, payload, observed_at) {
        Ok(Some(event)) => event,
        Ok(None) => {
            log::warn!("dropping message on unrecognized topic '{topic}'");
            return;
        }
        Err(error) => {
            log::warn!("dropping unparseable payload on '{topic}': {error}");
            return;
        }
    };

    match reconciler::reconcile(pool, &event, tolerance).await {
        Ok(outcome) => {
            log::debug!(
                "{} {} reconciled into record {}",
                event.kind.as_str(),
                event.value,
                outcome.record_id()
            );
        }
        Err(AppError::RecordNotFound(id)) => {
            log::warn!(
                "record {id} vanished between match and update; {} reading lost",
                event.kind.as_str()
            );
        }
        Err(error) => {
            log::error!("failed to persist {} reading: {error}", event.kind.as_str());
        }
    }
}

fn reconnect_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(6);
    let base_ms = 200_u64.saturating_mul(1_u64 << exponent);
    let jitter_ms = (now_unix_ms().unsigned_abs() % 250).min(249);
    Duration::from_millis((base_ms + jitter_ms).min(5_000))
}

fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}
