use crate::error::AppError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BROKER_HOST: &str = "localhost";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "weatherhub";
pub const DEFAULT_TOPIC_FILTER: &str = "/work_group_01/room_temp/#";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_DB_PATH: &str = "weather_data.db";
pub const DEFAULT_WINDOW_SECS: i64 = 5;
pub const MIN_WINDOW_SECS: i64 = 1;
pub const MAX_WINDOW_SECS: i64 = 3600;
pub const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Raw, unvalidated settings as read from the environment. `None` means the
/// variable was unset or blank and the compiled-in default applies.
#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub broker_host: Option<String>,
    pub broker_port: Option<String>,
    pub client_id: Option<String>,
    pub topic_filter: Option<String>,
    pub http_addr: Option<String>,
    pub db_path: Option<String>,
    pub window_secs: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub topic_filter: String,
    pub http_addr: SocketAddr,
    pub db_path: PathBuf,
    pub window_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        AppConfigOverrides::from_env().normalize()
    }

    /// Matching tolerance as a chrono duration, for timestamp arithmetic.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs)
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfigOverrides {
    pub fn from_env() -> Self {
        Self {
            broker_host: env_trimmed("WEATHERHUB_BROKER_HOST"),
            broker_port: env_trimmed("WEATHERHUB_BROKER_PORT"),
            client_id: env_trimmed("WEATHERHUB_CLIENT_ID"),
            topic_filter: env_trimmed("WEATHERHUB_TOPIC_FILTER"),
            http_addr: env_trimmed("WEATHERHUB_HTTP_ADDR"),
            db_path: env_trimmed("WEATHERHUB_DB_PATH"),
            window_secs: env_trimmed("WEATHERHUB_WINDOW_SECS"),
        }
    }

    pub fn normalize(self) -> Result<AppConfig, AppError> {
        let broker_host = self
            .broker_host
            .unwrap_or_else(|| DEFAULT_BROKER_HOST.to_string());
        if broker_host.is_empty() {
            return Err(AppError::InvalidConfig(
                "WEATHERHUB_BROKER_HOST must be non-empty".to_string(),
            ));
        }

        let broker_port = match self.broker_port {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                AppError::InvalidConfig(format!(
                    "WEATHERHUB_BROKER_PORT must be a port number, got '{raw}'"
                ))
            })?,
            None => DEFAULT_BROKER_PORT,
        };

        let client_id = self
            .client_id
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let topic_filter = self
            .topic_filter
            .unwrap_or_else(|| DEFAULT_TOPIC_FILTER.to_string());
        if topic_filter.is_empty() {
            return Err(AppError::InvalidConfig(
                "WEATHERHUB_TOPIC_FILTER must be non-empty".to_string(),
            ));
        }

        let http_addr_raw = self
            .http_addr
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = http_addr_raw.parse::<SocketAddr>().map_err(|_| {
            AppError::InvalidConfig(format!(
                "WEATHERHUB_HTTP_ADDR must be a host:port socket address, got '{http_addr_raw}'"
            ))
        })?;

        let db_path = PathBuf::from(self.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));

        let window_secs = match self.window_secs {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AppError::InvalidConfig(format!(
                    "WEATHERHUB_WINDOW_SECS must be an integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_WINDOW_SECS,
        };
        if !(MIN_WINDOW_SECS..=MAX_WINDOW_SECS).contains(&window_secs) {
            return Err(AppError::InvalidConfig(format!(
                "WEATHERHUB_WINDOW_SECS must be between {MIN_WINDOW_SECS} and {MAX_WINDOW_SECS}"
            )));
        }

        Ok(AppConfig {
            broker_host,
            broker_port,
            client_id,
            topic_filter,
            http_addr,
            db_path,
            window_secs,
        })
    }
}
