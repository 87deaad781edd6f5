use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    timing: TimingSettings,
    api: ApiSettings,
    telemetry: TelemetrySettings,
}

/// Tunables for the in-session scheduling behavior. The flush timeout only
/// applies to the deadline-triggered submission path: a slow network must not
/// hold a forced submission open forever, so after this window elapses the
/// submit call proceeds even if some answer saves are still resolving.
#[derive(Debug, Clone)]
pub struct TimingSettings {
    pub(crate) debounce_ms: u64,
    pub(crate) flush_timeout_ms: u64,
    pub(crate) countdown_tick_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub(crate) base_url: String,
    pub(crate) bearer_token: String,
    pub(crate) request_timeout_seconds: u64,
    pub(crate) connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let debounce_ms =
            parse_u64("EXAMFLOW_DEBOUNCE_MS", env_or_default("EXAMFLOW_DEBOUNCE_MS", "800"))?;
        let flush_timeout_ms = parse_u64(
            "EXAMFLOW_FLUSH_TIMEOUT_MS",
            env_or_default("EXAMFLOW_FLUSH_TIMEOUT_MS", "3000"),
        )?;
        let countdown_tick_ms = parse_u64(
            "EXAMFLOW_COUNTDOWN_TICK_MS",
            env_or_default("EXAMFLOW_COUNTDOWN_TICK_MS", "1000"),
        )?;

        let base_url = env_or_default("EXAMFLOW_API_BASE_URL", "http://localhost:8000/api/v1");
        let bearer_token = env_or_default("EXAMFLOW_API_TOKEN", "");
        let request_timeout_seconds = parse_u64(
            "EXAMFLOW_API_TIMEOUT_SECONDS",
            env_or_default("EXAMFLOW_API_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "EXAMFLOW_API_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAMFLOW_API_CONNECT_TIMEOUT_SECONDS", "5"),
        )?;

        let log_level = env_or_default("EXAMFLOW_LOG_LEVEL", "info");
        let json =
            env_optional("EXAMFLOW_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            timing: TimingSettings { debounce_ms, flush_timeout_ms, countdown_tick_ms },
            api: ApiSettings {
                base_url,
                bearer_token,
                request_timeout_seconds,
                connect_timeout_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn timing(&self) -> &TimingSettings {
        &self.timing
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_DEBOUNCE_MS",
                value: "0".to_string(),
            });
        }
        if self.timing.countdown_tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_COUNTDOWN_TICK_MS",
                value: "0".to_string(),
            });
        }
        if self.timing.flush_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_FLUSH_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("EXAMFLOW_API_BASE_URL"));
        }

        Ok(())
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
