use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use settlement_common::helpers::parse_boolean_flag;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DIAGNOSTIC_CANDIDATES: usize = 10;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value ({value}). {reason}")]
    InvalidValue { var: &'static str, value: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a session waits for the writer lock before giving up with a transient error.
    pub busy_timeout: Duration,
    /// The number of recent unsettled orders attached to the diagnostics of an unresolvable notification.
    pub diagnostic_candidates: usize,
    pub event_buffer_size: usize,
    /// Allow the line-item resolver to consume the user's unlinked working selection.
    pub allow_selection_fallback: bool,
    /// Allow the line-item resolver to infer a quantity from the order total. This fallback is lossy.
    pub allow_quantity_inference: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            diagnostic_candidates: DEFAULT_DIAGNOSTIC_CANDIDATES,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            allow_selection_fallback: true,
            allow_quantity_inference: true,
        }
    }
}

impl SettlementConfig {
    pub fn new(database_url: &str) -> Self {
        Self { database_url: database_url.to_string(), ..Default::default() }
    }

    /// Reads the configuration from `STL_*` environment variables. Any invalid value is an error.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let database_url = env::var("STL_DATABASE_URL").ok().unwrap_or(defaults.database_url);
        let max_connections = positive_var("STL_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections);
        let busy_timeout =
            positive_var::<u64>("STL_BUSY_TIMEOUT_MS")?.map(Duration::from_millis).unwrap_or(defaults.busy_timeout);
        let diagnostic_candidates = parse_var("STL_DIAGNOSTIC_CANDIDATES")?.unwrap_or(defaults.diagnostic_candidates);
        let event_buffer_size = positive_var("STL_EVENT_BUFFER_SIZE")?.unwrap_or(defaults.event_buffer_size);
        let allow_selection_fallback =
            parse_boolean_flag(env::var("STL_ALLOW_SELECTION_FALLBACK").ok(), defaults.allow_selection_fallback);
        let allow_quantity_inference =
            parse_boolean_flag(env::var("STL_ALLOW_QUANTITY_INFERENCE").ok(), defaults.allow_quantity_inference);
        Ok(Self {
            database_url,
            max_connections,
            busy_timeout,
            diagnostic_candidates,
            event_buffer_size,
            allow_selection_fallback,
            allow_quantity_inference,
        })
    }

    /// Like [`Self::try_from_env`], but invalid values are logged and replaced by their defaults.
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let database_url = env::var("STL_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ STL_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            defaults.database_url.clone()
        });
        let max_connections = or_default(positive_var("STL_MAX_CONNECTIONS"), defaults.max_connections);
        let busy_timeout = Duration::from_millis(or_default(positive_var("STL_BUSY_TIMEOUT_MS"), DEFAULT_BUSY_TIMEOUT_MS));
        let diagnostic_candidates = or_default(parse_var("STL_DIAGNOSTIC_CANDIDATES"), defaults.diagnostic_candidates);
        let event_buffer_size = or_default(positive_var("STL_EVENT_BUFFER_SIZE"), defaults.event_buffer_size);
        let allow_selection_fallback =
            parse_boolean_flag(env::var("STL_ALLOW_SELECTION_FALLBACK").ok(), defaults.allow_selection_fallback);
        let allow_quantity_inference =
            parse_boolean_flag(env::var("STL_ALLOW_QUANTITY_INFERENCE").ok(), defaults.allow_quantity_inference);
        if !allow_selection_fallback || !allow_quantity_inference {
            info!(
                "🪛️ Line-item fallbacks: selection={allow_selection_fallback}, quantity inference={allow_quantity_inference}"
            );
        }
        Self {
            database_url,
            max_connections,
            busy_timeout,
            diagnostic_candidates,
            event_buffer_size,
            allow_selection_fallback,
            allow_quantity_inference,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_fallbacks(mut self, selection: bool, quantity_inference: bool) -> Self {
        self.allow_selection_fallback = selection;
        self.allow_quantity_inference = quantity_inference;
        self
    }
}

fn or_default<T: Display + Copy>(value: Result<Option<T>, ConfigError>, default: T) -> T {
    match value {
        Ok(v) => v.unwrap_or(default),
        Err(e) => {
            error!("🪛️ {e} Using the default, {default}, instead.");
            default
        },
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|e| ConfigError::InvalidValue {
            var,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

fn positive_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + Default + PartialEq + Display,
    T::Err: Display,
{
    match parse_var::<T>(var)? {
        Some(v) if v == T::default() => Err(ConfigError::InvalidValue {
            var,
            value: v.to_string(),
            reason: "The value must be greater than zero.".to_string(),
        }),
        v => Ok(v),
    }
}
