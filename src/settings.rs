//! Process settings from the environment (`.env` honored) and tracing setup.

use crate::error::ConfigError;
use crate::flavor::Flavor;
use crate::routes::DEFAULT_BODY_LIMIT;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: Option<String>,
    pub resources_path: PathBuf,
    pub bind_addr: String,
    pub flavor: Flavor,
    pub max_connections: u32,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let flavor = match get("SERVICE_FLAVOR") {
            Some(raw) => raw.parse::<Flavor>().map_err(ConfigError::Validation)?,
            None => Flavor::Api,
        };
        Ok(Settings {
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            resources_path: get("RESOURCES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("resources.json")),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            flavor,
            max_connections: number(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            body_limit: number(&get, "BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("DATABASE_URL is not set".into()))
    }
}

fn number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{} must be a number, got '{}'", key, raw))),
    }
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default `resource_kit=info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_kit=info")),
        )
        .init();
}
