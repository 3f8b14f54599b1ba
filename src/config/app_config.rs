use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where keys and users are stored
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `postgres`
    pub backend: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for control-plane tokens
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

/// Per-caller limit on the public validation endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_secs: u64,
    /// How often idle callers are evicted from the limiter
    pub sweep_interval_secs: u64,
    /// Take the caller identity from `X-Forwarded-For`; only safe behind a trusted proxy
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: None,
            max_connections: 5,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 8,
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window_secs: 60,
            sweep_interval_secs: 300,
            trust_forwarded_for: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Invalid configuration detected at startup
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Unknown storage backend '{0}', expected 'memory' or 'postgres'")]
    UnknownBackend(String),

    #[error("storage.database_url is required for the postgres backend")]
    MissingDatabaseUrl,

    #[error("auth.jwt_secret must not be empty")]
    EmptyJwtSecret,

    #[error("auth.bootstrap_admin_username and auth.bootstrap_admin_password must be set together")]
    IncompleteBootstrapAdmin,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self.storage.backend.parse::<crate::infrastructure::storage::StorageType>() {
            Ok(crate::infrastructure::storage::StorageType::Postgres) => {
                if self.storage.database_url.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigValidationError::MissingDatabaseUrl);
                }
            }
            Ok(_) => {}
            Err(_) => {
                return Err(ConfigValidationError::UnknownBackend(
                    self.storage.backend.clone(),
                ));
            }
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigValidationError::EmptyJwtSecret);
        }

        if self.auth.bootstrap_admin_username.is_some()
            != self.auth.bootstrap_admin_password.is_some()
        {
            return Err(ConfigValidationError::IncompleteBootstrapAdmin);
        }

        Ok(())
    }
}
