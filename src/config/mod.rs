//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, ConfigValidationError, LogFormat, LoggingConfig, MetricsConfig,
    RateLimitConfig, ServerConfig, StorageConfig,
};
