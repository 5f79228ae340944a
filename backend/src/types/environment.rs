//! Environment configuration for different deployment stages

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use work_queue::{producer::MAX_DELAY_SECONDS, QueueSettings};

/// Queue used when neither `QUEUE_URL` nor `QUEUE_NAME` is set in development
const DEFAULT_DEVELOPMENT_QUEUE: &str = "request-reply-queue";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Staging)
    }

    /// Whether logs are emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// Work queue location and dead-letter wiring
    ///
    /// # Panics
    ///
    /// Panics outside development if neither `QUEUE_URL` nor `QUEUE_NAME` is set
    #[must_use]
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings::from_env(
            matches!(self, Self::Development).then_some(DEFAULT_DEVELOPMENT_QUEUE),
        )
    }

    /// Bearer tokens accepted by the API; empty accepts any bearer token
    #[must_use]
    pub fn api_tokens(&self) -> HashSet<String> {
        env::var("API_TOKENS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Delivery delay applied to queued user requests, capped at the queue maximum
    #[must_use]
    pub fn send_delay_seconds(&self) -> i32 {
        env::var("SEND_DELAY_SECONDS")
            .ok()
            .and_then(|val| val.parse::<i32>().ok())
            .map_or(0, |delay| delay.clamp(0, MAX_DELAY_SECONDS))
    }
}
