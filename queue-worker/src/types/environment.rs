//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use work_queue::{ConsumerConfig, QueueSettings};

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

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
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

    /// Whether logs are emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            Self::Production | Self::Staging => None,
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

    /// Consumer tuning; unset or unparsable values fall back to engine defaults
    #[must_use]
    pub fn consumer_config(&self, queue_url: &str) -> ConsumerConfig {
        let defaults = ConsumerConfig::new(queue_url);

        ConsumerConfig {
            worker_count: parsed_var("WORKER_COUNT").unwrap_or(defaults.worker_count),
            max_messages_per_poll: parsed_var("MAX_MESSAGES_PER_POLL")
                .unwrap_or(defaults.max_messages_per_poll),
            lease_duration_seconds: parsed_var("LEASE_DURATION_SECONDS")
                .unwrap_or(defaults.lease_duration_seconds),
            long_poll_wait_seconds: parsed_var("LONG_POLL_WAIT_SECONDS")
                .unwrap_or(defaults.long_poll_wait_seconds),
            ..defaults
        }
    }

    /// Port of the health check server
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number
    pub fn health_port(&self) -> Result<u16, std::num::ParseIntError> {
        env::var("PORT").map_or(Ok(8001), |p| p.parse())
    }

    /// Simulated work done by the built-in user handlers
    #[must_use]
    pub fn handler_work_duration(&self) -> Duration {
        Duration::from_millis(parsed_var("HANDLER_WORK_MS").unwrap_or(100))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use work_queue::DeadLetterSettings;

    use super::*;

    fn clear_queue_vars() {
        for name in [
            "QUEUE_URL",
            "QUEUE_NAME",
            "DEAD_LETTER_QUEUE_NAME",
            "MAX_RECEIVE_COUNT",
            "WORKER_COUNT",
            "MAX_MESSAGES_PER_POLL",
            "LEASE_DURATION_SECONDS",
            "LONG_POLL_WAIT_SECONDS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        env::remove_var("APP_ENV");
        assert_eq!(Environment::from_env(), Environment::Development);

        env::set_var("APP_ENV", "Staging ");
        assert_eq!(Environment::from_env(), Environment::Staging);

        env::set_var("APP_ENV", "production");
        assert_eq!(Environment::from_env(), Environment::Production);

        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    #[should_panic(expected = "Invalid environment: invalid")]
    fn test_invalid_environment() {
        env::set_var("APP_ENV", "invalid");
        let _ = Environment::from_env();
        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    fn test_development_queue_defaults() {
        clear_queue_vars();

        let settings = Environment::Development.queue_settings();

        assert_eq!(
            settings,
            QueueSettings {
                queue_url: None,
                queue_name: "request-reply-queue".to_string(),
                dead_letter: None,
            }
        );
    }

    #[test]
    #[serial]
    fn test_dead_letter_settings_from_env() {
        clear_queue_vars();
        env::set_var("QUEUE_URL", "https://sqs.example/123/work");
        env::set_var("DEAD_LETTER_QUEUE_NAME", "work-dlq");
        env::set_var("MAX_RECEIVE_COUNT", "5");

        let settings = Environment::Production.queue_settings();

        assert_eq!(settings.queue_url.as_deref(), Some("https://sqs.example/123/work"));
        assert_eq!(
            settings.dead_letter,
            Some(DeadLetterSettings {
                queue_name: "work-dlq".to_string(),
                max_receive_count: 5,
            })
        );
        clear_queue_vars();
    }

    #[test]
    #[serial]
    #[should_panic(expected = "QUEUE_URL or QUEUE_NAME")]
    fn test_production_requires_queue() {
        clear_queue_vars();
        let _ = Environment::Production.queue_settings();
    }

    #[test]
    #[serial]
    fn test_consumer_config_from_env() {
        clear_queue_vars();
        env::set_var("WORKER_COUNT", "8");
        env::set_var("LONG_POLL_WAIT_SECONDS", "not-a-number");

        let config = Environment::Development.consumer_config("memory://queue");

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.long_poll_wait_seconds, 20);
        assert_eq!(config.max_messages_per_poll, 10);
        assert_eq!(config.queue_url, "memory://queue");
        clear_queue_vars();
    }
}
