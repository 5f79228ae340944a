use std::time::Duration;

/// Default maximum number of messages per receive call
pub const DEFAULT_MAX_MESSAGES_PER_POLL: i32 = 10;
/// Default lease duration in seconds
pub const DEFAULT_LEASE_DURATION_SECONDS: i32 = 30;
/// Default long-poll wait in seconds
pub const DEFAULT_LONG_POLL_WAIT_SECONDS: i32 = 20;
/// Default number of workers
pub const DEFAULT_WORKER_COUNT: usize = 5;

const MAX_MESSAGES_PER_POLL: i32 = 10;
const MAX_LONG_POLL_WAIT_SECONDS: i32 = 20;
const MAX_LEASE_DURATION_SECONDS: i32 = 43_200;
const HANDLER_TIMEOUT_MARGIN_SECONDS: i32 = 5;
const MIN_HANDLER_TIMEOUT_SECONDS: i32 = 1;

/// Configuration of a [`super::Consumer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Queue to consume from
    pub queue_url: String,
    /// Messages requested per receive call, 1 to 10
    pub max_messages_per_poll: i32,
    /// Lease applied to received messages, 1 to 43200 seconds
    pub lease_duration_seconds: i32,
    /// Long-poll wait, up to 20 seconds
    pub long_poll_wait_seconds: i32,
    /// Number of concurrent workers
    pub worker_count: usize,
}

impl ConsumerConfig {
    /// Creates a configuration with default tuning
    #[must_use]
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            max_messages_per_poll: DEFAULT_MAX_MESSAGES_PER_POLL,
            lease_duration_seconds: DEFAULT_LEASE_DURATION_SECONDS,
            long_poll_wait_seconds: DEFAULT_LONG_POLL_WAIT_SECONDS,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    /// Replaces out-of-range values with their defaults
    #[must_use]
    pub fn clamped(mut self) -> Self {
        if !(1..=MAX_MESSAGES_PER_POLL).contains(&self.max_messages_per_poll) {
            self.max_messages_per_poll = DEFAULT_MAX_MESSAGES_PER_POLL;
        }
        if !(1..=MAX_LEASE_DURATION_SECONDS).contains(&self.lease_duration_seconds) {
            self.lease_duration_seconds = DEFAULT_LEASE_DURATION_SECONDS;
        }
        if !(1..=MAX_LONG_POLL_WAIT_SECONDS).contains(&self.long_poll_wait_seconds) {
            self.long_poll_wait_seconds = DEFAULT_LONG_POLL_WAIT_SECONDS;
        }
        if self.worker_count == 0 {
            self.worker_count = DEFAULT_WORKER_COUNT;
        }
        self
    }

    /// Capacity of the channel between the poll loop and the workers
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.worker_count.saturating_mul(2)
    }

    /// Upper bound on a single handler call: the lease minus a 5 second margin, at least 1 second
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        let seconds = (self.lease_duration_seconds - HANDLER_TIMEOUT_MARGIN_SECONDS)
            .max(MIN_HANDLER_TIMEOUT_SECONDS);
        Duration::from_secs(u64::try_from(seconds).unwrap_or(1))
    }
}
