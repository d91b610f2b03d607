#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_WRITE_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_LATENCY_WARNING_THRESHOLD: Duration = Duration::from_millis(1000);
const DEFAULT_HEALTH_CHECK_TIMEOUT_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_MAX_QUEUED_MESSAGES: usize = 1000;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_MAX_JITTER_DURATION: Duration = Duration::from_millis(1000);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Configuration for WebSocket client behavior.
///
/// Every field has a default; override only what you need:
///
/// ```
/// use std::time::Duration;
/// use marketplace_realtime::ws::config::Config;
///
/// let config = Config::builder()
///     .heartbeat_interval(Duration::from_secs(15))
///     .build();
/// assert_eq!(config.heartbeat_timeout(), Duration::from_secs(30));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Interval for sending keep-alive messages while connected
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Maximum silence from the server before the connection is considered dead.
    /// Defaults to twice the heartbeat interval.
    pub heartbeat_timeout: Option<Duration>,
    /// Upper bound on a single connection attempt, handshake included
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
    /// Upper bound on writing one frame; a stalled write is treated as a dropped socket
    #[builder(default = DEFAULT_WRITE_TIMEOUT_DURATION)]
    pub write_timeout: Duration,
    /// Message latency above which a warning is logged and the connection is reported unhealthy
    #[builder(default = DEFAULT_LATENCY_WARNING_THRESHOLD)]
    pub latency_warning_threshold: Duration,
    /// How long a health check waits for any frame from the server
    #[builder(default = DEFAULT_HEALTH_CHECK_TIMEOUT_DURATION)]
    pub health_check_timeout: Duration,
    /// Capacity of the outbound queue; the oldest message is evicted when full
    #[builder(default = DEFAULT_MAX_QUEUED_MESSAGES)]
    pub max_queued_messages: usize,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl Config {
    /// Effective liveness timeout.
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
            .unwrap_or_else(|| self.heartbeat_interval.saturating_mul(2))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts before giving up
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Backoff duration for the first reconnection attempt
    #[builder(default = DEFAULT_INITIAL_BACKOFF_DURATION)]
    pub initial_backoff: Duration,
    /// Maximum backoff duration, jitter included
    #[builder(default = DEFAULT_MAX_BACKOFF_DURATION)]
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    #[builder(default = DEFAULT_BACKOFF_MULTIPLIER)]
    pub backoff_multiplier: f64,
    /// Upper bound of the random delay added to every backoff
    #[builder(default = DEFAULT_MAX_JITTER_DURATION)]
    pub max_jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
