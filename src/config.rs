//! Application configuration module
//! Handles environment variable loading, configuration validation, and
//! backend selection for the queue, dedup store, and statistics repository.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub processor: ProcessorConfig,
    pub queue: QueueConfig,
    pub dedup: DedupConfig,
    pub stats: StatsConfig,
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub shutdown_timeout: Duration,
}

/// External processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub default_url: String,
    pub fallback_url: String,
    pub timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Circuit breaker configuration for the default processor path
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub max_requests: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub failure_ratio: f64,
    pub min_requests: u32,
}

/// Payment queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub buffer_size: usize,
}

/// Dedup store configuration
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub backend: DedupBackend,
    pub ttl: Duration,
}

/// Statistics repository configuration
#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub backend: StatsBackend,
}

/// Redis configuration, used when any backend selects redis
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub queue_key: String,
    pub max_connections: u32,
}

/// Database configuration, used when the stats backend selects postgres
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub count: usize,
    pub processing_timeout: Duration,
    pub instance_id: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsBackend {
    Memory,
    Postgres,
}

impl FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "memory" => Ok(QueueBackend::Memory),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(ConfigError::InvalidValue(format!(
                "QUEUE_BACKEND must be 'memory' or 'redis', got '{}'",
                other
            ))),
        }
    }
}

impl FromStr for DedupBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "memory" => Ok(DedupBackend::Memory),
            "redis" => Ok(DedupBackend::Redis),
            other => Err(ConfigError::InvalidValue(format!(
                "DEDUP_BACKEND must be 'memory' or 'redis', got '{}'",
                other
            ))),
        }
    }
}

impl FromStr for StatsBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "memory" => Ok(StatsBackend::Memory),
            "postgres" => Ok(StatsBackend::Postgres),
            other => Err(ConfigError::InvalidValue(format!(
                "STATS_BACKEND must be 'memory' or 'postgres', got '{}'",
                other
            ))),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            processor: ProcessorConfig::from_env()?,
            queue: QueueConfig::from_env()?,
            dedup: DedupConfig::from_env()?,
            stats: StatsConfig::from_env()?,
            redis: RedisConfig::from_env(),
            database: DatabaseConfig::from_env(),
            worker: WorkerConfig::from_env(),
            logging: LoggingConfig::from_env(),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.processor.validate()?;
        self.queue.validate()?;
        self.worker.validate()?;

        if self.queue.backend == QueueBackend::Redis || self.dedup.backend == DedupBackend::Redis {
            self.redis.validate()?;
        }

        if self.stats.backend == StatsBackend::Postgres {
            match self.database.url.as_deref() {
                Some(url) if !url.is_empty() => {}
                _ => {
                    return Err(ConfigError::MissingVariable(
                        "DATABASE_URL (required when STATS_BACKEND=postgres)".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .trim_start_matches(':')
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            read_timeout: duration_env("SERVER_READ_TIMEOUT", Duration::from_secs(5)),
            write_timeout: duration_env("SERVER_WRITE_TIMEOUT", Duration::from_secs(10)),
            shutdown_timeout: duration_env("SERVER_SHUTDOWN_TIMEOUT", Duration::from_secs(30)),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ProcessorConfig {
            default_url: env::var("PROCESSOR_DEFAULT_URL")
                .unwrap_or_else(|_| "http://payment-processor-default:8080".to_string()),
            fallback_url: env::var("PROCESSOR_FALLBACK_URL")
                .unwrap_or_else(|_| "http://payment-processor-fallback:8080".to_string()),
            timeout: duration_env("PROCESSOR_TIMEOUT", Duration::from_secs(5)),
            circuit_breaker: CircuitBreakerConfig::from_env(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, url) in [
            ("PROCESSOR_DEFAULT_URL", &self.default_url),
            ("PROCESSOR_FALLBACK_URL", &self.fallback_url),
        ] {
            if url.is_empty() {
                return Err(ConfigError::InvalidValue(format!("{} cannot be empty", key)));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be an http(s) URL",
                    key
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue("PROCESSOR_TIMEOUT".to_string()));
        }

        self.circuit_breaker.validate()
    }
}

impl CircuitBreakerConfig {
    pub fn from_env() -> Self {
        CircuitBreakerConfig {
            max_requests: parsed_env("CB_MAX_REQUESTS", 3),
            interval: duration_env("CB_INTERVAL", Duration::from_secs(10)),
            timeout: duration_env("CB_TIMEOUT", Duration::from_secs(30)),
            failure_ratio: parsed_env("CB_FAILURE_RATIO", 0.5),
            min_requests: parsed_env("CB_MIN_REQUESTS", 5),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_ratio <= 0.0 || self.failure_ratio > 1.0 {
            return Err(ConfigError::InvalidValue(
                "CB_FAILURE_RATIO must be in (0, 1]".to_string(),
            ));
        }

        if self.max_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "CB_MAX_REQUESTS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl QueueConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(QueueConfig {
            backend: env::var("QUEUE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            buffer_size: parsed_env("QUEUE_BUFFER_SIZE", 100),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "QUEUE_BUFFER_SIZE cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DedupConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DedupConfig {
            backend: env::var("DEDUP_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            ttl: duration_env("DEDUP_TTL", Duration::from_secs(24 * 60 * 60)),
        })
    }
}

impl StatsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(StatsConfig {
            backend: env::var("STATS_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
        })
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        RedisConfig {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            queue_key: env::var("REDIS_QUEUE_KEY").unwrap_or_else(|_| "payment_queue".to_string()),
            max_connections: parsed_env("REDIS_MAX_CONNECTIONS", 10),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ConfigError::InvalidValue(
                "REDIS_URL must start with redis:// or rediss://".to_string(),
            ));
        }

        if self.queue_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "REDIS_QUEUE_KEY cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        DatabaseConfig {
            url: env::var("DATABASE_URL").ok(),
            max_connections: parsed_env("DB_MAX_CONNECTIONS", 10),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        WorkerConfig {
            count: parsed_env("WORKER_COUNT", 4),
            processing_timeout: duration_env("WORKER_PROCESSING_TIMEOUT", Duration::from_secs(10)),
            instance_id: env::var("INSTANCE_ID").unwrap_or_else(|_| "payrelay-1".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_COUNT cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        }
    }
}

fn parsed_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn duration_env(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| parse_duration(&v))
        .unwrap_or(default)
}

/// Parse a duration value such as "500ms", "5s", "2m", "1h", or a bare
/// integer meaning seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(index) => value.split_at(index),
        None => (value, "s"),
    };

    let quantity: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(quantity)),
        "s" => Some(Duration::from_secs(quantity)),
        "m" => Some(Duration::from_secs(quantity * 60)),
        "h" => Some(Duration::from_secs(quantity * 60 * 60)),
        _ => None,
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
