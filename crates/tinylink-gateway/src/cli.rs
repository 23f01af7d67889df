use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;
use tinylink_cache::{CircuitBreakerSettings, GuardedCacheSettings};
use tinylink_shortener::ShortCodePolicy;

pub const LISTEN_ADDR_ENV: &str = "TINYLINK_LISTEN_ADDR";
pub const PUBLIC_BASE_URL_ENV: &str = "TINYLINK_PUBLIC_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "TINYLINK_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "TINYLINK_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "TINYLINK_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "TINYLINK_REDIS_URL";
pub const LOG_LEVEL_ENV: &str = "TINYLINK_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "TINYLINK_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "none")]
    Disabled,
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::Disabled => write!(f, "none"),
            CacheBackendArg::InMemory => write!(f, "in-memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "json")]
    Json,
    #[value(name = "pretty")]
    Pretty,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tinylink-gateway", version)]
pub struct Cli {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Base URL short links are built on, e.g. `https://tiny.link`.
    #[arg(long, env = PUBLIC_BASE_URL_ENV)]
    pub public_base_url: Option<String>,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::InMemory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = "TINYLINK_CACHE_CAPACITY", default_value_t = 10_000)]
    pub cache_capacity: u64,

    #[arg(long, env = "TINYLINK_CACHE_TIMEOUT_MS", default_value_t = 250)]
    pub cache_timeout_ms: u64,

    #[arg(long, env = "TINYLINK_CACHE_TTL_BUFFER_MS", default_value_t = 1_000)]
    pub cache_ttl_buffer_ms: u64,

    #[arg(long, env = "TINYLINK_CACHE_QUEUE_CAPACITY", default_value_t = tinylink_cache::DEFAULT_QUEUE_CAPACITY)]
    pub cache_queue_capacity: usize,

    #[arg(long, env = "TINYLINK_STORE_TIMEOUT_MS", default_value_t = 3_000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "TINYLINK_BREAKER_FAILURE_THRESHOLD", default_value_t = 5)]
    pub breaker_failure_threshold: u32,

    #[arg(long, env = "TINYLINK_BREAKER_RESET_TIMEOUT_MS", default_value_t = 30_000)]
    pub breaker_reset_timeout_ms: u64,

    #[arg(long, env = "TINYLINK_BREAKER_SUCCESS_THRESHOLD", default_value_t = 2)]
    pub breaker_success_threshold: u32,

    #[arg(long, env = "TINYLINK_SHORT_CODE_LENGTH", default_value_t = 6)]
    pub short_code_length: usize,

    #[arg(long, env = "TINYLINK_MAX_ALIAS_LENGTH", default_value_t = 30)]
    pub max_alias_length: usize,

    #[arg(long, env = "TINYLINK_MAX_URL_LENGTH", default_value_t = 1_000)]
    pub max_url_length: usize,

    #[arg(long, env = "TINYLINK_MAX_ATTEMPTS", default_value_t = 10)]
    pub max_attempts: u32,

    #[arg(long, env = "TINYLINK_SHORT_CODE_TTL_MS", default_value_t = 30_000)]
    pub short_code_ttl_ms: u64,

    #[arg(long, env = LOG_LEVEL_ENV, default_value = "info")]
    pub log_level: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Json)]
    pub log_format: LogFormatArg,
}

impl Cli {
    pub fn policy(&self) -> ShortCodePolicy {
        ShortCodePolicy::builder()
            .code_length(self.short_code_length)
            .max_alias_length(self.max_alias_length)
            .max_url_length(self.max_url_length)
            .max_attempts(self.max_attempts)
            .ttl(Duration::from_millis(self.short_code_ttl_ms))
            .build()
    }

    pub fn breaker_settings(&self) -> CircuitBreakerSettings {
        CircuitBreakerSettings::builder()
            .failure_threshold(self.breaker_failure_threshold)
            .reset_timeout(Duration::from_millis(self.breaker_reset_timeout_ms))
            .success_threshold(self.breaker_success_threshold)
            .build()
    }

    pub fn cache_settings(&self) -> GuardedCacheSettings {
        GuardedCacheSettings::builder()
            .timeout(Duration::from_millis(self.cache_timeout_ms))
            .ttl_buffer(Duration::from_millis(self.cache_ttl_buffer_ms))
            .build()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
