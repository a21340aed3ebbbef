use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::MqAppConfig;

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Python interpreter used to execute candidate code. Default: "python3".
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
}

/// Resource ceilings for one candidate invocation.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Wall-clock ceiling on the candidate invocation, in seconds. Default: 2.0.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: f64,
    /// Extra allowance on the hard deadline for interpreter startup. Default: 1.0.
    #[serde(default = "default_startup_grace_secs")]
    pub startup_grace_secs: f64,
    /// Address-space ceiling for the candidate process, in MiB. Default: 50.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    /// Absolute tolerance for numeric output comparison. Default: 1e-6.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

/// Bounded-retry settings for the evaluation task.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Maximum retries per job before giving up. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Fixed delay between attempts, in seconds. Default: 5.
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_python_bin() -> String {
    "python3".into()
}
fn default_time_limit_secs() -> f64 {
    2.0
}
fn default_startup_grace_secs() -> f64 {
    1.0
}
fn default_memory_limit_mb() -> u64 {
    50
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_max_retries() -> u8 {
    3
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_database_url() -> String {
    "postgres://localhost:5432/arbiter".into()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            python_bin: default_python_bin(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
            startup_grace_secs: default_startup_grace_secs(),
            memory_limit_mb: default_memory_limit_mb(),
            tolerance: default_tolerance(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("ARBITER_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "worker-1")?
            .set_default("worker.python_bin", "python3")?
            .set_default("limits.time_limit_secs", 2.0)?
            .set_default("limits.memory_limit_mb", 50_i64)?
            .set_default("mq.enabled", true)?
            .set_default("mq.url", "redis://localhost:6379")?
            .set_default("mq.pool_size", 5_i64)?
            .set_default("mq.queue_name", "evaluate_jobs")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("ARBITER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
