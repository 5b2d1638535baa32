//! Configuration from environment variables and AWS Secrets Manager

use std::env;
use std::str::FromStr;
use std::time::Duration;

use aws_sdk_secretsmanager::Client as SecretsClient;
use tracing::info;

use crate::error::WorkerError;

/// Read a parseable env var, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-phase limits for one engine session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineTimeouts {
    pub ready: Duration,
    pub search: Duration,
    pub exit: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(10),
            search: Duration::from_secs(30),
            exit: Duration::from_secs(5),
        }
    }
}

/// Engine binary and search parameters. Read once at startup.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Fixed search depth per position
    pub depth: u32,

    pub threads: u32,

    /// Transposition table size in MB
    pub hash_mb: u32,

    /// Concurrent engine sessions per game (1 = strictly sequential)
    pub engine_workers: usize,

    pub timeouts: EngineTimeouts,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            depth: 12,
            threads: 1,
            hash_mb: 64,
            engine_workers: 1,
            timeouts: EngineTimeouts::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stockfish_path: env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            depth: env_or("SEARCH_DEPTH", defaults.depth),
            threads: env_or("ENGINE_THREADS", defaults.threads),
            hash_mb: env_or("ENGINE_HASH_MB", defaults.hash_mb),
            engine_workers: env_or("ENGINE_WORKERS", defaults.engine_workers).max(1),
            timeouts: EngineTimeouts {
                ready: Duration::from_secs(env_or("ENGINE_READY_TIMEOUT_SECS", 10)),
                search: Duration::from_secs(env_or("ENGINE_SEARCH_TIMEOUT_SECS", 30)),
                exit: Duration::from_secs(env_or("ENGINE_EXIT_TIMEOUT_SECS", 5)),
            },
        }
    }
}

/// Text-generation service credentials and request parameters.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            max_output_tokens: 8000,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            temperature: env_or("GEMINI_TEMPERATURE", defaults.temperature),
            max_output_tokens: env_or("GEMINI_MAX_OUTPUT_TOKENS", defaults.max_output_tokens),
            timeout: Duration::from_secs(env_or("GEMINI_TIMEOUT_SECS", 60)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Database connection URL (fetched from Secrets Manager in prod)
    pub database_url: String,

    /// SQS queue URL for analysis jobs
    pub sqs_queue_url: String,

    /// Custom SQS endpoint URL (for LocalStack)
    pub sqs_endpoint_url: Option<String>,

    pub engine: EngineSettings,

    /// Consecutive empty SQS receives before exiting
    pub max_empty_receives: u32,

    /// SQS visibility timeout in seconds
    pub visibility_timeout_secs: u32,

    /// Jobs processed at once (1 = single worker)
    pub worker_concurrency: usize,

    /// `in_progress` jobs untouched for longer than this are considered abandoned
    pub stale_job_after: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    /// In production, fetches DATABASE_URL from AWS Secrets Manager.
    pub async fn load() -> Result<Self, WorkerError> {
        let sqs_queue_url =
            env::var("SQS_QUEUE_URL").map_err(|_| WorkerError::Config("SQS_QUEUE_URL not set"))?;

        // Custom endpoint for LocalStack
        let sqs_endpoint_url = env::var("SQS_ENDPOINT_URL").ok();

        let max_empty_receives = env_or("MAX_EMPTY_RECEIVES", 5);
        let visibility_timeout_secs = env_or("VISIBILITY_TIMEOUT_SECS", 900);
        let worker_concurrency = env_or("WORKER_CONCURRENCY", 1usize).max(1);
        let stale_job_after = Duration::from_secs(env_or("STALE_JOB_SECS", 3600));

        // Determine database URL
        let database_url = if env::var("LOCAL_DEV").is_ok() {
            // Local development: use DATABASE_URL directly
            info!("Local dev mode: using DATABASE_URL from environment");
            env::var("DATABASE_URL")
                .map_err(|_| WorkerError::Config("DATABASE_URL not set (LOCAL_DEV mode)"))?
        } else {
            // Production: fetch from Secrets Manager
            let secret_arn = env::var("DB_SECRET_ARN")
                .map_err(|_| WorkerError::Config("DB_SECRET_ARN not set"))?;

            info!(secret_arn = %secret_arn, "Fetching database URL from Secrets Manager");
            fetch_database_url_from_secrets(&secret_arn).await?
        };

        Ok(Self {
            database_url,
            sqs_queue_url,
            sqs_endpoint_url,
            engine: EngineSettings::from_env(),
            max_empty_receives,
            visibility_timeout_secs,
            worker_concurrency,
            stale_job_after,
        })
    }
}

/// Fetch database URL from AWS Secrets Manager
async fn fetch_database_url_from_secrets(secret_arn: &str) -> Result<String, WorkerError> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&config);

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| WorkerError::SecretsManager(e.to_string()))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| WorkerError::SecretsManager("Secret has no string value".into()))?;

    database_url_from_secret(secret_string)
}

/// A secret is either a plain connection string or an RDS-style JSON object.
fn database_url_from_secret(secret_string: &str) -> Result<String, WorkerError> {
    if secret_string.starts_with("postgresql://") || secret_string.starts_with("postgres://") {
        return Ok(secret_string.to_string());
    }

    let secret: serde_json::Value = serde_json::from_str(secret_string)
        .map_err(|e| WorkerError::SecretsManager(format!("Failed to parse secret JSON: {e}")))?;

    if let Some(url) = secret.get("url").or(secret.get("DATABASE_URL")) {
        return url
            .as_str()
            .map(String::from)
            .ok_or_else(|| WorkerError::SecretsManager("Database URL is not a string".into()));
    }

    let field = |name: &'static str| {
        secret
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| WorkerError::SecretsManager(format!("Missing '{name}' in secret")))
    };

    let host = field("host")?;
    let username = field("username")?;
    let password = field("password")?;
    let database = field("dbname").or_else(|_| field("database"))?;
    let port = secret.get("port").and_then(|v| v.as_u64()).unwrap_or(5432);

    Ok(format!(
        "postgresql://{username}:{password}@{host}:{port}/{database}"
    ))
}
