use portal_core::config as core_config;
use portal_core::error::AppError;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub retry: RetryConfig,
    pub queue: QueueConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Backoff schedule applied to every remote storage call.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Replay passes a queued operation survives before it is dropped.
    pub max_replay_attempts: u32,
    pub file_path: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_replay_attempts: 3,
            file_path: "pending_operations.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Home department written back when a profile leaves the supervisor role.
    pub default_department_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_department_id: "general".to_string(),
        }
    }
}

impl RosterConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(RosterConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("roster_db"), is_prod)?,
            },
            retry: RetryConfig {
                max_attempts: get_env("RETRY_MAX_ATTEMPTS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
                initial_delay_ms: get_env("RETRY_INITIAL_DELAY_MS", Some("1000"), is_prod)?
                    .parse()
                    .unwrap_or(1_000),
                max_delay_ms: get_env("RETRY_MAX_DELAY_MS", Some("30000"), is_prod)?
                    .parse()
                    .unwrap_or(30_000),
                jitter_ms: get_env("RETRY_JITTER_MS", Some("1000"), is_prod)?
                    .parse()
                    .unwrap_or(1_000),
            },
            queue: QueueConfig {
                max_replay_attempts: get_env("QUEUE_MAX_REPLAY_ATTEMPTS", Some("3"), is_prod)?
                    .parse()
                    .unwrap_or(3),
                file_path: get_env(
                    "QUEUE_FILE_PATH",
                    Some("pending_operations.json"),
                    is_prod,
                )?,
            },
            engine: EngineConfig {
                default_department_id: get_env(
                    "DEFAULT_DEPARTMENT_ID",
                    Some("general"),
                    is_prod,
                )?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults_match_documented_schedule() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay(), Duration::from_secs(1));
        assert_eq!(retry.max_delay(), Duration::from_secs(30));
        assert_eq!(retry.jitter(), Duration::from_secs(1));
    }

    #[test]
    fn test_queue_defaults() {
        let queue = QueueConfig::default();
        assert_eq!(queue.max_replay_attempts, 3);
        assert_eq!(queue.file_path, "pending_operations.json");
    }
}
