//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard ceiling (in bytes) of the shared circuit breaker. Every pipeline
    /// of the process accounts against it.
    pub breaker_limit_bytes: usize,

    /// Name of the breaker, reported in out-of-memory errors.
    pub breaker_name: String,

    /// Optional per-job ceiling, checked before the breaker.
    pub job_quota_bytes: Option<usize>,

    /// Pipelines the runner executes concurrently.
    pub max_parallel_tasks: usize,

    /// Rows per batch handed out by in-memory sources.
    pub source_batch_size: usize,

    /// Batches buffered between a remote producer and its channel source.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breaker_limit_bytes: 512 * 1024 * 1024, // 512 MiB default
            breaker_name: "query".to_string(),
            job_quota_bytes: None,
            max_parallel_tasks: 4,
            source_batch_size: 1024,
            channel_capacity: 8,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWPIPE_BREAKER_LIMIT_BYTES`: breaker limit in bytes
    /// - `ROWPIPE_BREAKER_NAME`: breaker name
    /// - `ROWPIPE_JOB_QUOTA_BYTES`: per-job quota in bytes
    /// - `ROWPIPE_MAX_PARALLEL_TASKS`: concurrently running pipelines
    /// - `ROWPIPE_SOURCE_BATCH_SIZE`: rows per in-memory batch
    /// - `ROWPIPE_CHANNEL_CAPACITY`: buffered batches per channel source
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("ROWPIPE_BREAKER_LIMIT_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.breaker_limit_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_BREAKER_NAME") {
            cfg.breaker_name = s;
        }

        if let Ok(s) = std::env::var("ROWPIPE_JOB_QUOTA_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.job_quota_bytes = Some(v);
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_SOURCE_BATCH_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.source_batch_size = v;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_CHANNEL_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.channel_capacity = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.breaker_limit_bytes == 0 {
            return Err(Error::Config("breaker_limit_bytes must be > 0".into()));
        }
        if self.job_quota_bytes == Some(0) {
            return Err(Error::Config("job_quota_bytes must be > 0 when set".into()));
        }
        if self.max_parallel_tasks == 0 {
            return Err(Error::Config("max_parallel_tasks must be > 0".into()));
        }
        if self.source_batch_size == 0 {
            return Err(Error::Config("source_batch_size must be > 0".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_quota_is_rejected() {
        let cfg = EngineConfig {
            job_quota_bytes: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn roundtrips_through_json() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
