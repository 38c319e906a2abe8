//! Queue, barrier and pipeline configuration, plus the root document.

use serde::{Deserialize, Serialize};

use super::pool::WorkerPoolConfig;
use crate::core::{ConfigError, ErrorPolicy};

/// Bounded queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of buffered items.
    pub capacity: usize,
}

impl QueueConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".into());
        }
        Ok(())
    }
}

/// Phase barrier configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// Threads that must arrive to complete a phase.
    pub participants: usize,
}

impl BarrierConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.participants == 0 {
            return Err("participants must be greater than 0".into());
        }
        Ok(())
    }
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name; also the key used to look up its transform.
    pub name: String,
    /// Capacity of the stage's input queue.
    pub capacity: usize,
}

/// Stage pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stages in processing order.
    pub stages: Vec<StageConfig>,
    /// What to do with items whose transform fails.
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl PipelineConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid stage.
    pub fn validate(&self) -> Result<(), String> {
        if self.stages.is_empty() {
            return Err("at least one stage must be defined".into());
        }
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.is_empty() {
                return Err(format!("stage #{index} has an empty name"));
            }
            if stage.capacity == 0 {
                return Err(format!("stage `{}` capacity must be greater than 0", stage.name));
            }
            if self.stages[..index].iter().any(|s| s.name == stage.name) {
                return Err(format!("duplicate stage name `{}`", stage.name));
            }
        }
        Ok(())
    }
}

/// Root configuration document. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitivesConfig {
    /// Worker pool section.
    pub worker_pool: Option<WorkerPoolConfig>,
    /// Queue section.
    pub queue: Option<QueueConfig>,
    /// Barrier section.
    pub barrier: Option<BarrierConfig>,
    /// Pipeline section.
    pub pipeline: Option<PipelineConfig>,
}

impl PrimitivesConfig {
    /// Validate every present section.
    ///
    /// # Errors
    ///
    /// Returns the first failure, prefixed with its section name.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(pool) = &self.worker_pool {
            pool.validate().map_err(|e| format!("worker_pool invalid: {e}"))?;
        }
        if let Some(queue) = &self.queue {
            queue.validate().map_err(|e| format!("queue invalid: {e}"))?;
        }
        if let Some(barrier) = &self.barrier {
            barrier.validate().map_err(|e| format!("barrier invalid: {e}"))?;
        }
        if let Some(pipeline) = &self.pipeline {
            pipeline.validate().map_err(|e| format!("pipeline invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` for malformed JSON, `ConfigError::Invalid` when
    /// validation fails.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_validation() {
        let mut cfg = PipelineConfig {
            stages: vec![
                StageConfig {
                    name: "double".into(),
                    capacity: 4,
                },
                StageConfig {
                    name: "add_ten".into(),
                    capacity: 4,
                },
            ],
            error_policy: ErrorPolicy::Drop,
        };
        assert!(cfg.validate().is_ok());

        cfg.stages[1].name = "double".into();
        assert!(cfg.validate().unwrap_err().contains("duplicate"));

        cfg.stages[1].name = "add_ten".into();
        cfg.stages[1].capacity = 0;
        assert!(cfg.validate().unwrap_err().contains("add_ten"));

        cfg.stages.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_document_is_valid() {
        let cfg = PrimitivesConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, PrimitivesConfig::default());
    }

    #[test]
    fn test_section_errors_are_prefixed() {
        let err = PrimitivesConfig::from_json_str(r#"{"queue": {"capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.starts_with("queue invalid")));
    }

    #[test]
    fn test_error_policy_snake_case() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"stages": [{"name": "a", "capacity": 1}], "error_policy": "forward"}"#,
        )
        .unwrap();
        assert_eq!(cfg.error_policy, ErrorPolicy::Forward);
    }
}
