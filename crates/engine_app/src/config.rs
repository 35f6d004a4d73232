//! Manager and pipeline configuration.
//!
//! [`ManagerConfig`] can be built in code, read from the environment
//! (`ENGINE_WORKER_THREADS`, `ENGINE_EXECUTION`, `ENGINE_DISPATCH`) or
//! parsed from JSON.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const WORKER_THREADS_ENV: &str = "ENGINE_WORKER_THREADS";
pub const EXECUTION_ENV: &str = "ENGINE_EXECUTION";
pub const DISPATCH_ENV: &str = "ENGINE_DISPATCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One system at a time, in registration order.
    Sequential,
    /// Systems of a stage run concurrently on the worker pool.
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// A dedicated thread ticks every running pipeline when due.
    #[default]
    Threaded,
    /// Pipelines tick only through `SystemsManager::tick_pipeline`.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub execution: ExecutionMode,
    /// Worker pool size for parallel execution; defaults to the number of
    /// logical cores.
    pub worker_threads: Option<usize>,
    pub dispatch: Dispatch,
}

impl ManagerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic configuration: sequential execution.
    #[must_use]
    pub fn sequential() -> Self {
        Self { execution: ExecutionMode::Sequential, ..Self::default() }
    }

    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads overrides through `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(WORKER_THREADS_ENV) {
            let threads = value
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: WORKER_THREADS_ENV,
                    value: value.clone(),
                    expected: "a positive integer",
                })?;
            config.worker_threads = Some(threads.get());
        }

        if let Some(value) = lookup(EXECUTION_ENV) {
            config.execution = match value.trim().to_ascii_lowercase().as_str() {
                "sequential" => ExecutionMode::Sequential,
                "parallel" => ExecutionMode::Parallel,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: EXECUTION_ENV,
                        value,
                        expected: "`sequential` or `parallel`",
                    });
                }
            };
        }

        if let Some(value) = lookup(DISPATCH_ENV) {
            config.dispatch = match value.trim().to_ascii_lowercase().as_str() {
                "threaded" => Dispatch::Threaded,
                "manual" => Dispatch::Manual,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: DISPATCH_ENV,
                        value,
                        expected: "`threaded` or `manual`",
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of workers the pool is built with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        match self.execution {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel => self
                .worker_threads
                .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get))
                .max(1),
        }
    }
}

/// A named pipeline and its minimum tick period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub name: String,
    /// `None` re-ticks as soon as the previous tick completes.
    pub period: Option<Duration>,
}

impl PipelineConfig {
    #[must_use]
    pub fn interval(name: impl Into<String>, period: Duration) -> Self {
        Self { name: name.into(), period: Some(period) }
    }

    #[must_use]
    pub fn uninterval(name: impl Into<String>) -> Self {
        Self { name: name.into(), period: None }
    }

    /// An interval pipeline targeting `tick_rate` ticks per second.
    #[must_use]
    pub fn with_tick_rate(name: impl Into<String>, tick_rate: f64) -> Self {
        Self::interval(name, Duration::from_secs_f64(1.0 / tick_rate))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.execution, ExecutionMode::Parallel);
        assert_eq!(config.dispatch, Dispatch::Threaded);
        assert!(config.worker_count() >= 1);
        assert_eq!(ManagerConfig::sequential().worker_count(), 1);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ManagerConfig::from_lookup(lookup(&[
            (WORKER_THREADS_ENV, "3"),
            (EXECUTION_ENV, "Parallel"),
            (DISPATCH_ENV, "manual"),
        ]))
        .unwrap();
        assert_eq!(config.worker_threads, Some(3));
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.dispatch, Dispatch::Manual);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ManagerConfig::from_lookup(lookup(&[(WORKER_THREADS_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: WORKER_THREADS_ENV, .. }));

        let err = ManagerConfig::from_lookup(lookup(&[(EXECUTION_ENV, "sideways")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: EXECUTION_ENV, .. }));
    }

    #[test]
    fn test_from_json() {
        let config = ManagerConfig::from_json_str(r#"{ "execution": "sequential", "dispatch": "manual" }"#).unwrap();
        assert_eq!(config, ManagerConfig::sequential().with_dispatch(Dispatch::Manual));
        assert!(ManagerConfig::from_json_str("{ nope").is_err());
    }

    #[test]
    fn test_pipeline_tick_rate() {
        let pipeline = PipelineConfig::with_tick_rate("sim", 50.0);
        assert_eq!(pipeline.period, Some(Duration::from_millis(20)));
        assert_eq!(PipelineConfig::uninterval("ui").period, None);
    }
}
