use std::borrow::Cow;
use thiserror::Error;

/// Environment variable overriding the worker count of the default executor.
pub const THREADS_ENV: &str = "JOBGRAPH_THREADS";
/// Environment variable seeding the process-wide job graph switch, see
/// [`is_job_graph_active`](crate::executor::is_job_graph_active).
pub const ACTIVE_ENV: &str = "JOBGRAPH_ACTIVE";

/// Error produced while reading executor configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The worker count override is not a non-negative integer.
    #[error("invalid value {value:?} for {var}: expected a non-negative integer")]
    InvalidThreadCount {
        /// Name of the offending variable.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },
    /// A switch override is not one of `1`, `0`, `true`, `false`, `on`,
    /// `off`.
    #[error("invalid value {value:?} for {var}: expected a boolean")]
    InvalidFlag { var: &'static str, value: String },
}

/// Settings used to build a [`RayonExecutor`](crate::executor::RayonExecutor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Number of worker threads. `0` means one per available core.
    pub num_threads: usize,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: Cow<'static, str>,
    /// Initial state of the process-wide job graph switch.
    pub job_graph_active: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            thread_name_prefix: Cow::Borrowed("jobgraph-worker"),
            job_graph_active: true,
        }
    }
}

impl ExecutorConfig {
    /// Default configuration with [`THREADS_ENV`] and [`ACTIVE_ENV`]
    /// applied on top.
    ///
    /// An unset or blank variable keeps the default.
    ///
    /// # Errors
    /// If a variable is set to a value it cannot hold.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let num_threads = parse_thread_count(std::env::var(THREADS_ENV).ok().as_deref())?;
        let active = parse_flag(ACTIVE_ENV, std::env::var(ACTIVE_ENV).ok().as_deref())?;
        Ok(Self {
            num_threads: num_threads.unwrap_or(defaults.num_threads),
            job_graph_active: active.unwrap_or(defaults.job_graph_active),
            ..defaults
        })
    }

    /// Replace the worker count.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Replace the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Replace the initial state of the job graph switch.
    #[must_use]
    pub fn with_job_graph_active(mut self, active: bool) -> Self {
        self.job_graph_active = active;
        self
    }
}

fn parse_thread_count(raw: Option<&str>) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidThreadCount {
            var: THREADS_ENV,
            value: raw.to_owned(),
        })
}

fn parse_flag(var: &'static str, raw: Option<&str>) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(Some(true)),
        "0" | "false" | "off" | "no" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_override_keeps_default() {
        assert_eq!(parse_thread_count(None), Ok(None));
        assert_eq!(parse_thread_count(Some("   ")), Ok(None));
    }

    #[test]
    fn numeric_override_is_trimmed_and_parsed() {
        assert_eq!(parse_thread_count(Some(" 6 ")), Ok(Some(6)));
        assert_eq!(parse_thread_count(Some("0")), Ok(Some(0)));
    }

    #[test]
    fn garbage_override_is_rejected() {
        let err = parse_thread_count(Some("-3")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidThreadCount {
                var: THREADS_ENV,
                value: "-3".to_owned(),
            }
        );
        assert!(err.to_string().contains(THREADS_ENV));
    }

    #[test]
    fn switch_override_accepts_common_spellings() {
        assert_eq!(parse_flag(ACTIVE_ENV, None), Ok(None));
        assert_eq!(parse_flag(ACTIVE_ENV, Some("")), Ok(None));
        assert_eq!(parse_flag(ACTIVE_ENV, Some(" OFF ")), Ok(Some(false)));
        assert_eq!(parse_flag(ACTIVE_ENV, Some("0")), Ok(Some(false)));
        assert_eq!(parse_flag(ACTIVE_ENV, Some("True")), Ok(Some(true)));
        assert_eq!(
            parse_flag(ACTIVE_ENV, Some("maybe")),
            Err(ConfigError::InvalidFlag {
                var: ACTIVE_ENV,
                value: "maybe".to_owned(),
            })
        );
    }

    #[test]
    fn builders_override_fields() {
        let config = ExecutorConfig::default()
            .with_num_threads(3)
            .with_thread_name_prefix("render")
            .with_job_graph_active(false);
        assert_eq!(config.num_threads, 3);
        assert_eq!(config.thread_name_prefix, "render");
        assert!(!config.job_graph_active);
        assert!(ExecutorConfig::default().job_graph_active);
    }
}
