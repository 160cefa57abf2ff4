//! Config - 設定値
//!
//! 既定値はすべて `Default` に集約し、`with_*` で上書きします。
//! executor の URL だけは環境変数からも読めます（`TriggerConfig::from_env`）。

use std::time::Duration;

use crate::error::OrchestratorError;

/// Local executor used when no base URL is configured in development.
pub const DEV_EXECUTOR_BASE_URL: &str = "http://127.0.0.1:54321/functions/v1";

pub const ENV_EXECUTOR_URL: &str = "ATELIER_EXECUTOR_URL";
pub const ENV_ENVIRONMENT: &str = "ATELIER_ENV";
pub const ENV_TRIGGER_TIMEOUT_MS: &str = "ATELIER_TRIGGER_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// `development`/`dev`/`local` are development, anything else production.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Where the executor lives.
#[derive(Debug, Clone, Default)]
pub struct ExecutorEndpoint {
    pub base_url: Option<String>,
    pub environment: Environment,
}

impl ExecutorEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            environment: Environment::Production,
        }
    }

    pub fn development() -> Self {
        Self {
            base_url: None,
            environment: Environment::Development,
        }
    }

    /// Base URL without a trailing slash.
    ///
    /// Falls back to the local executor in development; anywhere else an
    /// unset URL is a configuration error.
    pub fn resolve(&self) -> Result<String, OrchestratorError> {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.trim_end_matches('/').to_string()),
            _ if self.environment == Environment::Development => {
                Ok(DEV_EXECUTOR_BASE_URL.to_string())
            }
            _ => Err(OrchestratorError::Config(format!(
                "executor base URL is not set ({ENV_EXECUTOR_URL})"
            ))),
        }
    }
}

/// Execution trigger settings.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub endpoint: ExecutorEndpoint,
    /// Budget for the single trigger call. Hitting it is not an error.
    pub timeout: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            endpoint: ExecutorEndpoint::default(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl TriggerConfig {
    pub fn new(endpoint: ExecutorEndpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `ATELIER_EXECUTOR_URL`, `ATELIER_ENV` and `ATELIER_TRIGGER_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.endpoint.base_url = lookup(ENV_EXECUTOR_URL);
        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            config.endpoint.environment = Environment::parse(&env);
        }
        if let Some(ms) = lookup(ENV_TRIGGER_TIMEOUT_MS).and_then(|v| v.parse::<u64>().ok()) {
            config.timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Poller and guard settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Upper bound for the exponential backoff interval.
    pub max_interval: Duration,
    /// Consecutive failures before a job's circuit breaker opens.
    pub failure_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_interval: Duration::from_secs(10),
            failure_threshold: 5,
        }
    }
}

/// How `Orchestrator::wait_for_completion` should wait.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    /// Initial intervals up to this use the fixed-interval strategy.
    pub fixed_threshold: Duration,
    /// Interval of the fixed-interval strategy.
    pub fixed_interval: Duration,
    /// Upper bound for the fixed-interval strategy's duration.
    pub fixed_max_duration: Duration,
    /// Pause before restarting a timed-out backoff poll.
    pub restart_delay: Duration,
    /// Overall budget across backoff restarts. `None` keeps restarting
    /// until a terminal status or a non-timeout error.
    pub deadline: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_interval: Duration::from_secs(2),
            fixed_threshold: Duration::from_secs(2),
            fixed_interval: Duration::from_millis(1500),
            fixed_max_duration: Duration::from_secs(120),
            restart_delay: Duration::from_secs(2),
            deadline: Some(Duration::from_secs(600)),
        }
    }
}

impl WaitOptions {
    pub fn new(max_attempts: u32, initial_interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn uses_fixed_interval(&self) -> bool {
        self.initial_interval <= self.fixed_threshold
    }

    /// `min(max_attempts × initial_interval, fixed_max_duration)`.
    pub fn fixed_duration(&self) -> Duration {
        self.initial_interval
            .saturating_mul(self.max_attempts)
            .min(self.fixed_max_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case::explicit(
        Some("https://api.example/functions/v1/"),
        Environment::Production,
        Some("https://api.example/functions/v1")
    )]
    #[case::dev_fallback(None, Environment::Development, Some(DEV_EXECUTOR_BASE_URL))]
    #[case::blank_dev_fallback(Some("  "), Environment::Development, Some(DEV_EXECUTOR_BASE_URL))]
    #[case::unset_in_production(None, Environment::Production, None)]
    fn endpoint_resolution(
        #[case] base_url: Option<&str>,
        #[case] environment: Environment,
        #[case] expected: Option<&str>,
    ) {
        let endpoint = ExecutorEndpoint {
            base_url: base_url.map(str::to_string),
            environment,
        };
        match expected {
            Some(url) => assert_eq!(endpoint.resolve().unwrap(), url),
            None => assert!(matches!(endpoint.resolve(), Err(OrchestratorError::Config(_)))),
        }
    }

    #[test]
    fn trigger_config_reads_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_EXECUTOR_URL, "https://api.example/fn"),
            (ENV_ENVIRONMENT, "dev"),
            (ENV_TRIGGER_TIMEOUT_MS, "2500"),
        ]
        .into_iter()
        .collect();

        let config = TriggerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.endpoint.base_url.as_deref(), Some("https://api.example/fn"));
        assert_eq!(config.endpoint.environment, Environment::Development);
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn trigger_config_defaults_to_five_seconds() {
        let config = TriggerConfig::from_lookup(|_| None);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.endpoint.environment, Environment::Production);
    }

    #[rstest]
    #[case::short(10, 1_000, true, 10_000)]
    #[case::at_threshold(100, 2_000, true, 120_000)]
    #[case::long(10, 3_000, false, 30_000)]
    fn wait_strategy_selection(
        #[case] attempts: u32,
        #[case] initial_ms: u64,
        #[case] fixed: bool,
        #[case] fixed_duration_ms: u64,
    ) {
        let opts = WaitOptions::new(attempts, Duration::from_millis(initial_ms));
        assert_eq!(opts.uses_fixed_interval(), fixed);
        assert_eq!(opts.fixed_duration(), Duration::from_millis(fixed_duration_ms));
    }
}
