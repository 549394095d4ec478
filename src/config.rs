//! Application-level configuration loading: join-code range, reveal timeouts and seeded quizzes.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::QuizEntity;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_QUIZ_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Join-code allocation settings.
    pub join_code: JoinCodeConfig,
    /// Long-poll settings for reveal waiters.
    pub reveal: RevealConfig,
    /// Capacity of each per-session SSE broadcast channel.
    pub events_capacity: usize,
    /// Quizzes seeded into the in-memory quiz repository.
    pub quizzes: Vec<QuizEntity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Numeric range and probing budget used by the join-code allocator.
pub struct JoinCodeConfig {
    /// Smallest code (inclusive).
    pub min: u32,
    /// Largest code (inclusive).
    pub max: u32,
    /// Random probes attempted before sweeping the range linearly.
    pub random_attempts: u32,
}

impl JoinCodeConfig {
    /// Number of distinct codes in the range.
    pub fn capacity(&self) -> u32 {
        self.max - self.min + 1
    }

    /// Render a numeric code as a zero-padded string as wide as `max`.
    pub fn format(&self, code: u32) -> String {
        let width = self.max.to_string().len();
        format!("{code:0width$}")
    }
}

impl Default for JoinCodeConfig {
    fn default() -> Self {
        Self {
            min: 1000,
            max: 9999,
            random_attempts: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Timeouts applied to AwaitReveal long-polls.
pub struct RevealConfig {
    /// Timeout used when the caller does not provide one.
    pub default_timeout: Duration,
    /// Upper bound applied to caller-provided timeouts.
    pub max_timeout: Duration,
}

impl RevealConfig {
    /// Resolve the effective wait for a caller-provided timeout in milliseconds.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
            .min(self.max_timeout)
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(25),
            max_timeout: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => match AppConfig::try_from(raw) {
                    Ok(app_config) => {
                        info!(
                            path = %path.display(),
                            quizzes = app_config.quizzes.len(),
                            "loaded configuration"
                        );
                        app_config
                    }
                    Err(message) => {
                        warn!(
                            path = %path.display(),
                            error = %message,
                            "invalid config values; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            join_code: JoinCodeConfig::default(),
            reveal: RevealConfig::default(),
            events_capacity: 64,
            quizzes: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    join_code: Option<RawJoinCode>,
    #[serde(default)]
    reveal: Option<RawReveal>,
    #[serde(default)]
    events: Option<RawEvents>,
    #[serde(default)]
    quizzes: Vec<QuizEntity>,
}

#[derive(Debug, Deserialize)]
struct RawJoinCode {
    min: Option<u32>,
    max: Option<u32>,
    random_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawReveal {
    default_timeout_ms: Option<u64>,
    max_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawEvents {
    capacity: Option<usize>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = String;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let defaults = AppConfig::default();

        let join_code = match value.join_code {
            Some(raw) => JoinCodeConfig {
                min: raw.min.unwrap_or(defaults.join_code.min),
                max: raw.max.unwrap_or(defaults.join_code.max),
                random_attempts: raw
                    .random_attempts
                    .unwrap_or(defaults.join_code.random_attempts),
            },
            None => defaults.join_code,
        };
        if join_code.min > join_code.max {
            return Err(format!(
                "join_code.min ({}) exceeds join_code.max ({})",
                join_code.min, join_code.max
            ));
        }
        let width = join_code.max.to_string().len();
        if !(4..=6).contains(&width) {
            return Err(format!(
                "join codes must be 4 to 6 digits wide (join_code.max = {})",
                join_code.max
            ));
        }

        let reveal = match value.reveal {
            Some(raw) => RevealConfig {
                default_timeout: raw
                    .default_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reveal.default_timeout),
                max_timeout: raw
                    .max_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reveal.max_timeout),
            },
            None => defaults.reveal,
        };

        let events_capacity = value
            .events
            .and_then(|raw| raw.capacity)
            .filter(|capacity| *capacity > 0)
            .unwrap_or(defaults.events_capacity);

        Ok(Self {
            join_code,
            reveal,
            events_capacity,
            quizzes: value.quizzes,
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "join_code": { "max": 99999 }, "reveal": { "max_timeout_ms": 5000 } }"#)
                .unwrap();
        let config = AppConfig::try_from(raw).unwrap();

        assert_eq!(config.join_code.min, 1000);
        assert_eq!(config.join_code.max, 99999);
        assert_eq!(config.reveal.max_timeout, Duration::from_secs(5));
        assert_eq!(config.reveal.default_timeout, Duration::from_secs(25));
        assert_eq!(config.events_capacity, 64);
    }

    #[test]
    fn rejects_inverted_or_too_wide_ranges() {
        let inverted: RawConfig =
            serde_json::from_str(r#"{ "join_code": { "min": 5000, "max": 4000 } }"#).unwrap();
        assert!(AppConfig::try_from(inverted).is_err());

        let too_wide: RawConfig =
            serde_json::from_str(r#"{ "join_code": { "max": 9999999 } }"#).unwrap();
        assert!(AppConfig::try_from(too_wide).is_err());
    }

    #[test]
    fn codes_are_zero_padded_to_range_width() {
        let config = JoinCodeConfig {
            min: 0,
            max: 9999,
            random_attempts: 1,
        };
        assert_eq!(config.format(42), "0042");
        assert_eq!(config.capacity(), 10_000);
    }

    #[test]
    fn reveal_timeout_is_clamped() {
        let reveal = RevealConfig::default();
        assert_eq!(reveal.effective_timeout(None), Duration::from_secs(25));
        assert_eq!(
            reveal.effective_timeout(Some(120_000)),
            Duration::from_secs(60)
        );
        assert_eq!(
            reveal.effective_timeout(Some(250)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn seeds_quizzes_from_json() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "quizzes": [ { "session_id": "intro", "owner_id": 7, "questions": [
                { "prompt": "2+2?", "options": ["3", "4"], "correct_option_index": 1 }
            ] } ] }"#,
        )
        .unwrap();
        let config = AppConfig::try_from(raw).unwrap();
        assert_eq!(config.quizzes.len(), 1);
        assert_eq!(config.quizzes[0].questions[0].correct_option_index, 1);
    }
}
