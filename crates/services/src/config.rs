//! Environment-driven configuration.

use std::env;
use std::time::Duration;

use url::Url;
use worksheet_core::model::Subject;

use crate::error::ConfigError;
use crate::sessions::PollPolicy;

const DEFAULT_TIME_LIMIT_SECS: u32 = 30 * 60;
const DEFAULT_PASS_MARK: u8 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Where the per-subject content and grading services live.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub math_url: Url,
    pub korean_url: Url,
    pub english_url: Url,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl BackendConfig {
    /// Read `WORKSHEET_*_URL`, `WORKSHEET_API_TOKEN` and
    /// `WORKSHEET_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable URLs or numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable URLs or numbers.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = |var: &'static str, default: &str| -> Result<Url, ConfigError> {
            let raw = non_blank(lookup(var)).unwrap_or_else(|| default.to_string());
            Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { var, source })
        };

        let timeout_secs = parse_number::<u64>(
            "WORKSHEET_HTTP_TIMEOUT_SECS",
            lookup("WORKSHEET_HTTP_TIMEOUT_SECS"),
        )?
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Ok(Self {
            math_url: url("WORKSHEET_MATH_URL", "http://localhost:8001/api")?,
            korean_url: url("WORKSHEET_KOREAN_URL", "http://localhost:8002/api")?,
            english_url: url("WORKSHEET_ENGLISH_URL", "http://localhost:8003/api")?,
            api_token: non_blank(lookup("WORKSHEET_API_TOKEN")),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    #[must_use]
    pub fn base_url(&self, subject: Subject) -> &Url {
        match subject {
            Subject::Math => &self.math_url,
            Subject::Korean => &self.korean_url,
            Subject::English => &self.english_url,
        }
    }
}

/// Attempt-level knobs: time limit, grading poll budget, pass mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssignmentSettings {
    pub time_limit_secs: u32,
    pub poll: PollPolicy,
    pub pass_mark: u8,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            poll: PollPolicy::default(),
            pass_mark: DEFAULT_PASS_MARK,
        }
    }
}

impl AssignmentSettings {
    /// Read `WORKSHEET_TIME_LIMIT_SECS`, `WORKSHEET_POLL_INTERVAL_MS`,
    /// `WORKSHEET_POLL_ATTEMPTS` and `WORKSHEET_PASS_MARK`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let time_limit_secs =
            parse_number::<u32>("WORKSHEET_TIME_LIMIT_SECS", lookup("WORKSHEET_TIME_LIMIT_SECS"))?
                .unwrap_or(defaults.time_limit_secs);
        let interval_ms =
            parse_number::<u64>("WORKSHEET_POLL_INTERVAL_MS", lookup("WORKSHEET_POLL_INTERVAL_MS"))?;
        let attempts =
            parse_number::<u32>("WORKSHEET_POLL_ATTEMPTS", lookup("WORKSHEET_POLL_ATTEMPTS"))?;
        if attempts == Some(0) {
            return Err(ConfigError::OutOfRange {
                var: "WORKSHEET_POLL_ATTEMPTS",
                value: 0,
            });
        }
        let pass_mark = parse_number::<u8>("WORKSHEET_PASS_MARK", lookup("WORKSHEET_PASS_MARK"))?
            .unwrap_or(defaults.pass_mark);
        if pass_mark > 100 {
            return Err(ConfigError::OutOfRange {
                var: "WORKSHEET_PASS_MARK",
                value: u64::from(pass_mark),
            });
        }

        Ok(Self {
            time_limit_secs,
            poll: PollPolicy {
                interval: interval_ms.map_or(defaults.poll.interval, Duration::from_millis),
                max_attempts: attempts.unwrap_or(defaults.poll.max_attempts),
            },
            pass_mark,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    non_blank(raw)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn backend_defaults_point_at_localhost() {
        let config = BackendConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url(Subject::Korean).as_str(), "http://localhost:8002/api");
        assert_eq!(config.api_token, None);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn backend_reads_overrides_and_ignores_blank_token() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("WORKSHEET_MATH_URL", "https://math.example.com/v2/"),
            ("WORKSHEET_API_TOKEN", "   "),
            ("WORKSHEET_HTTP_TIMEOUT_SECS", "4"),
        ]))
        .unwrap();
        assert_eq!(config.math_url.as_str(), "https://math.example.com/v2/");
        assert_eq!(config.api_token, None);
        assert_eq!(config.request_timeout, Duration::from_secs(4));
    }

    #[test]
    fn backend_rejects_bad_url() {
        let err = BackendConfig::from_lookup(lookup(&[("WORKSHEET_ENGLISH_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                var: "WORKSHEET_ENGLISH_URL",
                ..
            }
        ));
    }

    #[test]
    fn settings_default_to_thirty_polls_one_second_apart() {
        let settings = AssignmentSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, AssignmentSettings::default());
        assert_eq!(settings.poll.interval, Duration::from_secs(1));
        assert_eq!(settings.poll.max_attempts, 30);
        assert_eq!(settings.pass_mark, 60);
    }

    #[test]
    fn settings_validate_numbers() {
        let err = AssignmentSettings::from_lookup(lookup(&[("WORKSHEET_TIME_LIMIT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = AssignmentSettings::from_lookup(lookup(&[("WORKSHEET_PASS_MARK", "120")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));

        let err = AssignmentSettings::from_lookup(lookup(&[("WORKSHEET_POLL_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn settings_read_poll_overrides() {
        let settings = AssignmentSettings::from_lookup(lookup(&[
            ("WORKSHEET_POLL_INTERVAL_MS", "250"),
            ("WORKSHEET_POLL_ATTEMPTS", "8"),
            ("WORKSHEET_TIME_LIMIT_SECS", "600"),
        ]))
        .unwrap();
        assert_eq!(settings.poll.interval, Duration::from_millis(250));
        assert_eq!(settings.poll.max_attempts, 8);
        assert_eq!(settings.time_limit_secs, 600);
    }
}
