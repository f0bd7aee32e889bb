use std::time::Duration;

use crate::{ReadinessError, Result};

/// Configures poll pacing, attempt budgets and per-request timeout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollOptions {
    /// Fixed wait between attempts in milliseconds.
    pub poll_interval_ms: u64,
    /// Remaining-attempt budget for the key fetch. The key map is queried at
    /// most `key_attempts + 1` times.
    pub key_attempts: usize,
    /// Maximum number of validation requests sent by the endpoint probe.
    pub probe_attempts: usize,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            key_attempts: 30,
            probe_attempts: 30,
            request_timeout_ms: 10_000,
        }
    }
}

impl PollOptions {
    /// Reads overrides from the environment.
    ///
    /// Reads (each optional, defaults apply when unset):
    /// - `READINESS_POLL_INTERVAL_MS`
    /// - `READINESS_KEY_ATTEMPTS`
    /// - `READINESS_PROBE_ATTEMPTS`
    /// - `READINESS_REQUEST_TIMEOUT_MS`
    ///
    /// Returns [`ReadinessError::Config`] when a variable is set but is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            poll_interval_ms: parse_var(&lookup, "READINESS_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            key_attempts: parse_var(&lookup, "READINESS_KEY_ATTEMPTS")?
                .unwrap_or(defaults.key_attempts),
            probe_attempts: parse_var(&lookup, "READINESS_PROBE_ATTEMPTS")?
                .unwrap_or(defaults.probe_attempts),
            request_timeout_ms: parse_var(&lookup, "READINESS_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout_ms),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ReadinessError::Config(format!("{name} must be a non-negative integer, got '{raw}'")))
}

/// Whether the provisioning engine is applying changes or only planning them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Dry run: resource outputs may be placeholders, nothing remote is touched.
    Plan,
    #[default]
    Apply,
}

impl ExecutionMode {
    /// Reads `PULUMI_DRY_RUN`; `true` or `1` selects [`ExecutionMode::Plan`].
    pub fn from_env() -> Self {
        Self::from_dry_run_flag(std::env::var("PULUMI_DRY_RUN").ok().as_deref())
    }

    pub(crate) fn from_dry_run_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some(value) if value == "1" || value.eq_ignore_ascii_case("true") => Self::Plan,
            _ => Self::Apply,
        }
    }

    pub fn is_plan(self) -> bool {
        self == Self::Plan
    }
}
