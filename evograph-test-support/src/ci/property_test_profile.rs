//! Property-test run profile read from the environment.
//!
//! CI raises the case count with `PROGTEST_CASES` and isolates failures with
//! `EVOGRAPH_PBT_FORK`; local runs fall back to each suite's defaults.

use std::env;

use thiserror::Error;

/// Environment variable overriding the number of cases per property.
pub const PROGTEST_CASES_ENV_KEY: &str = "PROGTEST_CASES";
/// Environment variable toggling forked proptest execution.
pub const EVOGRAPH_PBT_FORK_ENV_KEY: &str = "EVOGRAPH_PBT_FORK";

/// Why an override was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    /// The case count is not a positive integer.
    #[error("expected a positive case count, got `{raw}`")]
    Cases {
        /// Raw environment value.
        raw: String,
    },
    /// The fork flag is not a recognised boolean.
    #[error("expected one of true/false/1/0/yes/no/on/off, got `{raw}`")]
    Fork {
        /// Raw environment value.
        raw: String,
    },
}

/// Case count and fork mode for one property suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Loads the profile, keeping the defaults for unset or invalid
    /// variables. Invalid values are logged at `warn`.
    ///
    /// # Examples
    ///
    /// ```
    /// use evograph_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self {
            cases: override_or(PROGTEST_CASES_ENV_KEY, default_cases, parse_cases),
            fork: override_or(EVOGRAPH_PBT_FORK_ENV_KEY, default_fork, parse_fork),
        }
    }

    /// Cases to run per property.
    #[must_use]
    pub const fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether cases run in forked subprocesses.
    #[must_use]
    pub const fn fork(&self) -> bool {
        self.fork
    }
}

fn override_or<T>(key: &'static str, default: T, parse: fn(&str) -> Result<T, OverrideError>) -> T {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    parse(&raw).unwrap_or_else(|err| {
        tracing::warn!(env = key, error = %err, "ignoring property-test profile override");
        default
    })
}

/// Parses a positive case count.
///
/// # Errors
/// Returns [`OverrideError::Cases`] for zero or non-numeric input.
pub fn parse_cases(raw: &str) -> Result<u32, OverrideError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|cases| *cases > 0)
        .ok_or_else(|| OverrideError::Cases {
            raw: raw.to_owned(),
        })
}

/// Parses a fork flag.
///
/// # Errors
/// Returns [`OverrideError::Fork`] for anything but the accepted spellings.
pub fn parse_fork(raw: &str) -> Result<bool, OverrideError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OverrideError::Fork {
            raw: raw.to_owned(),
        }),
    }
}
