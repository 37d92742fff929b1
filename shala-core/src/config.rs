use std::{env, str::FromStr};

use thiserror::Error;

/// Timing rules for checking in to and entering events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How many minutes before an event starts check-ins open
    pub minutes_to_check_in: i64,
    /// Check-ins can only be cancelled when the event is at most this many minutes away
    pub minutes_to_cancel_check_in: i64,
    /// How many minutes after an event started a checked in user can still enter
    pub tolerance_minutes_to_enter_event: i64,
}

#[derive(Debug, Error)]
#[error("{variable} must be a whole number of minutes, got {value:?}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl Config {
    pub const MINUTES_TO_CHECK_IN_VAR: &'static str = "SHALA_MINUTES_TO_CHECK_IN";
    pub const MINUTES_TO_CANCEL_CHECK_IN_VAR: &'static str = "SHALA_MINUTES_TO_CANCEL_CHECK_IN";
    pub const TOLERANCE_MINUTES_TO_ENTER_EVENT_VAR: &'static str =
        "SHALA_TOLERANCE_MINUTES_TO_ENTER_EVENT";

    /// Reads the config from the environment, falling back to the defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            minutes_to_check_in: read_var(
                Self::MINUTES_TO_CHECK_IN_VAR,
                defaults.minutes_to_check_in,
            )?,
            minutes_to_cancel_check_in: read_var(
                Self::MINUTES_TO_CANCEL_CHECK_IN_VAR,
                defaults.minutes_to_cancel_check_in,
            )?,
            tolerance_minutes_to_enter_event: read_var(
                Self::TOLERANCE_MINUTES_TO_ENTER_EVENT_VAR,
                defaults.tolerance_minutes_to_enter_event,
            )?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // A day ahead
            minutes_to_check_in: 60 * 24,
            minutes_to_cancel_check_in: 60 * 24,
            tolerance_minutes_to_enter_event: 15,
        }
    }
}

fn read_var<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError { variable, value }),
        Err(_) => Ok(default),
    }
}
