//! Configuration validation

use crate::schema::RawConfig;
use crate::{
    DEFAULT_CHARGE_DURATION_SECS, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_WARNING_LEAD_SECS,
    MAX_DURATION_SECS,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timing.{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("timing.{field} is {seconds}s, more than the limit of {max}s")]
    DurationTooLong {
        field: &'static str,
        seconds: u64,
        max: u64,
    },

    #[error("warning lead {warning_lead:?} must be shorter than charge duration {charge_duration:?}")]
    WarningNotBeforeExpiry {
        warning_lead: Duration,
        charge_duration: Duration,
    },

    #[error("Invalid http_addr '{value}': {message}")]
    InvalidHttpAddr { value: String, message: String },

    #[error("service.log_level cannot be empty")]
    EmptyLogLevel,
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let timing = &config.timing;
    let grace = timing.grace_period_seconds.unwrap_or(DEFAULT_GRACE_PERIOD_SECS);
    let charge = timing
        .charge_duration_seconds
        .unwrap_or(DEFAULT_CHARGE_DURATION_SECS);
    let lead = timing.warning_lead_seconds.unwrap_or(DEFAULT_WARNING_LEAD_SECS);

    errors.extend(validate_timing(
        Duration::from_secs(grace),
        Duration::from_secs(charge),
        Duration::from_secs(lead),
    ));

    if let Some(addr) = &config.service.http_addr
        && let Err(e) = addr.parse::<SocketAddr>()
    {
        errors.push(ValidationError::InvalidHttpAddr {
            value: addr.clone(),
            message: e.to_string(),
        });
    }

    if let Some(level) = &config.service.log_level
        && level.trim().is_empty()
    {
        errors.push(ValidationError::EmptyLogLevel);
    }

    errors
}

/// Check the three session durations
pub fn validate_timing(grace: Duration, charge: Duration, lead: Duration) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("grace_period_seconds", grace),
        ("charge_duration_seconds", charge),
        ("warning_lead_seconds", lead),
    ] {
        if value.is_zero() {
            errors.push(ValidationError::ZeroDuration { field });
        } else if value > Duration::from_secs(MAX_DURATION_SECS) {
            errors.push(ValidationError::DurationTooLong {
                field,
                seconds: value.as_secs(),
                max: MAX_DURATION_SECS,
            });
        }
    }

    // Only meaningful once both are positive
    if !charge.is_zero() && !lead.is_zero() && lead >= charge {
        errors.push(ValidationError::WarningNotBeforeExpiry {
            warning_lead: lead,
            charge_duration: charge,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawServiceConfig, RawTiming};

    fn config_with(timing: RawTiming) -> RawConfig {
        RawConfig {
            config_version: 1,
            service: RawServiceConfig::default(),
            timing,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&config_with(RawTiming::default())).is_empty());
    }

    #[test]
    fn zero_durations_rejected() {
        let errors = validate_timing(Duration::ZERO, Duration::from_secs(5400), Duration::ZERO);
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroDuration {
                    field: "grace_period_seconds"
                },
                ValidationError::ZeroDuration {
                    field: "warning_lead_seconds"
                },
            ]
        );
    }

    #[test]
    fn warning_must_precede_expiry() {
        let errors = validate_config(&config_with(RawTiming {
            grace_period_seconds: None,
            charge_duration_seconds: Some(600),
            warning_lead_seconds: Some(600),
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::WarningNotBeforeExpiry { .. })));
    }

    #[test]
    fn huge_durations_rejected() {
        let errors = validate_config(&config_with(RawTiming {
            grace_period_seconds: Some(i64::MAX as u64),
            charge_duration_seconds: Some(MAX_DURATION_SECS + 1),
            warning_lead_seconds: None,
        }));
        assert_eq!(
            errors,
            vec![
                ValidationError::DurationTooLong {
                    field: "grace_period_seconds",
                    seconds: i64::MAX as u64,
                    max: MAX_DURATION_SECS,
                },
                ValidationError::DurationTooLong {
                    field: "charge_duration_seconds",
                    seconds: MAX_DURATION_SECS + 1,
                    max: MAX_DURATION_SECS,
                },
            ]
        );
    }

    #[test]
    fn one_day_is_accepted() {
        let day = Duration::from_secs(MAX_DURATION_SECS);
        assert!(validate_timing(day, day, Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn collects_every_error() {
        let mut config = config_with(RawTiming {
            grace_period_seconds: Some(0),
            charge_duration_seconds: Some(60),
            warning_lead_seconds: Some(120),
        });
        config.service.http_addr = Some("not-an-address".into());

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidHttpAddr { .. })));
    }
}
