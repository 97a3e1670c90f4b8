//! Validated policy structures

use crate::schema::{RawConfig, RawServiceConfig, RawTiming};
use crate::validation::{validate_timing, ValidationError};
use crate::{DEFAULT_CHARGE_DURATION_SECS, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_WARNING_LEAD_SECS};
use chargebot_api::TimingInfo;
use chargebot_util::socket_path_without_env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Validated policy ready for use by the daemon and the session manager
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub timing: Timing,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Result<Self, Vec<ValidationError>> {
        Ok(Self {
            service: ServiceConfig::from_raw(raw.service),
            timing: Timing::from_raw(&raw.timing)?,
        })
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub http_addr: Option<SocketAddr>,
    pub log_level: String,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(socket_path_without_env),
            // validated already; a bad address never reaches here
            http_addr: raw.http_addr.and_then(|a| a.parse().ok()),
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Session timings.
///
/// Every value is positive and at most a day, and the warning lead is
/// strictly shorter than the charge duration; the constructor refuses
/// anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    grace_period: Duration,
    charge_duration: Duration,
    warning_lead: Duration,
}

impl Timing {
    pub fn new(
        grace_period: Duration,
        charge_duration: Duration,
        warning_lead: Duration,
    ) -> Result<Self, Vec<ValidationError>> {
        let errors = validate_timing(grace_period, charge_duration, warning_lead);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            grace_period,
            charge_duration,
            warning_lead,
        })
    }

    fn from_raw(raw: &RawTiming) -> Result<Self, Vec<ValidationError>> {
        Self::new(
            Duration::from_secs(raw.grace_period_seconds.unwrap_or(DEFAULT_GRACE_PERIOD_SECS)),
            Duration::from_secs(
                raw.charge_duration_seconds
                    .unwrap_or(DEFAULT_CHARGE_DURATION_SECS),
            ),
            Duration::from_secs(raw.warning_lead_seconds.unwrap_or(DEFAULT_WARNING_LEAD_SECS)),
        )
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn charge_duration(&self) -> Duration {
        self.charge_duration
    }

    pub fn warning_lead(&self) -> Duration {
        self.warning_lead
    }

    /// Offset from charge start at which the warning fires
    pub fn warning_after(&self) -> Duration {
        self.charge_duration - self.warning_lead
    }

    pub fn to_info(&self) -> TimingInfo {
        TimingInfo {
            grace_period: self.grace_period,
            charge_duration: self.charge_duration,
            warning_lead: self.warning_lead,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
            charge_duration: Duration::from_secs(DEFAULT_CHARGE_DURATION_SECS),
            warning_lead: Duration::from_secs(DEFAULT_WARNING_LEAD_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.grace_period(), Duration::from_secs(5 * 60));
        assert_eq!(timing.charge_duration(), Duration::from_secs(90 * 60));
        assert_eq!(timing.warning_after(), Duration::from_secs(80 * 60));
    }

    #[test]
    fn timing_rejects_bad_lead() {
        let result = Timing::new(
            Duration::from_secs(60),
            Duration::from_secs(600),
            Duration::from_secs(600),
        );
        assert!(result.is_err());

        let result = Timing::new(
            Duration::from_millis(100),
            Duration::from_millis(900),
            Duration::from_millis(950),
        );
        assert!(result.is_err());
    }

    #[test]
    fn timing_accepts_sub_second_values() {
        let timing = Timing::new(
            Duration::from_millis(100),
            Duration::from_millis(900),
            Duration::from_millis(300),
        )
        .unwrap();
        assert_eq!(timing.warning_after(), Duration::from_millis(600));
    }
}
