use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use conductor_core::errors::{ConductorError, ConductorResult};

/// Thin wrapper over a parsed cron expression.
pub struct CronSchedule {
    schedule: Schedule,
}

impl CronSchedule {
    pub fn new(cron_expr: &str) -> ConductorResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| ConductorError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    /// Next occurrence strictly after `from`.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    pub fn validate(cron_expr: &str) -> ConductorResult<()> {
        Self::new(cron_expr).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_after() {
        // every 5 minutes
        let schedule = CronSchedule::new("0 */5 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 0).unwrap();
        let next = schedule.next_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap());
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronSchedule::validate("not a cron").is_err());
        assert!(CronSchedule::validate("0 */5 * * * *").is_ok());
    }
}
