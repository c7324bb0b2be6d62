/*!
 * Configuration Module
 *
 * Handles core configuration loading from environment variables and
 * provides structured access to configuration values.
 *
 * The config is passed into every service; the core never reads ambient
 * global state during scheduling decisions.
 */

use chrono_tz::Tz;

/// Default practice time zone when none is configured.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Berlin;

/// Scheduling core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Practice time zone; all day-boundary calculations run here.
    pub time_zone: Tz,
    /// Granularity of the slot-suggestion scan in minutes.
    pub slot_step_minutes: u32,
    /// Upper bound of days a suggestion scan may walk forward.
    pub max_scan_days: u32,
    /// Annual vacation day allocation per doctor.
    pub default_vacation_allocation: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE,
            slot_step_minutes: 5,
            max_scan_days: 366,
            default_vacation_allocation: 30,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized keys: `PRACTICE_TIME_ZONE`, `SLOT_STEP_MINUTES`,
    /// `MAX_SCAN_DAYS`, `VACATION_DAYS_PER_YEAR`. Missing or malformed
    /// values fall back to the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let time_zone = match std::env::var("PRACTICE_TIME_ZONE") {
            Ok(name) => name.parse::<Tz>().map_err(|_| {
                anyhow::anyhow!("PRACTICE_TIME_ZONE is not a valid IANA zone: {name}")
            })?,
            Err(_) => defaults.time_zone,
        };

        let slot_step_minutes = std::env::var("SLOT_STEP_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(defaults.slot_step_minutes);

        let max_scan_days = std::env::var("MAX_SCAN_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(defaults.max_scan_days);

        let default_vacation_allocation = std::env::var("VACATION_DAYS_PER_YEAR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_vacation_allocation);

        let config = Self {
            time_zone,
            slot_step_minutes,
            max_scan_days,
            default_vacation_allocation,
        };

        tracing::debug!(
            time_zone = %config.time_zone,
            slot_step_minutes = config.slot_step_minutes,
            max_scan_days = config.max_scan_days,
            "core configuration loaded"
        );

        Ok(config)
    }
}
