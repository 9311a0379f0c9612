//! Engine-wide booking settings.

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting failed validation
    #[error("Invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Validation and retry knobs shared by the managers. Venue operating
/// hours live on the venue itself; these bound what any venue accepts.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Requested start times must align to this many minutes.
    pub slot_step_minutes: u32,
    /// Minimum booking length in whole hours.
    pub min_duration_hours: u32,
    /// Maximum booking length in whole hours.
    pub max_duration_hours: u32,
    /// Currency code handed to the payment provider.
    pub currency: String,
    /// Bounded retries for transient store failures.
    pub max_transient_retries: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            slot_step_minutes: 15,
            min_duration_hours: 1,
            max_duration_hours: 15,
            currency: "usd".to_string(),
            max_transient_retries: 3,
        }
    }
}

impl BookingSettings {
    /// Load settings from environment variables, falling back to
    /// defaults for anything unset or unparsable, and validate the
    /// result as a whole.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            slot_step_minutes: parse_env_or("BOOKING_SLOT_STEP_MINUTES", 15),
            min_duration_hours: parse_env_or("BOOKING_MIN_DURATION_HOURS", 1),
            max_duration_hours: parse_env_or("BOOKING_MAX_DURATION_HOURS", 15),
            currency: std::env::var("BOOKING_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            max_transient_retries: parse_env_or("BOOKING_MAX_TRANSIENT_RETRIES", 3),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_step_minutes == 0 || 60 % self.slot_step_minutes != 0 {
            return Err(ConfigError::Invalid {
                var: "slot_step_minutes",
                reason: format!("{} must divide 60", self.slot_step_minutes),
            });
        }
        if self.min_duration_hours == 0 {
            return Err(ConfigError::Invalid {
                var: "min_duration_hours",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_duration_hours < self.min_duration_hours {
            return Err(ConfigError::Invalid {
                var: "max_duration_hours",
                reason: format!(
                    "{} is below min_duration_hours {}",
                    self.max_duration_hours, self.min_duration_hours
                ),
            });
        }
        if self.currency.is_empty() {
            return Err(ConfigError::Invalid {
                var: "currency",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
