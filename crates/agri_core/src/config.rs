use anyhow::Result;
use tracing::debug;

/// Immediate tests allowed between counter resets.
pub const MAX_TEST_NOTIFICATIONS: u32 = 2;
pub const DAILY_REMINDER_DELAY_SECS: u64 = 5 * 60;
/// The weather alert always fires this long after the daily reminder.
pub const WEATHER_ALERT_OFFSET_SECS: u64 = 30;
pub const FIRST_IMMEDIATE_DELAY_SECS: u64 = 10;
pub const SECOND_IMMEDIATE_DELAY_SECS: u64 = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub counter_key: String,
    pub default_user_name: String,
    /// Also treat titles containing "TEST" as self-tests when listing and
    /// canceling. When off, only a payload `testId` qualifies.
    pub match_title_marker: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            counter_key: "test_notification_count".to_string(),
            default_user_name: "Agriculteur".to_string(),
            match_title_marker: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`; unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(key) = lookup("AGRI_COUNTER_KEY") {
            if !key.trim().is_empty() {
                config.counter_key = key.trim().to_string();
            }
        }
        if let Some(flag) = lookup("AGRI_MATCH_TITLE_MARKER") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.match_title_marker = true,
                "0" | "false" | "no" | "off" => config.match_title_marker = false,
                other => debug!(value = other, "ignoring unrecognised title marker flag"),
            }
        }
        Ok(config)
    }
}
