use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker every self-test title carries.
pub const TEST_TITLE_MARKER: &str = "TEST";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(PermissionState::Granted),
            "denied" => Ok(PermissionState::Denied),
            "undetermined" => Ok(PermissionState::Undetermined),
            other => Err(anyhow!("unknown permission state `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    DailyTest,
    WeatherTest,
    IrrigationTest,
}

impl TestCategory {
    pub fn tag(&self) -> &'static str {
        match self {
            TestCategory::DailyTest => "daily_test",
            TestCategory::WeatherTest => "weather_test",
            TestCategory::IrrigationTest => "irrigation_test",
        }
    }

    /// Builds a `testId` from the category tag and the scheduling instant.
    pub fn test_id(&self, at: DateTime<Utc>, sequence: Option<u32>) -> String {
        match sequence {
            Some(n) => format!("{}_{}_{}", self.tag(), at.timestamp_millis(), n),
            None => format!("{}_{}", self.tag(), at.timestamp_millis()),
        }
    }
}

/// Data attached to a notification. Keys the coordinator does not know about
/// are kept in `extra` so production payloads survive a round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_number: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NotificationPayload {
    pub fn one_time_test(category: TestCategory, test_id: String) -> Self {
        Self {
            kind: Some(category.tag().to_string()),
            test_id: Some(test_id),
            one_time: Some(true),
            ..Self::default()
        }
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.notification_number = Some(number);
        self
    }

    pub fn has_test_id(&self) -> bool {
        self.test_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: NotificationPayload,
}

/// When a one-shot notification fires. Nothing here repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    At { date: DateTime<Utc> },
    After { seconds: u64 },
}

impl TriggerSpec {
    pub fn at(date: DateTime<Utc>) -> Self {
        TriggerSpec::At { date }
    }

    pub fn after(seconds: u64) -> Self {
        TriggerSpec::After { seconds }
    }

    /// Absolute fire time, resolving relative triggers against `reference`.
    pub fn resolve(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TriggerSpec::At { date } => Some(*date),
            TriggerSpec::After { seconds } => add_seconds(reference, *seconds),
        }
    }
}

/// `at + seconds`, or `None` when the result is not representable.
pub fn add_seconds(at: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    at.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledNotification {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: TriggerSpec,
    /// Absolute fire time as resolved by the scheduler when it scheduled the
    /// notification. Relative triggers only mean something against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fires_at: Option<DateTime<Utc>>,
}

impl ScheduledNotification {
    /// Best known absolute fire time.
    pub fn fire_time(&self) -> Option<DateTime<Utc>> {
        match (self.fires_at, self.trigger) {
            (Some(at), _) => Some(at),
            (None, TriggerSpec::At { date }) => Some(date),
            (None, TriggerSpec::After { .. }) => None,
        }
    }

    /// A notification counts as a self-test when its payload carries a
    /// `testId`, or, when `match_title_marker` is set, its title contains
    /// [`TEST_TITLE_MARKER`].
    pub fn is_test(&self, match_title_marker: bool) -> bool {
        self.content.data.has_test_id()
            || (match_title_marker && self.content.title.contains(TEST_TITLE_MARKER))
    }
}

/// Platform notification adapters implement this trait.
pub trait NotificationScheduler: Send + Sync {
    fn request_permissions(&self) -> Result<bool>;
    fn permission_status(&self) -> Result<PermissionState>;
    /// Registers the device for push delivery. Repeated calls for the same
    /// user are harmless and return the same token.
    fn register_for_push(&self, user_id: &str) -> Result<String>;
    fn schedule(&self, content: NotificationContent, trigger: TriggerSpec) -> Result<String>;
    fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>>;
    fn cancel(&self, identifier: &str) -> Result<()>;
}
