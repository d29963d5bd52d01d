use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::alert::{self, Alert, AlertPresenter};
use crate::config::{
    CoordinatorConfig, DAILY_REMINDER_DELAY_SECS, FIRST_IMMEDIATE_DELAY_SECS,
    MAX_TEST_NOTIFICATIONS, SECOND_IMMEDIATE_DELAY_SECS, WEATHER_ALERT_OFFSET_SECS,
};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::notifications::{
    add_seconds, NotificationContent, NotificationPayload, NotificationScheduler,
    ScheduledNotification, TestCategory, TriggerSpec,
};
use crate::store::KeyValueStore;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullTestSchedule {
    pub push_token: String,
    pub daily_at: DateTime<Utc>,
    pub weather_at: DateTime<Utc>,
    pub daily_id: String,
    pub weather_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FullTestOutcome {
    Scheduled(FullTestSchedule),
    PermissionDenied,
    Failed { reason: String },
}

impl FullTestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FullTestOutcome::Scheduled(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImmediateTestOutcome {
    /// `sent` is the counter value after this call.
    Scheduled {
        scheduled: u32,
        sent: u32,
        remaining: u32,
        max: u32,
    },
    LimitReached {
        max: u32,
    },
    /// `scheduled` notifications went out before the failure and were counted.
    Failed {
        scheduled: u32,
        reason: String,
    },
}

impl ImmediateTestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImmediateTestOutcome::Scheduled { .. })
    }

    pub fn remaining(&self) -> u32 {
        match self {
            ImmediateTestOutcome::Scheduled { remaining, .. } => *remaining,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestNotificationView {
    pub identifier: String,
    pub title: String,
    pub test_id: Option<String>,
    pub category: Option<String>,
    pub trigger: TriggerSpec,
    /// Absolute fire time when the scheduler reported one.
    pub fires_at: Option<DateTime<Utc>>,
    pub fire_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionReport {
    pub permission: crate::notifications::PermissionState,
    pub sent: u32,
    pub max: u32,
    pub remaining: u32,
}

/// Schedules diagnostic notifications against the platform scheduler and
/// tracks the immediate-test quota in the key-value store.
///
/// Holds no mutable state of its own. Every public operation catches its own
/// failures and reports them through its return value.
pub struct NotificationTestCoordinator {
    scheduler: Arc<dyn NotificationScheduler>,
    store: Arc<dyn KeyValueStore>,
    presenter: Option<Box<dyn AlertPresenter>>,
    config: CoordinatorConfig,
    clock: Clock,
}

pub struct NotificationTestCoordinatorBuilder {
    scheduler: Option<Arc<dyn NotificationScheduler>>,
    store: Option<Arc<dyn KeyValueStore>>,
    presenter: Option<Box<dyn AlertPresenter>>,
    config: CoordinatorConfig,
    clock: Option<Clock>,
}

impl Default for NotificationTestCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTestCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            scheduler: None,
            store: None,
            presenter: None,
            config: CoordinatorConfig::default(),
            clock: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_presenter(mut self, presenter: Box<dyn AlertPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<NotificationTestCoordinator> {
        let scheduler = self
            .scheduler
            .ok_or_else(|| anyhow!("a notification scheduler is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow!("a key-value store is required"))?;
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };
        Ok(NotificationTestCoordinator {
            scheduler,
            store,
            presenter: self.presenter,
            config: self.config,
            clock,
        })
    }
}

impl NotificationTestCoordinator {
    pub fn builder() -> NotificationTestCoordinatorBuilder {
        NotificationTestCoordinatorBuilder::new()
    }

    /// Requests permission, registers for push and schedules the daily crop
    /// reminder plus the weather alert that follows it.
    #[instrument(skip(self))]
    pub fn schedule_full_test(&self, user_id: &str, user_name: &str) -> FullTestOutcome {
        let outcome = match self.try_full_test(user_id, user_name) {
            Ok(schedule) => {
                info!(
                    daily_at = %schedule.daily_at,
                    weather_at = %schedule.weather_at,
                    "full notification test scheduled"
                );
                FullTestOutcome::Scheduled(schedule)
            }
            Err(CoordinatorError::PermissionDenied) => {
                warn!("notification permission refused, full test aborted");
                FullTestOutcome::PermissionDenied
            }
            Err(err) => {
                Self::log_failure(&err, "full notification test failed");
                FullTestOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        self.present(outcome.alert());
        outcome
    }

    /// Schedules up to two quota-limited irrigation tests, 10 s and 40 s out.
    #[instrument(skip(self))]
    pub fn schedule_immediate_test(&self, user_name: &str) -> ImmediateTestOutcome {
        let mut scheduled = 0;
        let outcome = match self.try_immediate_test(user_name, &mut scheduled) {
            Ok(sent) => {
                let max = MAX_TEST_NOTIFICATIONS;
                info!(scheduled, sent, max, "immediate notification test scheduled");
                ImmediateTestOutcome::Scheduled {
                    scheduled,
                    sent,
                    remaining: max.saturating_sub(sent),
                    max,
                }
            }
            Err(CoordinatorError::QuotaExceeded { max }) => {
                warn!(max, "test notification quota reached");
                ImmediateTestOutcome::LimitReached { max }
            }
            Err(err) => {
                Self::log_failure(&err, "immediate notification test failed");
                ImmediateTestOutcome::Failed {
                    scheduled,
                    reason: err.to_string(),
                }
            }
        };
        self.present(outcome.alert());
        outcome
    }

    /// Pending self-test notifications in scheduler order.
    #[instrument(skip(self))]
    pub fn list_scheduled_tests(&self) -> Vec<TestNotificationView> {
        let views = match self.test_entries() {
            Ok(entries) => entries.iter().map(Self::view).collect(),
            Err(err) => {
                error!(%err, "unable to list scheduled test notifications");
                Vec::new()
            }
        };
        debug!(count = views.len(), "listed scheduled test notifications");
        self.present(alert::listing(&views));
        views
    }

    /// Cancels every pending self-test notification. The quota counter is
    /// left alone.
    #[instrument(skip(self))]
    pub fn cancel_all_tests(&self) -> usize {
        let mut canceled = 0;
        if let Err(err) = self.try_cancel_all(&mut canceled) {
            error!(%err, canceled, "canceling test notifications stopped early");
        } else {
            info!(canceled, "test notifications canceled");
        }
        self.present(alert::canceled(canceled));
        canceled
    }

    #[instrument(skip(self))]
    pub fn check_permission_status(&self) -> Option<PermissionReport> {
        let report = match self.try_permission_report() {
            Ok(report) => Some(report),
            Err(err) => {
                error!(%err, "unable to read notification status");
                None
            }
        };
        self.present(alert::permission(report.as_ref()));
        report
    }

    /// Returns the quota counter to zero. Scheduled notifications are not
    /// affected.
    #[instrument(skip(self))]
    pub fn reset_counter(&self) -> bool {
        let reset = match self.store.remove(&self.config.counter_key) {
            Ok(()) => {
                info!(key = %self.config.counter_key, "test counter reset");
                true
            }
            Err(err) => {
                error!(%err, "unable to reset test counter");
                false
            }
        };
        self.present(alert::reset(reset));
        reset
    }
}

impl NotificationTestCoordinator {
    fn try_full_test(&self, user_id: &str, user_name: &str) -> CoordinatorResult<FullTestSchedule> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(CoordinatorError::InvalidUser);
        }
        let user_name = self.display_name(user_name);

        let granted = self
            .scheduler
            .request_permissions()
            .map_err(CoordinatorError::Scheduler)?;
        if !granted {
            return Err(CoordinatorError::PermissionDenied);
        }

        let push_token = self
            .scheduler
            .register_for_push(user_id)
            .map_err(CoordinatorError::Scheduler)?;
        debug!(%push_token, "device registered for push delivery");

        let now = (self.clock)();
        let daily_at = Self::offset(now, DAILY_REMINDER_DELAY_SECS)?;
        let weather_at = Self::offset(daily_at, WEATHER_ALERT_OFFSET_SECS)?;

        let daily = NotificationContent {
            title: "TEST - Rappel soins des cultures".to_string(),
            body: format!(
                "Bonjour {user_name}, pensez à vérifier l'état de vos cultures aujourd'hui."
            ),
            data: NotificationPayload::one_time_test(
                TestCategory::DailyTest,
                TestCategory::DailyTest.test_id(now, None),
            ),
        };
        let daily_id = self.schedule(daily, TriggerSpec::at(daily_at))?;

        let weather = NotificationContent {
            title: "TEST - Alerte météo".to_string(),
            body: "Risque de fortes pluies dans votre zone. Reportez l'irrigation prévue."
                .to_string(),
            data: NotificationPayload::one_time_test(
                TestCategory::WeatherTest,
                TestCategory::WeatherTest.test_id(now, None),
            ),
        };
        let weather_id = self.schedule(weather, TriggerSpec::at(weather_at))?;

        Ok(FullTestSchedule {
            push_token,
            daily_at,
            weather_at,
            daily_id,
            weather_id,
        })
    }

    fn try_immediate_test(&self, user_name: &str, scheduled: &mut u32) -> CoordinatorResult<u32> {
        let max = MAX_TEST_NOTIFICATIONS;
        let count = self.read_counter()?;
        if count >= max {
            return Err(CoordinatorError::QuotaExceeded { max });
        }

        let user_name = self.display_name(user_name);
        let now = (self.clock)();
        let mut sent = count;

        for delay in [FIRST_IMMEDIATE_DELAY_SECS, SECOND_IMMEDIATE_DELAY_SECS] {
            if sent >= max {
                break;
            }
            let number = sent + 1;
            let content = NotificationContent {
                title: format!("TEST {number}/{max} - Rappel d'irrigation"),
                body: format!("{user_name}, ceci est la notification de test {number} sur {max}."),
                data: NotificationPayload::one_time_test(
                    TestCategory::IrrigationTest,
                    TestCategory::IrrigationTest.test_id(now, Some(number)),
                )
                .with_number(number),
            };
            self.schedule(content, TriggerSpec::after(delay))?;
            *scheduled += 1;
            sent = self.increment_counter()?;
        }
        Ok(sent)
    }

    fn try_cancel_all(&self, canceled: &mut usize) -> CoordinatorResult<()> {
        for entry in self.test_entries()? {
            self.scheduler
                .cancel(&entry.identifier)
                .map_err(CoordinatorError::Scheduler)?;
            debug!(identifier = %entry.identifier, "test notification canceled");
            *canceled += 1;
        }
        Ok(())
    }

    fn try_permission_report(&self) -> CoordinatorResult<PermissionReport> {
        let permission = self
            .scheduler
            .permission_status()
            .map_err(CoordinatorError::Scheduler)?;
        let sent = self.read_counter()?;
        let max = MAX_TEST_NOTIFICATIONS;
        Ok(PermissionReport {
            permission,
            sent,
            max,
            remaining: max.saturating_sub(sent),
        })
    }

    fn test_entries(&self) -> CoordinatorResult<Vec<ScheduledNotification>> {
        let entries = self
            .scheduler
            .list_scheduled()
            .map_err(CoordinatorError::Scheduler)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_test(self.config.match_title_marker))
            .collect())
    }

    fn schedule(&self, content: NotificationContent, trigger: TriggerSpec) -> CoordinatorResult<String> {
        let title = content.title.clone();
        let identifier = self
            .scheduler
            .schedule(content, trigger)
            .map_err(CoordinatorError::Scheduler)?;
        debug!(%identifier, %title, ?trigger, "test notification scheduled");
        Ok(identifier)
    }

    fn read_counter(&self) -> CoordinatorResult<u32> {
        let key = &self.config.counter_key;
        match self.store.get(key).map_err(CoordinatorError::Store)? {
            None => Ok(0),
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| CoordinatorError::CorruptCounter {
                    key: key.clone(),
                    value,
                }),
        }
    }

    // Read-then-write: two interleaved callers can both observe the same
    // value. Only one device and one user drive this counter.
    fn increment_counter(&self) -> CoordinatorResult<u32> {
        let next = self.read_counter()?.saturating_add(1);
        self.store
            .set(&self.config.counter_key, &next.to_string())
            .map_err(CoordinatorError::Store)?;
        Ok(next)
    }

    fn display_name<'a>(&'a self, user_name: &'a str) -> &'a str {
        let trimmed = user_name.trim();
        if trimmed.is_empty() {
            self.config.default_user_name.as_str()
        } else {
            trimmed
        }
    }

    fn offset(at: DateTime<Utc>, seconds: u64) -> CoordinatorResult<DateTime<Utc>> {
        add_seconds(at, seconds).ok_or_else(|| {
            CoordinatorError::Scheduler(anyhow!("fire time {seconds}s after {at} is out of range"))
        })
    }

    fn view(entry: &ScheduledNotification) -> TestNotificationView {
        let fires_at = entry.fire_time();
        TestNotificationView {
            identifier: entry.identifier.clone(),
            title: entry.content.title.clone(),
            test_id: entry.content.data.test_id.clone(),
            category: entry.content.data.kind.clone(),
            trigger: entry.trigger,
            fires_at,
            fire_label: alert::fire_label(fires_at, &entry.trigger),
        }
    }

    /// Policy refusals are expected; collaborator failures are not.
    fn log_failure(err: &CoordinatorError, message: &str) {
        if err.is_transient() {
            error!(%err, "{message}");
        } else {
            warn!(%err, "{message}");
        }
    }

    fn present(&self, alert: Alert) {
        if let Some(presenter) = &self.presenter {
            presenter.present(&alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingPresenter;
    use crate::memory::{MemoryScheduler, MemoryStore};
    use crate::notifications::PermissionState;
    use chrono::TimeZone;

    struct Fixture {
        scheduler: Arc<MemoryScheduler>,
        store: Arc<MemoryStore>,
        alerts: RecordingPresenter,
        coordinator: NotificationTestCoordinator,
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 14, 7, 30, 0).unwrap()
    }

    fn fixture_with(scheduler: MemoryScheduler) -> Fixture {
        let scheduler = Arc::new(scheduler);
        let store = Arc::new(MemoryStore::new());
        let alerts = RecordingPresenter::default();
        let coordinator = NotificationTestCoordinator::builder()
            .with_scheduler(scheduler.clone())
            .with_store(store.clone())
            .with_presenter(Box::new(alerts.clone()))
            .with_clock(fixed_now)
            .build()
            .expect("build coordinator");
        Fixture {
            scheduler,
            store,
            alerts,
            coordinator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryScheduler::new())
    }

    #[test]
    fn builder_requires_collaborators() {
        assert!(NotificationTestCoordinator::builder().build().is_err());
        assert!(NotificationTestCoordinator::builder()
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .is_err());
    }

    #[test]
    fn full_test_schedules_two_one_shot_notifications() {
        let fx = fixture();
        let outcome = fx.coordinator.schedule_full_test("user-42", "Awa");
        let FullTestOutcome::Scheduled(schedule) = outcome else {
            panic!("expected scheduled outcome, got {outcome:?}");
        };

        assert_eq!(schedule.daily_at, fixed_now() + chrono::Duration::seconds(300));
        assert_eq!(
            schedule.weather_at,
            schedule.daily_at + chrono::Duration::seconds(30)
        );

        let scheduled = fx.scheduler.scheduled();
        assert_eq!(scheduled.len(), 2);
        assert_eq!(scheduled[0].trigger, TriggerSpec::at(schedule.daily_at));
        assert_eq!(scheduled[0].content.data.kind.as_deref(), Some("daily_test"));
        assert!(scheduled[0].content.body.contains("Awa"));
        assert_eq!(scheduled[1].content.data.kind.as_deref(), Some("weather_test"));
        for entry in &scheduled {
            assert_eq!(entry.content.data.one_time, Some(true));
            assert!(entry.content.title.contains("TEST"));
            assert!(entry.content.data.has_test_id());
        }
        assert_ne!(scheduled[0].content.data.test_id, scheduled[1].content.data.test_id);
        assert_eq!(fx.scheduler.registered_users(), vec!["user-42".to_string()]);
        assert_eq!(fx.alerts.alerts().len(), 1);
    }

    #[test]
    fn full_test_uses_placeholder_name() {
        let fx = fixture();
        assert!(fx.coordinator.schedule_full_test("user-42", "  ").is_success());
        assert!(fx.scheduler.scheduled()[0].content.body.contains("Agriculteur"));
    }

    #[test]
    fn full_test_aborts_without_permission() {
        let fx = fixture_with(MemoryScheduler::with_permission(PermissionState::Denied));
        let outcome = fx.coordinator.schedule_full_test("user-42", "Awa");
        assert_eq!(outcome, FullTestOutcome::PermissionDenied);
        assert!(fx.scheduler.scheduled().is_empty());
        assert!(fx.scheduler.registered_users().is_empty());
    }

    #[test]
    fn full_test_aborts_when_permission_request_is_refused() {
        let fx = fixture_with(MemoryScheduler::new().refuse_requests());
        let outcome = fx.coordinator.schedule_full_test("user-42", "Awa");
        assert_eq!(outcome, FullTestOutcome::PermissionDenied);
        assert!(fx.scheduler.scheduled().is_empty());
        assert!(fx.scheduler.registered_users().is_empty());
        assert_eq!(
            fx.scheduler.permission_status().unwrap(),
            PermissionState::Denied
        );
        assert_eq!(fx.alerts.last().expect("alert").title, "Permission refusée");
    }

    #[test]
    fn weather_offset_ignores_environment_style_overrides() {
        let config = CoordinatorConfig::from_lookup(|name| match name {
            "AGRI_WEATHER_OFFSET_SECS" => Some("600".to_string()),
            "AGRI_TEST_QUOTA" => Some("9".to_string()),
            _ => None,
        })
        .unwrap();
        let scheduler = Arc::new(MemoryScheduler::new());
        let coordinator = NotificationTestCoordinator::builder()
            .with_scheduler(scheduler.clone())
            .with_store(Arc::new(MemoryStore::new()))
            .with_config(config)
            .with_clock(fixed_now)
            .build()
            .expect("build coordinator");

        let FullTestOutcome::Scheduled(schedule) = coordinator.schedule_full_test("u", "") else {
            panic!("full test should schedule");
        };
        assert_eq!(
            schedule.weather_at - schedule.daily_at,
            chrono::Duration::seconds(30)
        );
        assert!(coordinator.schedule_immediate_test("").is_success());
        assert_eq!(
            coordinator.schedule_immediate_test(""),
            ImmediateTestOutcome::LimitReached { max: 2 }
        );
    }

    #[test]
    fn listing_reports_resolved_fire_times() {
        let fx = fixture();
        fx.coordinator.schedule_full_test("user-42", "Awa");
        let views = fx.coordinator.list_scheduled_tests();
        assert_eq!(views.len(), 2);
        let daily_at = fixed_now() + chrono::Duration::seconds(300);
        assert_eq!(views[0].fires_at, Some(daily_at));
        assert_eq!(views[0].fire_label, alert::fire_label(Some(daily_at), &views[0].trigger));
    }

    #[test]
    fn full_test_rejects_empty_user_id() {
        let fx = fixture();
        let outcome = fx.coordinator.schedule_full_test("", "Awa");
        assert!(matches!(outcome, FullTestOutcome::Failed { .. }));
        assert_eq!(
            fx.scheduler.permission_status().unwrap(),
            PermissionState::Undetermined
        );
    }

    #[test]
    fn full_test_reports_scheduler_failure() {
        let fx = fixture();
        fx.scheduler.fail_scheduling_after(1);
        let outcome = fx.coordinator.schedule_full_test("user-42", "Awa");
        assert!(matches!(outcome, FullTestOutcome::Failed { .. }));
    }

    #[test]
    fn immediate_test_walks_the_quota() {
        let fx = fixture();
        let first = fx.coordinator.schedule_immediate_test("Awa");
        assert_eq!(
            first,
            ImmediateTestOutcome::Scheduled {
                scheduled: 2,
                sent: 2,
                remaining: 0,
                max: 2
            }
        );
        let scheduled = fx.scheduler.scheduled();
        assert_eq!(scheduled[0].trigger, TriggerSpec::after(10));
        assert_eq!(scheduled[1].trigger, TriggerSpec::after(40));
        assert!(scheduled[0].content.title.contains("1/2"));
        assert!(scheduled[1].content.title.contains("2/2"));
        assert_eq!(scheduled[1].content.data.notification_number, Some(2));

        let second = fx.coordinator.schedule_immediate_test("Awa");
        assert_eq!(second, ImmediateTestOutcome::LimitReached { max: 2 });
        assert_eq!(fx.scheduler.scheduled().len(), 2);
        assert_eq!(
            fx.store.get("test_notification_count").unwrap().as_deref(),
            Some("2")
        );
    }

    #[test]
    fn immediate_test_from_one_schedules_single_notification() {
        let fx = fixture();
        fx.store.set("test_notification_count", "1").unwrap();
        let outcome = fx.coordinator.schedule_immediate_test("Awa");
        assert_eq!(outcome.remaining(), 0);
        assert!(matches!(
            outcome,
            ImmediateTestOutcome::Scheduled { scheduled: 1, sent: 2, .. }
        ));
        let scheduled = fx.scheduler.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert!(scheduled[0].content.title.contains("2/2"));
    }

    #[test]
    fn counter_tracks_only_scheduled_notifications() {
        let fx = fixture();
        fx.scheduler.fail_scheduling_after(1);
        let outcome = fx.coordinator.schedule_immediate_test("Awa");
        assert!(matches!(
            outcome,
            ImmediateTestOutcome::Failed { scheduled: 1, .. }
        ));
        assert_eq!(
            fx.store.get("test_notification_count").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn corrupt_counter_fails_without_scheduling() {
        let fx = fixture();
        fx.store.set("test_notification_count", "many").unwrap();
        let outcome = fx.coordinator.schedule_immediate_test("Awa");
        assert!(matches!(
            outcome,
            ImmediateTestOutcome::Failed { scheduled: 0, .. }
        ));
        assert!(fx.scheduler.scheduled().is_empty());
    }

    #[test]
    fn listing_failure_yields_empty_results() {
        let fx = fixture();
        fx.coordinator.schedule_immediate_test("Awa");
        fx.scheduler.set_fail_listing(true);
        assert!(fx.coordinator.list_scheduled_tests().is_empty());
        assert_eq!(fx.coordinator.cancel_all_tests(), 0);
    }

    #[test]
    fn status_and_reset_survive_store_failure() {
        let fx = fixture();
        fx.store.set_failing(true);
        assert_eq!(fx.coordinator.check_permission_status(), None);
        assert!(!fx.coordinator.reset_counter());
        fx.store.set_failing(false);
        assert!(fx.coordinator.reset_counter());
        assert_eq!(fx.alerts.alerts().len(), 3);
    }

    #[test]
    fn reset_is_idempotent() {
        let fx = fixture();
        fx.coordinator.schedule_immediate_test("Awa");
        assert!(fx.coordinator.reset_counter());
        assert!(fx.coordinator.reset_counter());
        let report = fx.coordinator.check_permission_status().expect("status");
        assert_eq!(report.sent, 0);
        assert_eq!(report.remaining, 2);
    }
}
