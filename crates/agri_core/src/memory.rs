//! In-process collaborators. Useful as substitutes for the platform
//! scheduler and storage in tests and previews.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use parking_lot::RwLock;

use crate::notifications::{
    NotificationContent, NotificationScheduler, PermissionState, ScheduledNotification,
    TriggerSpec,
};
use crate::store::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.write().remove(key);
        Ok(())
    }
}

#[derive(Debug)]
struct SchedulerState {
    permission: PermissionState,
    grant_on_request: bool,
    scheduled: Vec<ScheduledNotification>,
    push_tokens: HashMap<String, String>,
    next_id: u64,
    /// Remaining successful `schedule` calls before failures start.
    schedule_budget: Option<usize>,
    fail_listing: bool,
}

/// Scheduler that keeps pending notifications in memory and never fires them.
#[derive(Debug)]
pub struct MemoryScheduler {
    state: RwLock<SchedulerState>,
}

impl Default for MemoryScheduler {
    fn default() -> Self {
        Self::with_permission(PermissionState::Undetermined)
    }
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts in `permission`. An undetermined permission is granted on
    /// request; an explicit denial stays denied.
    pub fn with_permission(permission: PermissionState) -> Self {
        Self {
            state: RwLock::new(SchedulerState {
                permission,
                grant_on_request: true,
                scheduled: Vec::new(),
                push_tokens: HashMap::new(),
                next_id: 1,
                schedule_budget: None,
                fail_listing: false,
            }),
        }
    }

    /// Makes an undetermined permission resolve to denied on request.
    pub fn refuse_requests(self) -> Self {
        self.state.write().grant_on_request = false;
        self
    }

    /// Lets `count` more `schedule` calls succeed; later ones fail.
    pub fn fail_scheduling_after(&self, count: usize) {
        self.state.write().schedule_budget = Some(count);
    }

    pub fn set_fail_listing(&self, failing: bool) {
        self.state.write().fail_listing = failing;
    }

    pub fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.state.read().scheduled.clone()
    }

    pub fn registered_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.state.read().push_tokens.keys().cloned().collect();
        users.sort();
        users
    }
}

impl NotificationScheduler for MemoryScheduler {
    fn request_permissions(&self) -> Result<bool> {
        let mut state = self.state.write();
        if state.permission == PermissionState::Undetermined {
            state.permission = if state.grant_on_request {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        Ok(state.permission == PermissionState::Granted)
    }

    fn permission_status(&self) -> Result<PermissionState> {
        Ok(self.state.read().permission)
    }

    fn register_for_push(&self, user_id: &str) -> Result<String> {
        let mut state = self.state.write();
        let token = state
            .push_tokens
            .entry(user_id.to_string())
            .or_insert_with(|| format!("memory-push-{user_id}"));
        Ok(token.clone())
    }

    fn schedule(&self, content: NotificationContent, trigger: TriggerSpec) -> Result<String> {
        let mut state = self.state.write();
        if let Some(budget) = state.schedule_budget.as_mut() {
            if *budget == 0 {
                bail!("scheduler rejected `{}`", content.title);
            }
            *budget -= 1;
        }
        let identifier = format!("memory-{}", state.next_id);
        state.next_id += 1;
        state.scheduled.push(ScheduledNotification {
            identifier: identifier.clone(),
            content,
            trigger,
            fires_at: trigger.resolve(Utc::now()),
        });
        Ok(identifier)
    }

    fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        let state = self.state.read();
        if state.fail_listing {
            bail!("scheduler listing unavailable");
        }
        Ok(state.scheduled.clone())
    }

    fn cancel(&self, identifier: &str) -> Result<()> {
        let mut state = self.state.write();
        let before = state.scheduled.len();
        state.scheduled.retain(|entry| entry.identifier != identifier);
        if state.scheduled.len() == before {
            return Err(anyhow!("no scheduled notification `{identifier}`"));
        }
        Ok(())
    }
}
