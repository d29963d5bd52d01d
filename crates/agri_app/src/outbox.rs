//! Desktop stand-in for the platform notification scheduler. Pending
//! notifications live in a JSON file so separate invocations of the CLI see
//! the same schedule.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use agri_core::notifications::{
    NotificationContent, NotificationScheduler, PermissionState, ScheduledNotification,
    TriggerSpec,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct OutboxState {
    permission: Option<PermissionState>,
    next_id: u64,
    push_tokens: BTreeMap<String, String>,
    /// Every entry carries the `fires_at` resolved when it was scheduled.
    pending: Vec<ScheduledNotification>,
}

pub struct OutboxScheduler {
    path: PathBuf,
    state: Mutex<OutboxState>,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl OutboxScheduler {
    /// Opens the outbox at `path`. A `permission` override replaces whatever
    /// the file recorded.
    pub fn open(path: impl AsRef<Path>, permission: Option<PermissionState>) -> Result<Self> {
        Self::open_with_clock(path, permission, Utc::now)
    }

    pub fn open_with_clock(
        path: impl AsRef<Path>,
        permission: Option<PermissionState>,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state: OutboxState = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read outbox {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("outbox {} is corrupt", path.display()))?
        } else {
            OutboxState::default()
        };
        if permission.is_some() {
            state.permission = permission;
        }
        Ok(Self {
            path,
            state: Mutex::new(state),
            clock: Box::new(clock),
        })
    }

    /// Drops entries whose fire time has passed. Returns how many went.
    fn deliver_due(&self, state: &mut OutboxState) -> usize {
        let now = (self.clock)();
        let before = state.pending.len();
        state.pending.retain(|entry| {
            if entry.fires_at.is_some_and(|at| at <= now) {
                info!(
                    identifier = %entry.identifier,
                    title = %entry.content.title,
                    "notification delivered"
                );
                false
            } else {
                true
            }
        });
        before - state.pending.len()
    }

    fn save(&self, state: &OutboxState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("failed to write outbox {}", self.path.display()))
    }
}

impl NotificationScheduler for OutboxScheduler {
    fn request_permissions(&self) -> Result<bool> {
        let mut state = self.state.lock();
        let permission = match state.permission {
            Some(PermissionState::Denied) => PermissionState::Denied,
            _ => PermissionState::Granted,
        };
        state.permission = Some(permission);
        self.save(&state)?;
        Ok(permission == PermissionState::Granted)
    }

    fn permission_status(&self) -> Result<PermissionState> {
        Ok(self
            .state
            .lock()
            .permission
            .unwrap_or(PermissionState::Undetermined))
    }

    fn register_for_push(&self, user_id: &str) -> Result<String> {
        let mut state = self.state.lock();
        if let Some(token) = state.push_tokens.get(user_id) {
            return Ok(token.clone());
        }
        let token = format!("outbox-push-{user_id}");
        state
            .push_tokens
            .insert(user_id.to_string(), token.clone());
        self.save(&state)?;
        debug!(user_id, %token, "registered push token");
        Ok(token)
    }

    fn schedule(&self, content: NotificationContent, trigger: TriggerSpec) -> Result<String> {
        let mut state = self.state.lock();
        let fires_at = trigger
            .resolve((self.clock)())
            .ok_or_else(|| anyhow!("trigger {trigger:?} is out of range"))?;
        state.next_id += 1;
        let identifier = format!("outbox-{}", state.next_id);
        state.pending.push(ScheduledNotification {
            identifier: identifier.clone(),
            content,
            trigger,
            fires_at: Some(fires_at),
        });
        self.save(&state)?;
        Ok(identifier)
    }

    fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        let mut state = self.state.lock();
        if self.deliver_due(&mut state) > 0 {
            self.save(&state)?;
        }
        Ok(state.pending.clone())
    }

    fn cancel(&self, identifier: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state
            .pending
            .retain(|entry| entry.identifier != identifier);
        if state.pending.len() == before {
            return Err(anyhow!("no pending notification `{identifier}`"));
        }
        self.save(&state)
    }
}
