use std::path::PathBuf;
use std::sync::Arc;

use agri_core::alert::{Alert, AlertPresenter};
use agri_core::notifications::PermissionState;
use agri_core::store::JsonFileStore;
use agri_core::{CoordinatorConfig, NotificationTestCoordinator};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::outbox::OutboxScheduler;

#[derive(Debug, Parser)]
#[command(name = "agri_notify", about = "Notification self-test for the advisory app")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Schedule the daily crop reminder and the weather alert
    FullTest {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = "")]
        user_name: String,
    },
    /// Schedule quota-limited irrigation test notifications
    ImmediateTest {
        #[arg(long, default_value = "")]
        user_name: String,
    },
    /// List pending test notifications
    List,
    /// Cancel every pending test notification
    Cancel,
    /// Show permission and quota usage
    Status,
    /// Reset the test quota counter
    Reset,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) state_dir: PathBuf,
    pub(crate) permission: Option<PermissionState>,
    pub(crate) coordinator: CoordinatorConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("AGRI_STATE_DIR") {
            if !dir.trim().is_empty() {
                config.state_dir = PathBuf::from(dir);
            }
        }
        if let Ok(permission) = std::env::var("AGRI_PERMISSION") {
            match permission.parse::<PermissionState>() {
                Ok(value) => config.permission = Some(value),
                Err(err) => warn!(%err, "ignoring AGRI_PERMISSION"),
            }
        }
        config.coordinator = CoordinatorConfig::from_env()?;
        Ok(config)
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_permission(mut self, permission: PermissionState) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("store.json")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.state_dir.join("outbox.json")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".agri-notify"),
            permission: None,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Prints alerts the way a dialog would show them.
pub struct TerminalPresenter;

impl AlertPresenter for TerminalPresenter {
    fn present(&self, alert: &Alert) {
        println!("== {} ==\n{}", alert.title, alert.message);
    }
}

pub fn build_coordinator(
    config: &AppConfig,
    presenter: Option<Box<dyn AlertPresenter>>,
) -> Result<NotificationTestCoordinator> {
    let scheduler = OutboxScheduler::open(config.outbox_path(), config.permission)
        .context("failed to open notification outbox")?;
    let store = JsonFileStore::open(config.store_path()).context("failed to open store")?;
    let mut builder = NotificationTestCoordinator::builder()
        .with_scheduler(Arc::new(scheduler))
        .with_store(Arc::new(store))
        .with_config(config.coordinator.clone());
    if let Some(presenter) = presenter {
        builder = builder.with_presenter(presenter);
    }
    builder.build()
}

/// Runs one command. Returns whether the operation succeeded.
pub fn execute(coordinator: &NotificationTestCoordinator, command: &Command) -> bool {
    match command {
        Command::FullTest { user_id, user_name } => {
            coordinator.schedule_full_test(user_id, user_name).is_success()
        }
        Command::ImmediateTest { user_name } => {
            coordinator.schedule_immediate_test(user_name).is_success()
        }
        Command::List => {
            coordinator.list_scheduled_tests();
            true
        }
        Command::Cancel => {
            coordinator.cancel_all_tests();
            true
        }
        Command::Status => coordinator.check_permission_status().is_some(),
        Command::Reset => coordinator.reset_counter(),
    }
}

pub fn run(config: AppConfig, command: Command) -> Result<()> {
    info!(state_dir = %config.state_dir.display(), ?command, "running notification self-test");
    let coordinator = build_coordinator(&config, Some(Box::new(TerminalPresenter)))?;
    if !execute(&coordinator, &command) {
        warn!(?command, "operation did not succeed");
    }
    Ok(())
}
