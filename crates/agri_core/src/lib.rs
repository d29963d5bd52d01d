pub mod alert;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod notifications;
pub mod store;

pub use crate::config::CoordinatorConfig;
pub use crate::coordinator::{NotificationTestCoordinator, NotificationTestCoordinatorBuilder};
