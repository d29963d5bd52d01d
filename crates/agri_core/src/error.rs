use thiserror::Error;

/// Failures an operation can hit before its boundary turns them into an
/// outcome value.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("a user id is required")]
    InvalidUser,

    #[error("notification permission was refused")]
    PermissionDenied,

    #[error("test quota of {max} notifications reached")]
    QuotaExceeded { max: u32 },

    #[error("scheduler error: {0:#}")]
    Scheduler(anyhow::Error),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error("counter `{key}` holds unreadable value `{value}`")]
    CorruptCounter { key: String, value: String },
}

impl CoordinatorError {
    /// Errors caused by a collaborator rather than by policy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Scheduler(_)
                | CoordinatorError::Store(_)
                | CoordinatorError::CorruptCounter { .. }
        )
    }
}

pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
