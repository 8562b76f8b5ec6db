use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Poll not found: {0}")]
    PollNotFound(String),

    #[error("Invalid option '{option_id}' for poll {poll_id}")]
    InvalidOption { poll_id: String, option_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Poll already exists: {0}")]
    PollExists(String),

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl VoteError {
    /// Caller mistakes, as opposed to faults on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VoteError::PollNotFound(_)
                | VoteError::InvalidOption { .. }
                | VoteError::InvalidInput(_)
                | VoteError::PollExists(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;

pub(crate) fn lock_poisoned(err: impl std::fmt::Display) -> VoteError {
    VoteError::InconsistentState(format!("lock poisoned: {err}"))
}
