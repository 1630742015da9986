use thiserror::Error;

/// Every failure a follow operation can surface. None of them leave a partial
/// write behind.
#[derive(Debug, Error)]
pub enum FollowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    /// Same-pair contention outlasted the lock budget. Safe to retry.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FollowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// 55P03 lock_not_available, 40001 serialization_failure, 40P01 deadlock_detected
const CONTENTION_CODES: [&str; 3] = ["55P03", "40001", "40P01"];

impl From<sqlx::Error> for FollowError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if CONTENTION_CODES.contains(&code.as_ref()) {
                    return Self::conflict("relationship is being modified, retry");
                }
            }
        }
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return Self::conflict("timed out waiting for a database connection");
        }
        Self::Internal(err.into())
    }
}

pub type FollowResult<T> = std::result::Result<T, FollowError>;
