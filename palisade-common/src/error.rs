use std::error::Error;

#[derive(thiserror::Error, Debug)]
pub enum PalisadeError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),
    #[error("database query timed out")]
    StoreTimeout,
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("role {0} not found")]
    RoleNotFound(String),
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("inconsistent state error")]
    InconsistentState,
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PalisadeError {
    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<sea_orm::TransactionError<PalisadeError>> for PalisadeError {
    fn from(err: sea_orm::TransactionError<PalisadeError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => e.into(),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}
