use sqlx::error::ErrorKind;

/// Errors surfaced by the record layer and repositories.
///
/// Callers match on the variant to tell a missing row from a constraint
/// conflict from any other storage failure. Nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Transaction is already finished")]
    TransactionClosed,

    #[error("Database operation timed out")]
    Timeout,

    #[error("Database operation was cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound { entity: "Row" },
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    Self::ConstraintViolation(db_err.message().to_string())
                }
                _ => Self::Database(err),
            },
            _ => Self::Database(err),
        }
    }
}
