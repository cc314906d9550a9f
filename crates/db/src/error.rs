use stockpile_core::error::CoreError;

/// Error returned by job stores and entity registries.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify a sqlx error raised by a write.
    ///
    /// - Unique violations (`23505`) become [`StoreError::Conflict`].
    /// - Foreign key violations (`23503`) become [`StoreError::Validation`].
    /// - Everything else stays a database error.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => return Self::Conflict(db_err.message().to_string()),
                Some("23503") => return Self::Validation(db_err.message().to_string()),
                _ => {}
            }
        }
        Self::Database(err)
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::Validation(msg) => CoreError::Validation(msg),
            StoreError::Database(e) => CoreError::Internal(e.to_string()),
        }
    }
}
