//! Domain error taxonomy shared by the library, registry, scheduler and cost engine.

use thiserror::Error;

use crate::db::DbError;
use crate::models::UnknownVariant;

/// Errors surfaced by core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Database(DbError::Sqlite(e))
    }
}

impl From<UnknownVariant> for CoreError {
    fn from(e: UnknownVariant) -> Self {
        CoreError::validation(e.kind, e.to_string())
    }
}

// =========================================================================
// Input validation helpers
// =========================================================================

pub(crate) fn require_non_empty(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Finite and non-negative.
pub(crate) fn require_cost(field: &str, value: f64) -> CoreResult<()> {
    if !value.is_finite() {
        return Err(CoreError::validation(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(CoreError::validation(field, format!("must be >= 0, got {}", value)));
    }
    Ok(())
}

/// ISO calendar date (YYYY-MM-DD).
pub(crate) fn require_date(field: &str, value: Option<&str>) -> CoreResult<Option<chrono::NaiveDate>> {
    value
        .map(|v| {
            chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                CoreError::validation(field, format!("expected YYYY-MM-DD, got '{}'", v))
            })
        })
        .transpose()
}
