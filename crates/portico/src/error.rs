//! Dispatch outcomes that are not content.

use crate::db::DbError;
use axum::http::StatusCode;

/// Why an action produced no content
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Unmatched route, unknown controller or unknown action
    #[error("{0}")]
    NotFound(String),

    /// The action requires a signed-in session
    #[error("this action requires authentication")]
    Unauthorized,

    /// A collaborator (database, view) failed
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// What every action returns: the response body, or why there is none
pub type ActionResult = Result<String, DispatchError>;

impl DispatchError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        DispatchError::NotFound(detail.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DispatchError::Unauthorized)
    }

    /// Status code and reason phrase this outcome is sent with
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            DispatchError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            DispatchError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            DispatchError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl From<DbError> for DispatchError {
    fn from(err: DbError) -> Self {
        DispatchError::Internal(err.into())
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        DispatchError::Internal(err.into())
    }
}
