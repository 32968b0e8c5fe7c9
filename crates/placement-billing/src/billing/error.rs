use axum::http::StatusCode;

use super::store::StoreError;

/// Error raised by the billing engine.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::Conflict(_) => StatusCode::CONFLICT,
            BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
