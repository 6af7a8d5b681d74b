use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Every fallible operation in the service layer returns one of these.
/// Handlers surface them as a `{success, message}` JSON body; nothing here
/// crashes a request.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Clock-in attempted outside the branch geofence. Carries the measured
    /// distance so the caller can show how far off they are.
    #[error("You are too far from {branch}. You are {distance_m:.0}m away.")]
    TooFarAway { branch: String, distance_m: f64 },

    /// The payment gateway rejected the call or was unreachable. The message
    /// is the gateway's own when it supplied one.
    #[error("{0}")]
    Gateway(String),

    #[error("Internal server error")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::TooFarAway { .. } => StatusCode::FORBIDDEN,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ServiceError::Database(e) = self {
            tracing::error!(error = %e, "Database error");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

impl ServiceError {
    /// Translates a storage-level unique constraint violation into the
    /// conflict it represents; anything else stays a database error.
    pub fn on_unique(e: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return ServiceError::Conflict(conflict_message.to_string());
            }
        }
        ServiceError::Database(e)
    }
}
