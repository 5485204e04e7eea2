use salvo::prelude::*;
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;
use crate::db::{DatabaseError, ValidationError};
use crate::discord::PlatformError;
use crate::relay::RelayError;
use crate::toggles::ToggleError;

pub fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}

/// A failure already mapped to the status and message the client sees.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn render(self, res: &mut Response) {
        render_error(res, self.status, &self.message);
    }
}

/// Renders `Ok` as JSON with the status already on the response.
pub fn respond<T: serde::Serialize + Send>(res: &mut Response, result: ApiResult<T>) {
    match result {
        Ok(body) => res.render(Json(body)),
        Err(err) => err.render(res),
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UnknownTicket(id) => Self::not_found(format!("ticket {id} not found")),
            DatabaseError::UnknownCategory(id) => {
                Self::not_found(format!("category {id} not found"))
            }
            DatabaseError::UnknownPanel(id) => Self::not_found(format!("panel {id} not found")),
            DatabaseError::DuplicateTicketNumber(number) => Self::new(
                StatusCode::CONFLICT,
                format!("ticket number {number} already exists"),
            ),
            other => {
                error!("database failure: {}", other);
                Self::internal("database error")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.0)
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Validation(err) => err.into(),
            RelayError::Database(err) => err.into(),
        }
    }
}

impl From<ToggleError> for ApiError {
    fn from(err: ToggleError) -> Self {
        match err {
            ToggleError::UnknownSubsystem(name) => {
                Self::not_found(format!("unknown subsystem {name:?}"))
            }
            ToggleError::Storage(detail) => {
                error!("toggle storage failure: {}", detail);
                Self::internal("toggle storage error")
            }
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::MissingChannel(_) | PlatformError::InvalidId(_) => {
                Self::bad_request(err.to_string())
            }
            PlatformError::Timeout(_) | PlatformError::Api(_) => {
                error!("discord failure: {}", err);
                Self::new(StatusCode::BAD_GATEWAY, "discord request failed")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Provider {
                stage,
                status,
                body,
            } => {
                error!(
                    "identity provider failure stage={} status={:?} body={}",
                    stage, status, body
                );
                Self::new(StatusCode::BAD_GATEWAY, "identity provider error")
            }
            AuthError::AccessDenied { .. } => Self::new(StatusCode::FORBIDDEN, "access denied"),
            AuthError::MissingCode | AuthError::InvalidState => Self::bad_request(err.to_string()),
        }
    }
}
