use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{ActuatorError, CommandError, InspectError, MovementError};

/// Structured tool-layer failure. The process keeps running after any of these.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "isError": true,
            "error": {
                "code": self.code,
                "message": format!("Error: {}", self.message),
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<ActuatorError> for ApiError {
    fn from(err: ActuatorError) -> Self {
        let (status, code) = match &err {
            ActuatorError::Rejected { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "COMMAND_REJECTED"),
            ActuatorError::Failed { .. } => (StatusCode::BAD_GATEWAY, "COMMAND_FAILED"),
            ActuatorError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "BOT_UNREACHABLE"),
            ActuatorError::Protocol(_) => (StatusCode::BAD_GATEWAY, "BOT_PROTOCOL"),
        };
        ApiError::new(status, code, err.to_string())
    }
}

impl From<MovementError> for ApiError {
    fn from(err: MovementError) -> Self {
        match err {
            MovementError::InvalidRequest(_) => ApiError::new(StatusCode::BAD_REQUEST, "INVALID_MOVEMENT", err.to_string()),
            MovementError::Busy => ApiError::new(StatusCode::CONFLICT, "MOVEMENT_BUSY", err.to_string()),
            MovementError::Actuator(inner) => inner.into(),
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::InvalidEntityId(_) | CommandError::InvalidParameter { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_PARAMETER", err.to_string())
            }
            CommandError::EntityNotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "ENTITY_NOT_FOUND", err.to_string()),
            CommandError::TargetTooFar { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "TARGET_TOO_FAR", err.to_string())
            }
            CommandError::Movement(inner) => inner.into(),
            CommandError::Actuator(inner) => inner.into(),
        }
    }
}

impl From<InspectError> for ApiError {
    fn from(err: InspectError) -> Self {
        let (status, code) = match &err {
            InspectError::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STATE_ENCODING"),
            InspectError::NotAllowed { .. } => (StatusCode::BAD_REQUEST, "PROPERTY_NOT_ALLOWED"),
            _ => (StatusCode::BAD_REQUEST, "PROPERTY_PATH"),
        };
        ApiError::new(status, code, err.to_string())
    }
}
