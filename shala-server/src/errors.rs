use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use shala_core::EligibilityError;
use shala_studio::{AuthError, DatabaseError, StudioError};
use thiserror::Error;
use utoipa::ToSchema;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// A precondition of the studio does not hold
    #[error(transparent)]
    Rejected(EligibilityError),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{message}")]
    Invalid {
        location: &'static str,
        message: String,
    },
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin already exists")]
    AdminExists,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

/// The body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human readable description of the error
    message: String,
    /// Machine readable identifier of the error
    code: &'static str,
    /// The resource or input the error is about
    location: &'static str,
}

impl ServerError {
    pub fn invalid(location: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            location,
            message: message.into(),
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::AdminExists => StatusCode::CONFLICT,
            Self::Rejected(e) if e.is_forbidden() => StatusCode::FORBIDDEN,
            Self::Rejected(_) | Self::Invalid { .. } | Self::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Rejected(e) => e.code(),
            Self::Forbidden(_) => "forbidden",
            Self::Invalid { .. } => "invalid",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AdminExists => "admin_exists",
            Self::Unknown(_) => "internal",
        }
    }

    fn location(&self) -> &'static str {
        match self {
            Self::NotFound { resource, .. } | Self::Conflict { resource, .. } => *resource,
            Self::Rejected(e) => e.location(),
            Self::Invalid { location, .. } => *location,
            Self::Forbidden(_) | Self::AdminExists => "user",
            Self::Unauthorized(_) | Self::InvalidCredentials => "session",
            Self::Unknown(_) => "server",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
        }

        let body = ErrorBody {
            message: self.to_string(),
            code: self.code(),
            location: self.location(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AdminExists => Self::AdminExists,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            DatabaseError::Exhausted { resource, field } => {
                Self::invalid(resource, format!("{} has no {} left", resource, field))
            }
            DatabaseError::OutOfRange { resource, field } => {
                Self::invalid(resource, format!("{} {} would be out of range", resource, field))
            }
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<QueryRejection> for ServerError {
    fn from(value: QueryRejection) -> Self {
        Self::invalid("query", value.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(value: PathRejection) -> Self {
        Self::invalid("path", value.body_text())
    }
}

impl From<StudioError> for ServerError {
    fn from(value: StudioError) -> Self {
        match value {
            StudioError::Eligibility(e) => Self::Rejected(e),
            StudioError::Forbidden(message) => Self::Forbidden(message),
            StudioError::Invalid(message) => Self::invalid("body", message),
            StudioError::Db(e) => e.into(),
        }
    }
}
