use actix_web::error::{BlockingError, InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use serde_repr::Serialize_repr;
use thiserror::Error;

/// Machine-readable error class carried alongside the human-readable
/// message in every error body.
#[derive(Serialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    BadRequest = 1,
    Unauthorized = 2,
    NotFound = 3,
    Conflict = 4,
    Internal = 5,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error("connection pool exhausted")]
    Pool(#[from] r2d2::Error),

    #[error("blocking task canceled")]
    Canceled(#[from] BlockingError),

    #[error("password hashing failed")]
    PasswordHash,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// Rewrites a unique-constraint violation into a Conflict carrying the
    /// given message; every other error passes through untouched.
    pub fn unique_violation_as_conflict(self, message: &str) -> Self {
        match self {
            ApiError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => ApiError::Conflict(message.to_owned()),
            other => other,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) => ErrorCode::BadRequest,
            ApiError::Unauthorized | ApiError::InvalidCredentials => ErrorCode::Unauthorized,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Database(_)
            | ApiError::Pool(_)
            | ApiError::Canceled(_)
            | ApiError::PasswordHash => ErrorCode::Internal,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: ErrorCode,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_)
            | ApiError::Pool(_)
            | ApiError::Canceled(_)
            | ApiError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.code();
        let message = if code == ErrorCode::Internal {
            log::error!("request failed: {}", self);
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: &message,
            code,
        })
    }
}

/// Replaces actix's default JSON deserialization error with the same body
/// shape every other client error uses.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = ApiError::bad_request("Invalid JSON").error_response();
    InternalError::from_response(err, response).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_classes() {
        assert_eq!(
            ApiError::bad_request("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("Subject").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("taken".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Database(diesel::result::Error::NotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_read_like_responses() {
        assert_eq!(
            ApiError::NotFound("Subject").to_string(),
            "Subject not found"
        );
        assert_eq!(ApiError::Unauthorized.to_string(), "Authentication required");
    }

    #[test]
    fn error_codes_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&ErrorCode::Conflict).unwrap(), "4");
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let violation = ApiError::Database(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_owned()),
        ));
        let mapped = violation.unique_violation_as_conflict("Email already registered");
        assert!(matches!(mapped, ApiError::Conflict(ref msg) if msg == "Email already registered"));

        let not_found = ApiError::NotFound("Subject");
        assert!(matches!(
            not_found.unique_violation_as_conflict("nope"),
            ApiError::NotFound("Subject")
        ));
    }
}
