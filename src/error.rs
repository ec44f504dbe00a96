use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Validation(errors) => format!("Invalid input: {errors}"),
            ApiError::Internal(_) | ApiError::Database(_) => "Internal Server Error".to_string(),
            ApiError::Token(_) => "Invalid or expired token".to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::Token(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(e) => tracing::error!(error = %e, "Database error"),
            ApiError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.public_message(),
        })
    }
}

/// MySQL reports duplicate keys as SQLSTATE 23000
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

/// Turns a duplicate-key failure into a 409 carrying `message`
pub fn conflict_on_duplicate<T>(result: Result<T, sqlx::Error>, message: &str) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if is_unique_violation(&e) => Err(ApiError::Conflict(message.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Guarded UPDATEs match zero rows once the row has left the expected state
pub fn ensure_transitioned(rows_affected: u64, message: &str) -> ApiResult<()> {
    if rows_affected == 0 {
        Err(ApiError::Conflict(message.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = body_of(ApiError::Conflict("Already checked in today".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Already checked in today");

        let (status, _) = body_of(ApiError::NotFound("Holiday not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = body_of(ApiError::Forbidden("Admin only".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn database_errors_are_not_leaked() {
        let (status, body) = body_of(ApiError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct FakeDbError {
        code: &'static str,
        message: &'static str,
    }

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError {
            code,
            message: "Duplicate entry '7-2026-03-02' for key 'uq_attendance_user_date'",
        }))
    }

    #[test]
    fn second_record_for_a_day_is_a_conflict() {
        let first: Result<u64, sqlx::Error> = Ok(41);
        assert_eq!(conflict_on_duplicate(first, "Already checked in today").unwrap(), 41);

        let second: Result<u64, sqlx::Error> = Err(db_error("23000"));
        match conflict_on_duplicate(second, "Already checked in today") {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "Already checked in today"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let result: Result<(), sqlx::Error> = Err(db_error("HY000"));
        assert!(matches!(
            conflict_on_duplicate(result, "duplicate"),
            Err(ApiError::Database(_))
        ));
    }

    #[test]
    fn guarded_update_that_matched_nothing_conflicts() {
        assert!(ensure_transitioned(1, "Leave request already processed").is_ok());
        assert!(matches!(
            ensure_transitioned(0, "Leave request already processed"),
            Err(ApiError::Conflict(msg)) if msg == "Leave request already processed"
        ));
    }

    #[test]
    fn display_includes_variant_prefix() {
        assert_eq!(
            ApiError::BadRequest("from_date after to_date".into()).to_string(),
            "Bad request: from_date after to_date"
        );
        assert_eq!(ApiError::Unauthorized("x".into()).to_string(), "Unauthorized: x");
    }
}
