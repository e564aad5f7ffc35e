//! Typed errors and HTTP status mapping. Rendering is per flavor (see `flavor`).

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("unknown column '{column}' on resource {resource}")]
    UnknownColumn { resource: String, column: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid date format '{0}'. Supported formats: DD-MM-YYYY, YYYY-MM-DD, DD/MM/YYYY, YYYY/MM/DD")]
    InvalidDateFormat(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    /// Lookup miss with the message clients see.
    pub fn resource_not_found() -> Self {
        AppError::NotFound("Resource not found".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidDateFormat(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(e) if is_data_exception(e) => StatusCode::BAD_REQUEST,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidDateFormat(_) => "invalid_date_format",
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Db(sqlx::Error::RowNotFound) => "not_found",
            AppError::Db(e) if is_data_exception(e) => "bad_request",
            AppError::Db(_) => "database_error",
        }
    }
}

/// SQLSTATE class 22: a bound value the column type rejects (bad cast, impossible date).
fn is_data_exception(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().is_some_and(|c| c.starts_with("22")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(AppError::resource_not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidDateFormat("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Validation("page".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Db(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Config(ConfigError::Load("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[derive(Debug)]
    struct PgStateError(&'static str);

    impl std::fmt::Display for PgStateError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl std::error::Error for PgStateError {}

    impl sqlx::error::DatabaseError for PgStateError {
        fn message(&self) -> &str {
            "invalid input"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
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
            sqlx::error::ErrorKind::Other
        }
    }

    fn db_error(state: &'static str) -> AppError {
        AppError::Db(sqlx::Error::Database(Box::new(PgStateError(state))))
    }

    #[test]
    fn rejected_bound_values_are_client_errors() {
        // invalid_text_representation, datetime_field_overflow
        for state in ["22P02", "22008"] {
            assert_eq!(db_error(state).status(), StatusCode::BAD_REQUEST, "{state}");
            assert_eq!(db_error(state).code(), "bad_request");
        }
        // unique_violation stays a server fault
        assert_eq!(db_error("23505").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(db_error("23505").code(), "database_error");
    }

    #[test]
    fn not_found_message_is_client_facing() {
        assert_eq!(AppError::resource_not_found().to_string(), "Resource not found");
    }
}
