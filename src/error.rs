use std::collections::BTreeMap;

use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Constraint(String),

    #[error("Record not found")]
    RecordNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a datastore failure is surfaced to the caller.
struct DatabaseFailure {
    status: Status,
    code: &'static str,
    message: &'static str,
}

fn classify_database_error(err: &sqlx::Error) -> DatabaseFailure {
    fn failure(status: Status, code: &'static str, message: &'static str) -> DatabaseFailure {
        DatabaseFailure {
            status,
            code,
            message,
        }
    }

    match err {
        sqlx::Error::RowNotFound => failure(Status::NotFound, "RECORD_NOT_FOUND", "Record not found"),
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation => failure(
                Status::Conflict,
                "DUPLICATE_RECORD",
                "A record with this information already exists",
            ),
            ErrorKind::ForeignKeyViolation => failure(
                Status::BadRequest,
                "FOREIGN_KEY_CONSTRAINT",
                "Related record not found",
            ),
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                failure(Status::BadRequest, "INVALID_DATA", "Invalid data provided")
            }
            _ => failure(
                Status::InternalServerError,
                "DATABASE_ERROR",
                "Database operation failed",
            ),
        },
        _ => failure(
            Status::InternalServerError,
            "DATABASE_ERROR",
            "Database operation failed",
        ),
    }
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.to_string());
        AppError::Validation(errors)
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Unauthorized => {
                warn!(context = %ctx, "Unauthorized admin request");
                "authentication_error"
            }
            AppError::Validation(fields) => {
                warn!(fields = ?fields, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Constraint(msg) => {
                warn!(message = %msg, context = %ctx, "Constraint violation");
                "constraint_error"
            }
            AppError::RecordNotFound => {
                warn!(context = %ctx, "Record not found");
                "not_found_error"
            }
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if self.status_code().code >= 500 {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Unauthorized => Status::Unauthorized,
            AppError::Validation(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Constraint(_) => Status::BadRequest,
            AppError::RecordNotFound => Status::NotFound,
            AppError::Database(err) => classify_database_error(err).status,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Constraint(_) => "CONSTRAINT_VIOLATION",
            AppError::RecordNotFound => "RECORD_NOT_FOUND",
            AppError::Database(err) => classify_database_error(err).code,
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to hand back to the caller. Database and internal
    /// details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(err) => classify_database_error(err).message.to_string(),
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation(fields) => Some(json!({ "fieldErrors": fields })),
            AppError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .filter(|_| self.code() == "DATABASE_ERROR")
                .map(|code| json!({ "databaseCode": code })),
            _ => None,
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.log_and_record(&format!("Request to {} {}", req.method(), req.uri()));
        Custom(self.status_code(), Json(ApiResponse::<()>::failure(&self))).respond_to(req)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

/// Failure body for the public endpoints: a bare `{"error": "..."}`.
#[derive(Debug)]
pub struct PublicError {
    pub status: Status,
    pub message: String,
}

impl PublicError {
    pub fn new(status: Status, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(Status::BadRequest, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(Status::NotFound, message)
    }
}

impl From<AppError> for PublicError {
    fn from(err: AppError) -> Self {
        err.log_and_record("Public API error");
        Self {
            status: err.status_code(),
            message: err.public_message(),
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for PublicError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        Custom(self.status, Json(json!({ "error": self.message }))).respond_to(req)
    }
}
