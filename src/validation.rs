use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rocket::data::{Data, Limits};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::SessionStatus;

pub const NAME_MAX_LEN: usize = 100;
pub const SPECIALTY_MAX_LEN: usize = 100;

const INVALID_VALUE: &str = "Invalid value";

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid("length", "Name is required"));
    }
    if trimmed.chars().count() > NAME_MAX_LEN {
        return Err(invalid("length", "Name must be less than 100 characters"));
    }
    Ok(())
}

pub fn validate_specialty(specialty: &str) -> Result<(), ValidationError> {
    if specialty.trim().chars().count() > SPECIALTY_MAX_LEN {
        return Err(invalid(
            "length",
            "Specialty must be less than 100 characters",
        ));
    }
    Ok(())
}

/// Empty input is accepted and means "no date of birth".
pub fn validate_dob(dob: &str) -> Result<(), ValidationError> {
    if dob.trim().is_empty() {
        return Ok(());
    }
    match parse_date_of_birth(dob) {
        Some(date) if date <= Utc::now().date_naive() => Ok(()),
        _ => Err(invalid(
            "dob",
            "Date of birth must be a valid date in the past",
        )),
    }
}

pub fn validate_session_date(date: &str) -> Result<(), ValidationError> {
    match parse_session_date(date) {
        Some(_) => Ok(()),
        None => Err(invalid("date", "Date must be a valid date")),
    }
}

pub fn validate_status(status: &str) -> Result<(), ValidationError> {
    status
        .parse::<SessionStatus>()
        .map(|_| ())
        .map_err(|_| {
            invalid(
                "status",
                "Status must be one of Scheduled, Completed, Cancelled, No-show",
            )
        })
}

/// Accepts a plain calendar date or a full RFC 3339 timestamp.
pub fn parse_date_of_birth(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

/// Accepts RFC 3339, the `datetime-local` form format (read as UTC), or a
/// bare date at midnight UTC.
pub fn parse_session_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Positive integer ids only; anything else is rejected.
pub fn parse_numeric_id(input: &str) -> Option<i64> {
    match input.trim().parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => None,
    }
}

pub fn parse_id_param(input: &str) -> Result<i64, AppError> {
    parse_numeric_id(input).ok_or_else(|| AppError::field("id", "ID must be a positive integer"))
}

/// Reads a request body as UTF-8 under the configured `json` limit. Admin
/// handlers call this after `require_admin()`.
pub async fn read_body(data: Data<'_>, limits: &Limits) -> Result<String, AppError> {
    let limit = limits.get("json").unwrap_or(Limits::JSON);
    let body = data
        .open(limit)
        .into_string()
        .await
        .map_err(|err| AppError::field("body", &format!("Invalid request body: {}", err)))?;

    if !body.is_complete() {
        return Err(AppError::field("body", "Request body is too large"));
    }
    Ok(body.into_inner())
}

pub fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body)
        .map_err(|err| AppError::field("body", &format!("Invalid request body: {}", err)))
}

/// Keeps `null` distinct from an absent field: absent stays `None`, an
/// explicit value (including `null`) becomes `Some(..)`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields: BTreeMap<String, String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, field_errors)| {
                let message = field_errors
                    .iter()
                    .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| INVALID_VALUE.to_string());
                (field.to_string(), message)
            })
            .collect();

        AppError::Validation(fields)
    }
}

pub trait ValidateExt: Sized {
    fn validate_custom(self) -> Result<Self, AppError>;
}

impl<T: Validate> ValidateExt for T {
    fn validate_custom(self) -> Result<Self, AppError> {
        self.validate()?;
        Ok(self)
    }
}
