#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc};
    use serde::Deserialize;

    use crate::error::AppError;
    use crate::models::SessionStatus;
    use crate::validation::{
        deserialize_some, parse_date_of_birth, parse_id_param, parse_json_body, parse_numeric_id,
        parse_session_date, validate_dob, validate_name, validate_session_date,
        validate_specialty, validate_status,
    };

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ada").is_ok());
        assert!(validate_name(&"x".repeat(100)).is_ok());

        let empty = validate_name("  ").unwrap_err();
        assert_eq!(empty.message.unwrap(), "Name is required");

        let long = validate_name(&"x".repeat(101)).unwrap_err();
        assert_eq!(long.message.unwrap(), "Name must be less than 100 characters");
    }

    #[test]
    fn test_validate_specialty() {
        assert!(validate_specialty("").is_ok());
        assert!(validate_specialty("Occupational therapy").is_ok());
        assert!(validate_specialty(&"s".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_dob() {
        assert!(validate_dob("").is_ok());
        assert!(validate_dob("1990-05-17").is_ok());
        assert!(validate_dob("1990-05-17T00:00:00Z").is_ok());

        let today = Utc::now().date_naive();
        assert!(validate_dob(&today.format("%Y-%m-%d").to_string()).is_ok());

        let tomorrow = today + Duration::days(1);
        assert!(validate_dob(&tomorrow.format("%Y-%m-%d").to_string()).is_err());
        assert!(validate_dob("1990-13-40").is_err());
    }

    #[test]
    fn test_parse_date_of_birth() {
        assert_eq!(
            parse_date_of_birth(" 1815-12-10 "),
            NaiveDate::from_ymd_opt(1815, 12, 10)
        );
        assert_eq!(parse_date_of_birth("yesterday"), None);
    }

    #[test]
    fn test_parse_session_date_formats() {
        let rfc = parse_session_date("2025-01-01T10:00:00Z").unwrap();
        assert_eq!(rfc.hour(), 10);

        let offset = parse_session_date("2025-01-01T10:00:00+02:00").unwrap();
        assert_eq!(offset.hour(), 8);

        let local = parse_session_date("2025-01-01T10:30").unwrap();
        assert_eq!((local.hour(), local.minute()), (10, 30));

        let bare = parse_session_date("2025-01-01").unwrap();
        assert_eq!((bare.day(), bare.hour()), (1, 0));

        assert!(parse_session_date("soon").is_none());
        assert!(validate_session_date("2025-02-30").is_err());
    }

    #[test]
    fn test_validate_status() {
        for status in ["Scheduled", "Completed", "Cancelled", "No-show"] {
            assert!(validate_status(status).is_ok());
        }
        assert!(validate_status("completed").is_err());
        assert!(validate_status("NoShow").is_err());
        assert_eq!("No-show".parse::<SessionStatus>().unwrap(), SessionStatus::NoShow);
        assert_eq!(SessionStatus::default(), SessionStatus::Scheduled);
    }

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!(parse_numeric_id("42"), Some(42));
        assert_eq!(parse_numeric_id(" 7 "), Some(7));
        assert_eq!(parse_numeric_id("0"), None);
        assert_eq!(parse_numeric_id("-1"), None);
        assert_eq!(parse_numeric_id("1.5"), None);
        assert_eq!(parse_numeric_id(""), None);

        match parse_id_param("abc") {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields["id"], "ID must be a positive integer")
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        dob: Option<Option<String>>,
    }

    #[test]
    fn test_deserialize_some_keeps_null_distinct() {
        let absent: Patch = parse_json_body("{}").unwrap();
        assert_eq!(absent.dob, None);

        let null: Patch = parse_json_body(r#"{"dob": null}"#).unwrap();
        assert_eq!(null.dob, Some(None));

        let value: Patch = parse_json_body(r#"{"dob": "2000-01-01"}"#).unwrap();
        assert_eq!(value.dob, Some(Some("2000-01-01".to_string())));

        let err = parse_json_body::<Patch>("[").err().unwrap();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_error_envelope_parts() {
        let err = AppError::field("name", "Name is required");
        assert_eq!(err.status_code().code, 400);
        assert_eq!(
            err.details().unwrap(),
            serde_json::json!({ "fieldErrors": { "name": "Name is required" } })
        );

        let missing = AppError::RecordNotFound;
        assert_eq!(missing.code(), "RECORD_NOT_FOUND");
        assert_eq!(missing.status_code().code, 404);
        assert!(missing.details().is_none());

        let internal = AppError::Internal("disk on fire".to_string());
        assert_eq!(internal.public_message(), "An unexpected error occurred");
        assert_eq!(internal.code(), "INTERNAL_SERVER_ERROR");

        let row = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(row.code(), "RECORD_NOT_FOUND");
        assert_eq!(AppError::Unauthorized.status_code().code, 401);
    }
}
