use rocket::data::{Data, Limits};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{FromForm, Request, State};
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};

use crate::db::{search_patients, search_sessions, search_therapists, update_session_status};
use crate::error::PublicError;
use crate::models::{Patient, SessionQuery, SessionStatus, SessionWithNames, StatusUpdate, Therapist};
use crate::validation::{parse_numeric_id, read_body};

#[get("/patients?<name>")]
pub async fn public_patients(
    name: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Patient>>, PublicError> {
    let patients = search_patients(db, name).await?;
    Ok(Json(patients))
}

#[get("/therapists?<name>&<specialty>")]
pub async fn public_therapists(
    name: Option<&str>,
    specialty: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Therapist>>, PublicError> {
    let therapists = search_therapists(db, name, specialty).await?;
    Ok(Json(therapists))
}

#[derive(FromForm, Debug, Default)]
pub struct SessionsQueryParams {
    search: Option<String>,
    status: Option<String>,
    #[field(name = "sortOrder")]
    sort_order: Option<String>,
}

impl From<SessionsQueryParams> for SessionQuery {
    fn from(params: SessionsQueryParams) -> Self {
        Self {
            search: params.search,
            status: params.status,
            descending: params.sort_order.as_deref() == Some("desc"),
        }
    }
}

/// An empty result is reported as 404 rather than an empty array.
#[get("/sessions?<params..>")]
pub async fn public_sessions(
    params: SessionsQueryParams,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SessionWithNames>>, PublicError> {
    let sessions = search_sessions(db, &params.into()).await?;

    if sessions.is_empty() {
        return Err(PublicError::not_found("No sessions found"));
    }

    Ok(Json(sessions))
}

/// Session id comes from the path, or from `?id=` when the path segment is
/// not a usable id.
#[patch("/sessions/<segment>?<id>", data = "<data>")]
pub async fn public_update_session_status(
    segment: &str,
    id: Option<&str>,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StatusUpdate>, PublicError> {
    let session_id = parse_numeric_id(segment)
        .or_else(|| id.and_then(parse_numeric_id))
        .ok_or_else(|| PublicError::bad_request("Invalid session id"))?;

    let body = read_body(data, limits).await.unwrap_or_default();
    let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let status = match payload.get("status").and_then(Value::as_str) {
        Some(status) if !status.is_empty() => status,
        _ => return Err(PublicError::bad_request("Invalid status value")),
    };
    let status = status
        .parse::<SessionStatus>()
        .map_err(|_| PublicError::bad_request("Invalid status value"))?;

    let updated = update_session_status(db, session_id, status).await?;
    Ok(Json(updated))
}

#[catch(default)]
pub fn api_catcher(status: Status, _req: &Request) -> Custom<Json<Value>> {
    let message = status.reason().unwrap_or("Unknown error");
    Custom(status, Json(json!({ "error": message })))
}
