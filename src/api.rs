use rocket::State;
use rocket::data::{Data, Limits};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::{Validate, ValidationErrors};

use crate::auth::AuthState;
use crate::db::{
    create_patient, create_session, create_therapist, delete_patient, delete_session,
    delete_therapist, list_patients_with_sessions, list_sessions_with_relations,
    list_therapists_with_sessions, update_patient, update_session, update_therapist,
};
use crate::error::AppError;
use crate::models::{
    NewPatient, NewSession, NewTherapist, Patient, PatientPatch, PatientWithSessions,
    SessionPatch, SessionStatus, SessionWithRelations, Therapist, TherapistPatch,
    TherapistWithSessions,
};
use crate::response::{AdminResult, ApiResponse};
use crate::validation::{
    ValidateExt, deserialize_some, parse_date_of_birth, parse_id_param, parse_json_body,
    parse_session_date, read_body, validate_dob, validate_name, validate_session_date,
    validate_specialty, validate_status,
};

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

/// Trims, and treats an empty string as "no value".
fn optional_text(value: Option<String>) -> Option<String> {
    value.map(trimmed).filter(|v| !v.is_empty())
}

fn parse_status(status: Option<&str>) -> Result<Option<SessionStatus>, AppError> {
    status
        .map(|s| {
            s.parse::<SessionStatus>()
                .map_err(|_| AppError::field("status", "Invalid status value"))
        })
        .transpose()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePatientRequest {
    #[validate(required(message = "Name is required"), custom(function = validate_name))]
    name: Option<String>,
    #[validate(custom(function = validate_dob))]
    dob: Option<String>,
}

impl From<CreatePatientRequest> for NewPatient {
    fn from(req: CreatePatientRequest) -> Self {
        Self {
            name: req.name.map(trimmed).unwrap_or_default(),
            dob: req.dob.as_deref().and_then(parse_date_of_birth),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    dob: Option<Option<String>>,
}

impl Validate for UpdatePatientRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(Err(e)) = self.name.as_deref().map(validate_name) {
            errors.add("name", e);
        }
        if let Some(Err(e)) = self.dob.as_ref().and_then(|d| d.as_deref()).map(validate_dob) {
            errors.add("dob", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<UpdatePatientRequest> for PatientPatch {
    fn from(req: UpdatePatientRequest) -> Self {
        Self {
            name: req.name.map(trimmed),
            dob: req
                .dob
                .map(|dob| dob.as_deref().and_then(parse_date_of_birth)),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct PatientDeletedResponse {
    pub message: String,
    pub patient: Patient,
}

#[get("/admin/patients")]
pub async fn api_get_patients(
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Vec<PatientWithSessions>> {
    auth.require_admin()?;

    let patients = list_patients_with_sessions(db).await?;
    Ok(ApiResponse::success(patients))
}

#[post("/admin/patients", data = "<data>")]
pub async fn api_create_patient(
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Patient> {
    auth.require_admin()?;

    let body = read_body(data, limits).await?;
    let request = parse_json_body::<CreatePatientRequest>(&body)?.validate_custom()?;
    let patient = create_patient(db, &request.into()).await?;
    Ok(ApiResponse::success(patient))
}

#[put("/admin/patients/<id>", data = "<data>")]
pub async fn api_update_patient(
    id: &str,
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Patient> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let body = read_body(data, limits).await?;
    let request = parse_json_body::<UpdatePatientRequest>(&body)?.validate_custom()?;
    let patient = update_patient(db, id, &request.into()).await?;
    Ok(ApiResponse::success(patient))
}

#[delete("/admin/patients/<id>")]
pub async fn api_delete_patient(
    id: &str,
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<PatientDeletedResponse> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let patient = delete_patient(db, id).await?;
    Ok(ApiResponse::success(PatientDeletedResponse {
        message: "Patient deleted successfully".to_string(),
        patient,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTherapistRequest {
    #[validate(required(message = "Name is required"), custom(function = validate_name))]
    name: Option<String>,
    #[validate(custom(function = validate_specialty))]
    specialty: Option<String>,
}

impl From<CreateTherapistRequest> for NewTherapist {
    fn from(req: CreateTherapistRequest) -> Self {
        Self {
            name: req.name.map(trimmed).unwrap_or_default(),
            specialty: optional_text(req.specialty),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTherapistRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    specialty: Option<Option<String>>,
}

impl Validate for UpdateTherapistRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(Err(e)) = self.name.as_deref().map(validate_name) {
            errors.add("name", e);
        }
        if let Some(Err(e)) = self
            .specialty
            .as_ref()
            .and_then(|s| s.as_deref())
            .map(validate_specialty)
        {
            errors.add("specialty", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<UpdateTherapistRequest> for TherapistPatch {
    fn from(req: UpdateTherapistRequest) -> Self {
        Self {
            name: req.name.map(trimmed),
            specialty: req.specialty.map(optional_text),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TherapistDeletedResponse {
    pub message: String,
    pub therapist: Therapist,
}

#[get("/admin/therapists")]
pub async fn api_get_therapists(
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Vec<TherapistWithSessions>> {
    auth.require_admin()?;

    let therapists = list_therapists_with_sessions(db).await?;
    Ok(ApiResponse::success(therapists))
}

#[post("/admin/therapists", data = "<data>")]
pub async fn api_create_therapist(
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Therapist> {
    auth.require_admin()?;

    let body = read_body(data, limits).await?;
    let request = parse_json_body::<CreateTherapistRequest>(&body)?.validate_custom()?;
    let therapist = create_therapist(db, &request.into()).await?;
    Ok(ApiResponse::success(therapist))
}

#[put("/admin/therapists/<id>", data = "<data>")]
pub async fn api_update_therapist(
    id: &str,
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Therapist> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let body = read_body(data, limits).await?;
    let request = parse_json_body::<UpdateTherapistRequest>(&body)?.validate_custom()?;
    let therapist = update_therapist(db, id, &request.into()).await?;
    Ok(ApiResponse::success(therapist))
}

#[delete("/admin/therapists/<id>")]
pub async fn api_delete_therapist(
    id: &str,
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<TherapistDeletedResponse> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let therapist = delete_therapist(db, id).await?;
    Ok(ApiResponse::success(TherapistDeletedResponse {
        message: "Therapist deleted successfully".to_string(),
        therapist,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(
        required(message = "Patient ID is required"),
        range(min = 1, message = "Patient ID must be positive")
    )]
    patient_id: Option<i64>,
    #[validate(
        required(message = "Therapist ID is required"),
        range(min = 1, message = "Therapist ID must be positive")
    )]
    therapist_id: Option<i64>,
    #[validate(required(message = "Date is required"), custom(function = validate_session_date))]
    date: Option<String>,
    #[validate(custom(function = validate_status))]
    status: Option<String>,
}

impl TryFrom<CreateSessionRequest> for NewSession {
    type Error = AppError;

    fn try_from(req: CreateSessionRequest) -> Result<Self, Self::Error> {
        let date = req
            .date
            .as_deref()
            .and_then(parse_session_date)
            .ok_or_else(|| AppError::field("date", "Date must be a valid date"))?;

        Ok(Self {
            patient_id: req.patient_id.unwrap_or_default(),
            therapist_id: req.therapist_id.unwrap_or_default(),
            date,
            status: parse_status(req.status.as_deref())?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSessionRequest {
    #[validate(range(min = 1, message = "Patient ID must be positive"))]
    patient_id: Option<i64>,
    #[validate(range(min = 1, message = "Therapist ID must be positive"))]
    therapist_id: Option<i64>,
    #[validate(custom(function = validate_session_date))]
    date: Option<String>,
    #[validate(custom(function = validate_status))]
    status: Option<String>,
}

impl TryFrom<UpdateSessionRequest> for SessionPatch {
    type Error = AppError;

    fn try_from(req: UpdateSessionRequest) -> Result<Self, Self::Error> {
        let date = match req.date.as_deref() {
            Some(date) => Some(
                parse_session_date(date)
                    .ok_or_else(|| AppError::field("date", "Date must be a valid date"))?,
            ),
            None => None,
        };

        Ok(Self {
            patient_id: req.patient_id,
            therapist_id: req.therapist_id,
            date,
            status: parse_status(req.status.as_deref())?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct SessionDeletedResponse {
    pub message: String,
    pub session: SessionWithRelations,
}

#[get("/admin/sessions")]
pub async fn api_get_sessions(
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<Vec<SessionWithRelations>> {
    auth.require_admin()?;

    let sessions = list_sessions_with_relations(db).await?;
    Ok(ApiResponse::success(sessions))
}

#[post("/admin/sessions", data = "<data>")]
pub async fn api_create_session(
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<SessionWithRelations> {
    auth.require_admin()?;

    let body = read_body(data, limits).await?;
    let request = parse_json_body::<CreateSessionRequest>(&body)?.validate_custom()?;
    let new_session = NewSession::try_from(request)?;
    let session = create_session(db, &new_session).await?;
    Ok(ApiResponse::success(session))
}

#[put("/admin/sessions/<id>", data = "<data>")]
pub async fn api_update_session(
    id: &str,
    auth: AuthState,
    data: Data<'_>,
    limits: &Limits,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<SessionWithRelations> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let body = read_body(data, limits).await?;
    let request = parse_json_body::<UpdateSessionRequest>(&body)?.validate_custom()?;
    let patch = SessionPatch::try_from(request)?;
    let session = update_session(db, id, &patch).await?;
    Ok(ApiResponse::success(session))
}

#[delete("/admin/sessions/<id>")]
pub async fn api_delete_session(
    id: &str,
    auth: AuthState,
    db: &State<Pool<Sqlite>>,
) -> AdminResult<SessionDeletedResponse> {
    auth.require_admin()?;

    let id = parse_id_param(id)?;
    let session = delete_session(db, id).await?;
    Ok(ApiResponse::success(SessionDeletedResponse {
        message: "Session deleted successfully".to_string(),
        session,
    }))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
