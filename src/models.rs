use std::fmt;
use std::str::FromStr;

use anyhow::Error;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    #[serde(rename = "No-show")]
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "Scheduled",
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
            SessionStatus::NoShow => "No-show",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(SessionStatus::Scheduled),
            "Completed" => Ok(SessionStatus::Completed),
            "Cancelled" => Ok(SessionStatus::Cancelled),
            "No-show" => Ok(SessionStatus::NoShow),
            _ => Err(Error::msg(format!("Unknown session status: {}", s))),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub dob: Option<NaiveDate>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPatient {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
}

impl From<DbPatient> for Patient {
    fn from(patient: DbPatient) -> Self {
        Self {
            id: patient.id.unwrap_or_default(),
            name: patient.name.unwrap_or_default(),
            dob: patient.dob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Therapist {
    pub id: i64,
    pub name: String,
    pub specialty: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTherapist {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub specialty: Option<String>,
}

impl From<DbTherapist> for Therapist {
    fn from(therapist: DbTherapist) -> Self {
        Self {
            id: therapist.id.unwrap_or_default(),
            name: therapist.name.unwrap_or_default(),
            specialty: therapist.specialty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub therapist_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub status: SessionStatus,
}

/// A session with its patient and therapist rows embedded, as the admin
/// screens consume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithRelations {
    #[serde(flatten)]
    pub session: Session,
    pub patients: Option<Patient>,
    pub therapists: Option<Therapist>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSessionWithRelations {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub therapist_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub status: String,
    pub patient_name: Option<String>,
    pub patient_dob: Option<NaiveDate>,
    pub therapist_name: Option<String>,
    pub therapist_specialty: Option<String>,
}

fn stored_status(status: &str) -> Result<SessionStatus, AppError> {
    status
        .parse()
        .map_err(|err: Error| AppError::Internal(format!("Stored session row is invalid: {}", err)))
}

impl TryFrom<DbSessionWithRelations> for SessionWithRelations {
    type Error = AppError;

    fn try_from(db: DbSessionWithRelations) -> Result<Self, Self::Error> {
        let status = stored_status(&db.status)?;
        let patients = match (db.patient_id, db.patient_name) {
            (Some(id), Some(name)) => Some(Patient {
                id,
                name,
                dob: db.patient_dob,
            }),
            _ => None,
        };
        let therapists = match (db.therapist_id, db.therapist_name) {
            (Some(id), Some(name)) => Some(Therapist {
                id,
                name,
                specialty: db.therapist_specialty,
            }),
            _ => None,
        };

        Ok(Self {
            session: Session {
                id: db.id,
                patient_id: db.patient_id,
                therapist_id: db.therapist_id,
                date: db.date,
                status,
            },
            patients,
            therapists,
        })
    }
}

/// Flattened shape served by the public sessions listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithNames {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub status: SessionStatus,
    pub therapist_name: String,
    pub patient_name: String,
}

impl TryFrom<DbSessionWithRelations> for SessionWithNames {
    type Error = AppError;

    fn try_from(db: DbSessionWithRelations) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            date: db.date,
            status: stored_status(&db.status)?,
            therapist_name: db.therapist_name.unwrap_or_default(),
            patient_name: db.patient_name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: i64,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientWithSessions {
    #[serde(flatten)]
    pub patient: Patient,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientName {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistSessionSummary {
    pub id: i64,
    pub status: SessionStatus,
    pub patients: Option<PatientName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistWithSessions {
    #[serde(flatten)]
    pub therapist: Therapist,
    pub sessions: Vec<TherapistSessionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: i64,
    pub status: SessionStatus,
}

#[derive(Debug)]
pub struct NewPatient {
    pub name: String,
    pub dob: Option<NaiveDate>,
}

/// Partial update: `None` leaves a column untouched, `Some(None)` clears a
/// nullable column.
#[derive(Debug, Default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub dob: Option<Option<NaiveDate>>,
}

#[derive(Debug)]
pub struct NewTherapist {
    pub name: String,
    pub specialty: Option<String>,
}

#[derive(Debug, Default)]
pub struct TherapistPatch {
    pub name: Option<String>,
    pub specialty: Option<Option<String>>,
}

#[derive(Debug)]
pub struct NewSession {
    pub patient_id: i64,
    pub therapist_id: i64,
    pub date: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Default)]
pub struct SessionPatch {
    pub patient_id: Option<i64>,
    pub therapist_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Default)]
pub struct SessionQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub descending: bool,
}
