use std::collections::HashMap;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Pool, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    DbPatient, DbSessionWithRelations, DbTherapist, NewPatient, NewSession, NewTherapist,
    Patient, PatientName, PatientPatch, PatientWithSessions, SessionPatch, SessionQuery,
    SessionStatus, SessionSummary, SessionWithNames, SessionWithRelations, StatusUpdate,
    Therapist, TherapistPatch, TherapistSessionSummary, TherapistWithSessions,
};

const SESSION_WITH_RELATIONS: &str = "SELECT s.id, s.patient_id, s.therapist_id, s.date, s.status,
        p.name AS patient_name, p.dob AS patient_dob,
        t.name AS therapist_name, t.specialty AS therapist_specialty
 FROM sessions s
 LEFT JOIN patients p ON p.id = s.patient_id
 LEFT JOIN therapists t ON t.id = s.therapist_id";

#[instrument]
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    info!("Connecting to SQLite database");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Case-insensitive substring match. SQLite's `LOWER` and `LIKE` only fold
/// ASCII, so name matching happens here with full Unicode lowercasing.
pub fn matches_search(value: &str, term: &str) -> bool {
    value.to_lowercase().contains(&term.to_lowercase())
}

// Patients

#[instrument(skip(executor))]
async fn fetch_patient<'e, E>(executor: E, id: i64) -> Result<Option<Patient>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbPatient>("SELECT id, name, dob FROM patients WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Patient::from))
}

#[instrument(skip(pool))]
pub async fn list_patients_with_sessions(
    pool: &Pool<Sqlite>,
) -> Result<Vec<PatientWithSessions>, AppError> {
    info!("Listing patients with their sessions");
    let patients = sqlx::query_as::<_, DbPatient>(
        "SELECT id, name, dob FROM patients ORDER BY name COLLATE NOCASE ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut sessions_by_patient: HashMap<i64, Vec<SessionSummary>> = HashMap::new();
    for session in all_sessions(pool).await? {
        if let Some(patient_id) = session.session.patient_id {
            sessions_by_patient
                .entry(patient_id)
                .or_default()
                .push(SessionSummary {
                    id: session.session.id,
                    status: session.session.status,
                });
        }
    }

    Ok(patients
        .into_iter()
        .map(Patient::from)
        .map(|patient| PatientWithSessions {
            sessions: sessions_by_patient.remove(&patient.id).unwrap_or_default(),
            patient,
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn search_patients(
    pool: &Pool<Sqlite>,
    name: Option<&str>,
) -> Result<Vec<Patient>, AppError> {
    info!("Searching patients");
    let rows = sqlx::query_as::<_, DbPatient>(
        "SELECT id, name, dob FROM patients ORDER BY name COLLATE NOCASE ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    let name = non_blank(name);
    Ok(rows
        .into_iter()
        .map(Patient::from)
        .filter(|patient| name.is_none_or(|term| matches_search(&patient.name, term)))
        .collect())
}

#[instrument(skip(pool))]
pub async fn create_patient(
    pool: &Pool<Sqlite>,
    new_patient: &NewPatient,
) -> Result<Patient, AppError> {
    info!("Creating patient");
    let res = sqlx::query("INSERT INTO patients (name, dob) VALUES (?, ?)")
        .bind(&new_patient.name)
        .bind(new_patient.dob)
        .execute(pool)
        .await?;

    Ok(Patient {
        id: res.last_insert_rowid(),
        name: new_patient.name.clone(),
        dob: new_patient.dob,
    })
}

#[instrument(skip(pool))]
pub async fn update_patient(
    pool: &Pool<Sqlite>,
    id: i64,
    patch: &PatientPatch,
) -> Result<Patient, AppError> {
    info!("Updating patient");
    let mut tx = pool.begin().await?;

    let existing = fetch_patient(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    let updated = Patient {
        id,
        name: patch.name.clone().unwrap_or(existing.name),
        dob: patch.dob.unwrap_or(existing.dob),
    };

    sqlx::query("UPDATE patients SET name = ?, dob = ? WHERE id = ?")
        .bind(&updated.name)
        .bind(updated.dob)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(updated)
}

#[instrument(skip(executor))]
async fn count_patient_sessions<'e, E>(executor: E, patient_id: i64) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE patient_id = ?")
        .bind(patient_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Refuses while any session, whatever its status, still references the
/// patient.
#[instrument(skip(pool))]
pub async fn delete_patient(pool: &Pool<Sqlite>, id: i64) -> Result<Patient, AppError> {
    info!("Deleting patient");
    let mut tx = pool.begin().await?;

    if count_patient_sessions(&mut *tx, id).await? > 0 {
        return Err(AppError::Constraint(
            "Cannot delete patient with existing sessions".to_string(),
        ));
    }

    let patient = fetch_patient(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    sqlx::query("DELETE FROM patients WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(patient)
}

// Therapists

#[instrument(skip(executor))]
async fn fetch_therapist<'e, E>(executor: E, id: i64) -> Result<Option<Therapist>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbTherapist>(
        "SELECT id, name, specialty FROM therapists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Therapist::from))
}

#[instrument(skip(pool))]
pub async fn list_therapists_with_sessions(
    pool: &Pool<Sqlite>,
) -> Result<Vec<TherapistWithSessions>, AppError> {
    info!("Listing therapists with their sessions");
    let therapists = sqlx::query_as::<_, DbTherapist>(
        "SELECT id, name, specialty FROM therapists ORDER BY name COLLATE NOCASE ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut sessions_by_therapist: HashMap<i64, Vec<TherapistSessionSummary>> = HashMap::new();
    for session in all_sessions(pool).await? {
        if let Some(therapist_id) = session.session.therapist_id {
            sessions_by_therapist
                .entry(therapist_id)
                .or_default()
                .push(TherapistSessionSummary {
                    id: session.session.id,
                    status: session.session.status,
                    patients: session.patients.map(|p| PatientName { name: p.name }),
                });
        }
    }

    Ok(therapists
        .into_iter()
        .map(Therapist::from)
        .map(|therapist| TherapistWithSessions {
            sessions: sessions_by_therapist
                .remove(&therapist.id)
                .unwrap_or_default(),
            therapist,
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn search_therapists(
    pool: &Pool<Sqlite>,
    name: Option<&str>,
    specialty: Option<&str>,
) -> Result<Vec<Therapist>, AppError> {
    info!("Searching therapists");
    let mut query = QueryBuilder::<Sqlite>::new("SELECT id, name, specialty FROM therapists WHERE 1 = 1");

    if let Some(specialty) = non_blank(specialty) {
        query.push(" AND specialty = ").push_bind(specialty.to_string());
    }
    query.push(" ORDER BY name COLLATE NOCASE ASC, id ASC");

    let rows = query.build_query_as::<DbTherapist>().fetch_all(pool).await?;

    let name = non_blank(name);
    Ok(rows
        .into_iter()
        .map(Therapist::from)
        .filter(|therapist| name.is_none_or(|term| matches_search(&therapist.name, term)))
        .collect())
}

#[instrument(skip(pool))]
pub async fn create_therapist(
    pool: &Pool<Sqlite>,
    new_therapist: &NewTherapist,
) -> Result<Therapist, AppError> {
    info!("Creating therapist");
    let res = sqlx::query("INSERT INTO therapists (name, specialty) VALUES (?, ?)")
        .bind(&new_therapist.name)
        .bind(new_therapist.specialty.as_deref())
        .execute(pool)
        .await?;

    Ok(Therapist {
        id: res.last_insert_rowid(),
        name: new_therapist.name.clone(),
        specialty: new_therapist.specialty.clone(),
    })
}

#[instrument(skip(pool))]
pub async fn update_therapist(
    pool: &Pool<Sqlite>,
    id: i64,
    patch: &TherapistPatch,
) -> Result<Therapist, AppError> {
    info!("Updating therapist");
    let mut tx = pool.begin().await?;

    let existing = fetch_therapist(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    let updated = Therapist {
        id,
        name: patch.name.clone().unwrap_or(existing.name),
        specialty: patch.specialty.clone().unwrap_or(existing.specialty),
    };

    sqlx::query("UPDATE therapists SET name = ?, specialty = ? WHERE id = ?")
        .bind(&updated.name)
        .bind(updated.specialty.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(updated)
}

#[instrument(skip(executor))]
async fn count_therapist_sessions<'e, E>(executor: E, therapist_id: i64) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE therapist_id = ?")
            .bind(therapist_id)
            .fetch_one(executor)
            .await?;
    Ok(count)
}

#[instrument(skip(pool))]
pub async fn delete_therapist(pool: &Pool<Sqlite>, id: i64) -> Result<Therapist, AppError> {
    info!("Deleting therapist");
    let mut tx = pool.begin().await?;

    if count_therapist_sessions(&mut *tx, id).await? > 0 {
        return Err(AppError::Constraint(
            "Cannot delete therapist with existing sessions".to_string(),
        ));
    }

    let therapist = fetch_therapist(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    sqlx::query("DELETE FROM therapists WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(therapist)
}

// Sessions

#[instrument(skip(pool))]
async fn all_sessions(pool: &Pool<Sqlite>) -> Result<Vec<SessionWithRelations>, AppError> {
    let sql = format!("{} ORDER BY s.id ASC", SESSION_WITH_RELATIONS);
    let rows = sqlx::query_as::<_, DbSessionWithRelations>(&sql)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(SessionWithRelations::try_from).collect()
}

#[instrument(skip(executor))]
async fn fetch_session<'e, E>(
    executor: E,
    id: i64,
) -> Result<Option<SessionWithRelations>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE s.id = ?", SESSION_WITH_RELATIONS);
    let row = sqlx::query_as::<_, DbSessionWithRelations>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(SessionWithRelations::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn list_sessions_with_relations(
    pool: &Pool<Sqlite>,
) -> Result<Vec<SessionWithRelations>, AppError> {
    info!("Listing sessions with relations");
    let sql = format!("{} ORDER BY s.date DESC, s.id DESC", SESSION_WITH_RELATIONS);
    let rows = sqlx::query_as::<_, DbSessionWithRelations>(&sql)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(SessionWithRelations::try_from).collect()
}

/// Pre-flight existence check for the foreign keys a write is about to use.
/// Patient is checked before therapist.
#[instrument(skip(conn))]
async fn ensure_related_exist(
    conn: &mut SqliteConnection,
    patient_id: Option<i64>,
    therapist_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(patient_id) = patient_id {
        if fetch_patient(&mut *conn, patient_id).await?.is_none() {
            return Err(AppError::NotFound("Patient not found".to_string()));
        }
    }

    if let Some(therapist_id) = therapist_id {
        if fetch_therapist(&mut *conn, therapist_id).await?.is_none() {
            return Err(AppError::NotFound("Therapist not found".to_string()));
        }
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    new_session: &NewSession,
) -> Result<SessionWithRelations, AppError> {
    info!("Creating session");
    let mut tx = pool.begin().await?;

    ensure_related_exist(
        &mut *tx,
        Some(new_session.patient_id),
        Some(new_session.therapist_id),
    )
    .await?;

    let res = sqlx::query(
        "INSERT INTO sessions (patient_id, therapist_id, date, status) VALUES (?, ?, ?, ?)",
    )
    .bind(new_session.patient_id)
    .bind(new_session.therapist_id)
    .bind(new_session.date)
    .bind(new_session.status.as_str())
    .execute(&mut *tx)
    .await?;

    let session = fetch_session(&mut *tx, res.last_insert_rowid())
        .await?
        .ok_or_else(|| AppError::Internal("Created session could not be read back".to_string()))?;

    tx.commit().await?;
    Ok(session)
}

#[instrument(skip(pool))]
pub async fn update_session(
    pool: &Pool<Sqlite>,
    id: i64,
    patch: &SessionPatch,
) -> Result<SessionWithRelations, AppError> {
    info!("Updating session");
    let mut tx = pool.begin().await?;

    ensure_related_exist(&mut *tx, patch.patient_id, patch.therapist_id).await?;

    let existing = fetch_session(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?
        .session;

    sqlx::query(
        "UPDATE sessions SET patient_id = ?, therapist_id = ?, date = ?, status = ? WHERE id = ?",
    )
    .bind(patch.patient_id.or(existing.patient_id))
    .bind(patch.therapist_id.or(existing.therapist_id))
    .bind(patch.date.unwrap_or(existing.date))
    .bind(patch.status.unwrap_or(existing.status).as_str())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let session = fetch_session(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    tx.commit().await?;
    Ok(session)
}

#[instrument(skip(pool))]
pub async fn delete_session(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<SessionWithRelations, AppError> {
    info!("Deleting session");
    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(session)
}

#[instrument(skip(pool))]
pub async fn search_sessions(
    pool: &Pool<Sqlite>,
    params: &SessionQuery,
) -> Result<Vec<SessionWithNames>, AppError> {
    info!("Searching sessions");
    let mut query = QueryBuilder::<Sqlite>::new(SESSION_WITH_RELATIONS);
    query.push(" WHERE 1 = 1");

    if let Some(status) = non_blank(params.status.as_deref()) {
        query.push(" AND s.status = ").push_bind(status.to_string());
    }
    query.push(if params.descending {
        " ORDER BY s.date DESC, s.id DESC"
    } else {
        " ORDER BY s.date ASC, s.id ASC"
    });

    let rows = query
        .build_query_as::<DbSessionWithRelations>()
        .fetch_all(pool)
        .await?;

    let search = non_blank(params.search.as_deref());
    rows.into_iter()
        .map(SessionWithNames::try_from)
        .filter(|session| match (session, search) {
            (Ok(session), Some(term)) => {
                matches_search(&session.therapist_name, term)
                    || matches_search(&session.patient_name, term)
            }
            _ => true,
        })
        .collect()
}

#[instrument(skip(pool))]
pub async fn update_session_status(
    pool: &Pool<Sqlite>,
    id: i64,
    status: SessionStatus,
) -> Result<StatusUpdate, AppError> {
    info!("Updating session status");
    let res = sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    Ok(StatusUpdate { id, status })
}
