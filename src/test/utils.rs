#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Once;

    use chrono::NaiveDate;
    use rocket::http::Cookie;
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::Value;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};

    use crate::auth::{ADMIN_COOKIE, ADMIN_COOKIE_VALUE};
    use crate::db::{create_patient, create_session, create_therapist};
    use crate::env::AppConfig;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{NewPatient, NewSession, NewTherapist, SessionStatus};
    use crate::validation::parse_session_date;

    static INIT: Once = Once::new();
    pub static TEST_ADMIN_PASSWORD: &str = "letmein";

    #[derive(Default)]
    pub struct TestDbBuilder {
        patients: Vec<TestPatient>,
        therapists: Vec<TestTherapist>,
        sessions: Vec<TestSession>,
    }

    pub struct TestPatient {
        pub name: String,
        pub dob: Option<NaiveDate>,
    }

    pub struct TestTherapist {
        pub name: String,
        pub specialty: Option<String>,
    }

    pub struct TestSession {
        pub patient_name: String,
        pub therapist_name: String,
        pub date: String,
        pub status: SessionStatus,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn patient(mut self, name: &str, dob: Option<&str>) -> Self {
            self.patients.push(TestPatient {
                name: name.to_string(),
                dob: dob.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            });
            self
        }

        pub fn therapist(mut self, name: &str, specialty: Option<&str>) -> Self {
            self.therapists.push(TestTherapist {
                name: name.to_string(),
                specialty: specialty.map(String::from),
            });
            self
        }

        pub fn session(
            mut self,
            patient_name: &str,
            therapist_name: &str,
            date: &str,
            status: SessionStatus,
        ) -> Self {
            self.sessions.push(TestSession {
                patient_name: patient_name.to_string(),
                therapist_name: therapist_name.to_string(),
                date: date.to_string(),
                status,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            // A single connection that never recycles, so the in-memory
            // database lives as long as the pool.
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut patient_id_map: HashMap<String, i64> = HashMap::new();
            let mut therapist_id_map: HashMap<String, i64> = HashMap::new();
            let mut session_ids = Vec::new();

            for patient in &self.patients {
                let created = create_patient(
                    &pool,
                    &NewPatient {
                        name: patient.name.clone(),
                        dob: patient.dob,
                    },
                )
                .await?;
                patient_id_map.insert(patient.name.clone(), created.id);
            }

            for therapist in &self.therapists {
                let created = create_therapist(
                    &pool,
                    &NewTherapist {
                        name: therapist.name.clone(),
                        specialty: therapist.specialty.clone(),
                    },
                )
                .await?;
                therapist_id_map.insert(therapist.name.clone(), created.id);
            }

            for session in &self.sessions {
                let new_session = NewSession {
                    patient_id: patient_id_map[&session.patient_name],
                    therapist_id: therapist_id_map[&session.therapist_name],
                    date: parse_session_date(&session.date).unwrap(),
                    status: session.status,
                };
                let created = create_session(&pool, &new_session).await?;
                session_ids.push(created.session.id);
            }

            Ok(TestDb {
                pool,
                patient_id_map,
                therapist_id_map,
                session_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub patient_id_map: HashMap<String, i64>,
        pub therapist_id_map: HashMap<String, i64>,
        /// In insertion order.
        pub session_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn patient_id(&self, name: &str) -> i64 {
            self.patient_id_map[name]
        }

        pub fn therapist_id(&self, name: &str) -> i64 {
            self.therapist_id_map[name]
        }

        pub async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .unwrap()
        }
    }

    /// Three patients, three therapists, and three sessions. "Alan Turing" and
    /// "Dr. Unused" have no sessions.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .patient("Ada Lovelace", Some("1815-12-10"))
            .patient("Grace Hopper", Some("1906-12-09"))
            .patient("Alan Turing", None)
            .therapist("Dr. Lee", Some("OT"))
            .therapist("Dr. Smith", Some("Physio"))
            .therapist("Dr. Unused", Some("Speech"))
            .session(
                "Ada Lovelace",
                "Dr. Lee",
                "2025-01-01T10:00:00Z",
                SessionStatus::Scheduled,
            )
            .session(
                "Grace Hopper",
                "Dr. Smith",
                "2025-02-01T09:00:00Z",
                SessionStatus::Completed,
            )
            .session(
                "Ada Lovelace",
                "Dr. Smith",
                "2025-03-01T14:00:00Z",
                SessionStatus::Cancelled,
            )
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            admin_password_hash: Some(bcrypt::hash(TEST_ADMIN_PASSWORD, 4).unwrap()),
            honeycomb_api_key: None,
            otlp_endpoint: "http://localhost:4317".to_string(),
            environment: "test".to_string(),
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), test_config()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to create test client");

        (client, test_db)
    }

    pub fn admin_cookie() -> Cookie<'static> {
        Cookie::new(ADMIN_COOKIE, ADMIN_COOKIE_VALUE)
    }

    pub async fn response_json(response: LocalResponse<'_>) -> Value {
        let body = response.into_string().await.expect("Response had no body");
        serde_json::from_str(&body).expect("Response body was not JSON")
    }
}
