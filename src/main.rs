#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod response;
mod routes;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use api::{
    api_create_patient, api_create_session, api_create_therapist, api_delete_patient,
    api_delete_session, api_delete_therapist, api_get_patients, api_get_sessions,
    api_get_therapists, api_update_patient, api_update_session, api_update_therapist, health,
};
use auth::{api_admin_login, api_admin_logout};
use env::{AppConfig, load_environment};
use error::AppError;
use rocket::{Build, Rocket};
use routes::{
    api_catcher, public_patients, public_sessions, public_therapists,
    public_update_session_status,
};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let loaded_files = load_environment()?;
    let config = AppConfig::from_env();

    init_tracing(&config);
    info!(files = ?loaded_files, environment = %config.environment, "Loaded environment");

    if config.admin_password_hash.is_none() {
        warn!("ADMIN_PASSWORD_HASH is not set; admin login is disabled");
    }

    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Migrations completed successfully");

    let result = init_rocket(pool, config).await.launch().await;
    shutdown_telemetry();

    result?;
    Ok(())
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting clinic tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_admin_login,
                api_admin_logout,
                api_get_patients,
                api_create_patient,
                api_update_patient,
                api_delete_patient,
                api_get_therapists,
                api_create_therapist,
                api_update_therapist,
                api_delete_therapist,
                api_get_sessions,
                api_create_session,
                api_update_session,
                api_delete_session,
                public_patients,
                public_therapists,
                public_sessions,
                public_update_session_status,
            ],
        )
        .register("/api", catchers![api_catcher])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
