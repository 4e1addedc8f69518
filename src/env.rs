use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://clinic.db";
pub const DEFAULT_OTLP_ENDPOINT: &str = "https://api.honeycomb.io:443";

/// Loads the env files for the current `APP_ENV`, later files overriding
/// earlier ones. Returns the files that were actually found, since tracing
/// is not initialised yet when this runs.
pub fn load_environment() -> anyhow::Result<Vec<String>> {
    let is_production =
        dotenvy::var("APP_ENV").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(env_file)? {
            loaded.push(env_file.to_string());
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> anyhow::Result<bool> {
    if !Path::new(path).exists() {
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// bcrypt hash of the admin password. Login is refused when unset.
    pub admin_password_hash: Option<String>,
    pub honeycomb_api_key: Option<String>,
    pub otlp_endpoint: String,
    pub environment: String,
}

fn optional_var(key: &str) -> Option<String> {
    dotenvy::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: optional_var("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            admin_password_hash: optional_var("ADMIN_PASSWORD_HASH"),
            honeycomb_api_key: optional_var("HONEYCOMB_API_KEY"),
            otlp_endpoint: optional_var("OTLP_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
            environment: optional_var("APP_ENV").unwrap_or_else(|| "development".to_string()),
        }
    }
}
