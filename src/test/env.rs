#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::env::{AppConfig, DEFAULT_DATABASE_URL, DEFAULT_OTLP_ENDPOINT, load_environment};

    const KEYS: [&str; 5] = [
        "DATABASE_URL",
        "ADMIN_PASSWORD_HASH",
        "HONEYCOMB_API_KEY",
        "OTLP_ENDPOINT",
        "APP_ENV",
    ];

    #[test]
    #[serial]
    fn test_config_defaults() {
        temp_env::with_vars_unset(KEYS, || {
            let config = AppConfig::from_env();

            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
            assert_eq!(config.environment, "development");
            assert!(config.admin_password_hash.is_none());
            assert!(config.honeycomb_api_key.is_none());
        });
    }

    #[test]
    #[serial]
    fn test_config_reads_environment() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://other.db")),
                ("ADMIN_PASSWORD_HASH", Some("$2b$04$hash")),
                ("HONEYCOMB_API_KEY", Some("   ")),
                ("OTLP_ENDPOINT", Some("http://collector:4317")),
                ("APP_ENV", Some("production")),
            ],
            || {
                let config = AppConfig::from_env();

                assert_eq!(config.database_url, "sqlite://other.db");
                assert_eq!(config.admin_password_hash.as_deref(), Some("$2b$04$hash"));
                // Blank values count as unset.
                assert!(config.honeycomb_api_key.is_none());
                assert_eq!(config.otlp_endpoint, "http://collector:4317");
                assert_eq!(config.environment, "production");
            },
        );
    }

    #[test]
    #[serial]
    fn test_load_environment_picks_files_for_app_env() {
        let touched = |app_env: Option<&'static str>| {
            [("APP_ENV", app_env), ("DATABASE_URL", None), ("RUST_LOG", None)]
        };

        temp_env::with_vars(touched(Some("production")), || {
            let loaded = load_environment().unwrap();

            assert!(loaded.contains(&"config/common.env".to_string()));
            assert!(loaded.contains(&"config/prod.env".to_string()));
            assert!(!loaded.contains(&"config/dev.env".to_string()));
            assert_eq!(std::env::var("DATABASE_URL").unwrap(), DEFAULT_DATABASE_URL);
        });

        temp_env::with_vars(touched(None), || {
            let loaded = load_environment().unwrap();

            assert!(loaded.contains(&"config/dev.env".to_string()));
            assert_eq!(std::env::var("APP_ENV").unwrap(), "development");
        });
    }
}
