pub mod builder;
pub mod domain;
pub mod ingest;
pub mod metrics;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub db_name: Option<String>,
        pub collection_name: Option<String>,
        pub sentry_dsn: Option<String>,
        pub yahoo_base_url: Option<String>,
        pub yahoo_timeout_secs: Option<u64>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                db_name: std::env::var("DB_NAME").ok(),
                collection_name: std::env::var("COLLECTION_NAME").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                yahoo_base_url: std::env::var("YAHOO_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                yahoo_timeout_secs: std::env::var("YAHOO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_db_name(&self) -> anyhow::Result<&str> {
            self.db_name.as_deref().context("DB_NAME is required")
        }

        pub fn require_collection_name(&self) -> anyhow::Result<&str> {
            self.collection_name
                .as_deref()
                .context("COLLECTION_NAME is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn empty() -> Settings {
            Settings {
                database_url: None,
                db_name: None,
                collection_name: None,
                sentry_dsn: None,
                yahoo_base_url: None,
                yahoo_timeout_secs: None,
            }
        }

        #[test]
        fn missing_values_name_the_variable() {
            let settings = empty();
            let err = settings.require_collection_name().unwrap_err();
            assert!(err.to_string().contains("COLLECTION_NAME"));
            let err = settings.require_db_name().unwrap_err();
            assert!(err.to_string().contains("DB_NAME"));
        }

        #[test]
        fn present_values_are_returned() {
            let settings = Settings {
                database_url: Some("postgres://localhost/x".to_string()),
                ..empty()
            };
            assert_eq!(
                settings.require_database_url().unwrap(),
                "postgres://localhost/x"
            );
        }
    }
}
