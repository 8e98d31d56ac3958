use crate::config::Settings;
use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub mod documents;

/// Open a pool on `DATABASE_URL`, addressing the database named by `DB_NAME`.
///
/// Nothing is validated before this point, so missing or malformed settings surface here.
pub async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let db_name = settings.require_db_name()?;

    let options = db_url
        .parse::<PgConnectOptions>()
        .context("DATABASE_URL is not a valid postgres connection string")?
        .database(db_name);

    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("connect to database {db_name} failed"))
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
