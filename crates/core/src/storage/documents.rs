use crate::config::Settings;
use crate::domain::snapshot::FinancialSnapshot;
use anyhow::Context;
use uuid::Uuid;

/// Destination for built snapshots. Every call appends a new document.
#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn insert_snapshot(&self, snapshot: &FinancialSnapshot) -> anyhow::Result<Uuid>;
}

/// Insert `snapshot` into `sink` and log the new document id.
pub async fn persist(
    sink: &dyn SnapshotSink,
    snapshot: &FinancialSnapshot,
) -> anyhow::Result<Uuid> {
    let document_id = sink
        .insert_snapshot(snapshot)
        .await
        .with_context(|| format!("persisting snapshot for {} failed", snapshot.ticker))?;
    tracing::info!(
        ticker = %snapshot.ticker,
        %document_id,
        "persisted financial snapshot"
    );
    Ok(document_id)
}

/// Postgres-backed document collection: one JSONB row per inserted snapshot.
#[derive(Debug, Clone)]
pub struct PgDocumentSink {
    pool: sqlx::PgPool,
    collection: String,
}

impl PgDocumentSink {
    pub fn new(pool: sqlx::PgPool, collection: impl Into<String>) -> anyhow::Result<Self> {
        let collection = collection.into();
        anyhow::ensure!(
            !collection.trim().is_empty(),
            "collection name must be non-empty"
        );
        Ok(Self { pool, collection })
    }

    pub fn from_settings(pool: sqlx::PgPool, settings: &Settings) -> anyhow::Result<Self> {
        Self::new(pool, settings.require_collection_name()?)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait::async_trait]
impl SnapshotSink for PgDocumentSink {
    async fn insert_snapshot(&self, snapshot: &FinancialSnapshot) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let document = snapshot.to_document()?;

        sqlx::query(
            "INSERT INTO documents (id, collection, ticker, captured_at, document) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .persistent(false)
        .bind(id)
        .bind(&self.collection)
        .bind(&snapshot.ticker)
        .bind(snapshot.timestamp)
        .bind(document)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert into collection {} failed", self.collection))?;

        Ok(id)
    }
}
