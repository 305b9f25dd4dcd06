//! SQLite implementation of the document store.
//!
//! Uses prepared statements and transactions for data integrity. Every successful write bumps
//! the store revision (which doubles as the creation sequence) and is announced on the change
//! feed that subscriptions listen to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::broadcast;

use crate::errors::AppError;
use crate::store::{
    Collection, Document, DocumentStore, Fields, OrderField, QuerySpec, Snapshot, SortDirection,
};

/// Capacity of the change feed before slow subscribers start lagging.
const CHANGE_FEED_CAPACITY: usize = 256;

/// Document store backed by the `documents` table.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    changes: broadcast::Sender<Collection>,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Increment the revision inside `tx` and return the new value.
    async fn bump_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.get("revision_id"))
    }

    fn announce(&self, collection: Collection) {
        // No receivers simply means nobody is subscribed yet.
        let _ = self.changes.send(collection);
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query(&self, spec: &QuerySpec) -> Result<Snapshot, AppError> {
        let direction = match spec.order.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let order_clause = match &spec.order.field {
            OrderField::CreatedAt => format!("seq {}", direction),
            OrderField::Field(_) => format!("json_extract(fields, ?) {}, seq ASC", direction),
        };
        let filter_clause = if spec.filter.is_some() {
            " AND json_extract(fields, ?) = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, fields, created_at, seq FROM documents WHERE collection = ?{} ORDER BY {}",
            filter_clause, order_clause
        );

        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&sql).bind(spec.collection.as_str());
        if let Some(filter) = &spec.filter {
            query = query.bind(json_path(&filter.field)).bind(&filter.value);
        }
        if let OrderField::Field(name) = &spec.order.field {
            query = query.bind(json_path(name));
        }
        let rows = query.fetch_all(&mut *tx).await?;

        let revision: i64 = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?
            .get("revision_id");
        tx.commit().await?;

        let documents = rows
            .iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            query: spec.clone(),
            documents,
            revision,
            observed_at: Utc::now(),
        })
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query(
            "SELECT id, fields, created_at, seq FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn put(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let existing = match id {
            Some(id) => {
                sqlx::query("SELECT fields FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection.as_str())
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let revision = Self::bump_revision(&mut tx).await?;

        let id = match (id, existing) {
            (Some(id), Some(row)) => {
                let mut merged: Fields = serde_json::from_str(row.get::<&str, _>("fields"))?;
                merged.extend(fields);
                sqlx::query(
                    "UPDATE documents SET fields = ?, updated_at = ? WHERE collection = ? AND id = ?",
                )
                .bind(Value::Object(merged).to_string())
                .bind(&now)
                .bind(collection.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id.to_string()
            }
            (id, _) => {
                let id = id
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                sqlx::query(
                    "INSERT INTO documents (collection, id, fields, created_at, seq, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(collection.as_str())
                .bind(&id)
                .bind(Value::Object(fields).to_string())
                .bind(&now)
                .bind(revision)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        tx.commit().await?;
        tracing::debug!("Stored {}/{} at revision {}", collection, id, revision);
        self.announce(collection);

        Ok(id)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
        }

        let revision = Self::bump_revision(&mut tx).await?;
        tx.commit().await?;
        tracing::debug!("Deleted {}/{} at revision {}", collection, id, revision);
        self.announce(collection);

        Ok(())
    }

    async fn revision(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    fn watch(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }
}

/// JSON path addressing a top-level field, quoted so any field name is safe.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn document_from_row(row: &SqliteRow) -> Result<Document, AppError> {
    let fields: Fields = serde_json::from_str(row.get::<&str, _>("fields"))
        .map_err(|e| AppError::Store(format!("Corrupt document fields: {}", e)))?;
    let created_at = DateTime::parse_from_rfc3339(row.get::<&str, _>("created_at"))
        .map_err(|e| AppError::Store(format!("Corrupt document timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(Document {
        id: row.get("id"),
        fields,
        created_at,
        seq: row.get("seq"),
    })
}
