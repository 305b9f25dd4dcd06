//! Contracts for the external collaborators: the document store and the asset uploader.
//!
//! The store owns every document; everything above this module holds advisory copies.

mod timed;
mod uploader;

pub use timed::*;
pub use uploader::*;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::errors::AppError;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// Named collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Posts,
    Activities,
    CalendarActivities,
    Resources,
    Members,
    Documentations,
    Banners,
    SiteSettings,
    Hotlines,
    Footer,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Posts,
        Collection::Activities,
        Collection::CalendarActivities,
        Collection::Resources,
        Collection::Members,
        Collection::Documentations,
        Collection::Banners,
        Collection::SiteSettings,
        Collection::Hotlines,
        Collection::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Activities => "activities",
            Collection::CalendarActivities => "calendarActivities",
            Collection::Resources => "resources",
            Collection::Members => "members",
            Collection::Documentations => "documentations",
            Collection::Banners => "banners",
            Collection::SiteSettings => "siteSettings",
            Collection::Hotlines => "hotlines",
            Collection::Footer => "footer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Ordering every listing of this collection is requested with.
    pub fn default_order(&self) -> OrderSpec {
        match self {
            Collection::CalendarActivities => OrderSpec::field_asc("date"),
            Collection::Members => OrderSpec::created_asc(),
            Collection::Hotlines => OrderSpec::field_asc("category"),
            _ => OrderSpec::created_desc(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderField {
    /// Server-assigned creation sequence
    CreatedAt,
    /// A scalar document field
    Field(String),
}

/// The ordering a snapshot was obtained with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn created_desc() -> Self {
        Self {
            field: OrderField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }

    pub fn created_asc() -> Self {
        Self {
            field: OrderField::CreatedAt,
            direction: SortDirection::Asc,
        }
    }

    pub fn field_asc(name: &str) -> Self {
        Self {
            field: OrderField::Field(name.to_string()),
            direction: SortDirection::Asc,
        }
    }
}

/// Equality filter on a string field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// A collection query; doubles as the cache key for its snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    pub collection: Collection,
    pub filter: Option<FieldFilter>,
    pub order: OrderSpec,
}

impl QuerySpec {
    /// Every document of a collection in its default order.
    pub fn all(collection: Collection) -> Self {
        Self {
            collection,
            filter: None,
            order: collection.default_order(),
        }
    }

    pub fn where_eq(mut self, field: &str, value: &str) -> Self {
        self.filter = Some(FieldFilter {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }
}

/// A stored document as observed at some point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    /// Monotonic creation sequence assigned by the store
    pub seq: i64,
}

impl Document {
    /// Decode into a typed entity. `id` and `createdAt` are injected from the envelope.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let mut fields = self.fields.clone();
        fields.insert("id".into(), Value::String(self.id.clone()));
        fields.insert(
            "createdAt".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// String value of a field; numbers are rendered, everything else is absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The ordered sequence of documents last observed for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub query: QuerySpec,
    pub documents: Vec<Document>,
    /// Store revision the snapshot was read at
    pub revision: i64,
    pub observed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Decode every document, skipping (and logging) ones that do not fit `T`.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Vec<T> {
        self.documents
            .iter()
            .filter_map(|doc| match doc.decode() {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed {} document {}: {}",
                        self.query.collection,
                        doc.id,
                        e
                    );
                    None
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Callback invoked with every snapshot a subscription observes.
pub type SnapshotCallback = Arc<dyn Fn(Result<Snapshot, AppError>) + Send + Sync>;

/// The remote document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot query.
    async fn query(&self, spec: &QuerySpec) -> Result<Snapshot, AppError>;

    /// Fetch one document by id.
    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError>;

    /// Create (`id == None`, or an id not yet stored) or merge fields into a document.
    /// Returns the document id.
    async fn put(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError>;

    /// Current store revision; bumps on every successful write.
    async fn revision(&self) -> Result<i64, AppError>;

    /// Change feed: the collection touched by every successful write.
    fn watch(&self) -> broadcast::Receiver<Collection>;
}

/// Handle to a live subscription. Dropping it also tears the subscription down.
pub struct Subscription {
    query: QuerySpec,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop receiving pushes.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::debug!("Unsubscribing from {}", self.query.collection);
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("query", &self.query)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Subscribe to a query. The initial snapshot is delivered to `on_change` before this
/// returns; afterwards every write to the collection re-runs the query and pushes again.
pub async fn subscribe(
    store: Arc<dyn DocumentStore>,
    spec: QuerySpec,
    on_change: SnapshotCallback,
) -> Result<Subscription, AppError> {
    // Listen before the initial read so no write slips between the two.
    let mut changes = store.watch();

    let initial = store.query(&spec).await?;
    on_change(Ok(initial));

    let query = spec.clone();
    let task = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(collection) if collection == spec.collection => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        "Subscription to {} lagged by {} changes, re-querying",
                        spec.collection,
                        missed
                    );
                }
                Err(RecvError::Closed) => break,
            }
            tracing::debug!("Change on {}, pushing fresh snapshot", spec.collection);
            on_change(store.query(&spec).await);
        }
    });

    Ok(Subscription {
        query,
        task: Some(task),
    })
}
