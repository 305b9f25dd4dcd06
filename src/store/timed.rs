//! Timeout decorator for the external collaborators.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    Asset, AssetUploader, Collection, Document, DocumentStore, Fields, QuerySpec, Snapshot,
    UploadedAsset,
};
use crate::errors::AppError;

/// Run `fut`, failing with `AppError::Timeout` once `limit` elapses.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("{} timed out after {:?}", what, limit);
            Err(AppError::Timeout(format!(
                "{} timed out after {} ms",
                what,
                limit.as_millis()
            )))
        }
    }
}

/// Wraps a store or uploader so that every call is bounded by `limit`.
pub struct Timed<T> {
    inner: T,
    limit: Duration,
}

impl<T> Timed<T> {
    pub fn new(inner: T, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for Timed<S> {
    async fn query(&self, spec: &QuerySpec) -> Result<Snapshot, AppError> {
        let what = format!("query {}", spec.collection);
        with_timeout(self.limit, &what, self.inner.query(spec)).await
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError> {
        let what = format!("get {}/{}", collection, id);
        with_timeout(self.limit, &what, self.inner.get_one(collection, id)).await
    }

    async fn put(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError> {
        let what = format!("put {}", collection);
        with_timeout(self.limit, &what, self.inner.put(collection, id, fields)).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let what = format!("delete {}/{}", collection, id);
        with_timeout(self.limit, &what, self.inner.delete(collection, id)).await
    }

    async fn revision(&self) -> Result<i64, AppError> {
        with_timeout(self.limit, "revision", self.inner.revision()).await
    }

    fn watch(&self) -> broadcast::Receiver<Collection> {
        self.inner.watch()
    }
}

#[async_trait]
impl<U: AssetUploader> AssetUploader for Timed<U> {
    async fn upload(&self, asset: Asset) -> Result<UploadedAsset, AppError> {
        let what = format!("upload {}", asset.filename);
        with_timeout(self.limit, &what, self.inner.upload(asset)).await
    }
}
