//! Store and uploader doubles with call counting and failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::db::{init_database, SqliteDocumentStore};
use crate::errors::AppError;
use crate::store::{
    Asset, AssetKind, AssetUploader, Collection, Document, DocumentStore, Fields, QuerySpec,
    Snapshot, UploadedAsset,
};

/// A real SQLite store that counts every call and can be told to fail.
pub struct FlakyStore {
    inner: SqliteDocumentStore,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    query_delay: Mutex<Option<(Collection, Duration)>>,
    _dir: TempDir,
}

impl FlakyStore {
    pub async fn open() -> Arc<Self> {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("flaky.sqlite")).await.unwrap();
        Arc::new(Self {
            inner: SqliteDocumentStore::new(pool),
            calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            query_delay: Mutex::new(None),
            _dir: dir,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every query of `collection` for `delay` after it has read the database.
    pub fn delay_queries(&self, collection: Collection, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some((collection, delay));
    }

    pub fn clear_query_delay(&self) {
        *self.query_delay.lock().unwrap() = None;
    }

    fn enter(&self, write: bool) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = if write { &self.fail_writes } else { &self.fail_reads };
        if failing.load(Ordering::SeqCst) {
            Err(AppError::Store("injected store failure".into()))
        } else {
            Ok(())
        }
    }

    /// Seed a document without counting the call.
    pub async fn seed(&self, collection: Collection, fields: serde_json::Value) -> String {
        let fields = fields.as_object().cloned().unwrap();
        self.inner.put(collection, None, fields).await.unwrap()
    }

    pub async fn peek(&self, collection: Collection, id: &str) -> Option<Document> {
        self.inner.get_one(collection, id).await.unwrap()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn query(&self, spec: &QuerySpec) -> Result<Snapshot, AppError> {
        self.enter(false)?;
        let snapshot = self.inner.query(spec).await?;
        let delay = *self.query_delay.lock().unwrap();
        if let Some((collection, delay)) = delay {
            if collection == spec.collection {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(snapshot)
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError> {
        self.enter(false)?;
        self.inner.get_one(collection, id).await
    }

    async fn put(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, AppError> {
        self.enter(true)?;
        self.inner.put(collection, id, fields).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        self.enter(true)?;
        self.inner.delete(collection, id).await
    }

    async fn revision(&self) -> Result<i64, AppError> {
        self.enter(false)?;
        self.inner.revision().await
    }

    fn watch(&self) -> broadcast::Receiver<Collection> {
        self.inner.watch()
    }
}

/// Uploader that hands out sequential URLs without touching disk.
#[derive(Default)]
pub struct RecordingUploader {
    uploads: AtomicUsize,
    fail: AtomicBool,
    stall: AtomicBool,
}

impl RecordingUploader {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make uploads hang until the caller gives up.
    pub fn stall(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetUploader for RecordingUploader {
    async fn upload(&self, asset: Asset) -> Result<UploadedAsset, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upload("injected upload failure".into()));
        }
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = AssetKind::for_content_type(&asset.content_type);
        Ok(UploadedAsset {
            url: format!("/assets/{}/{}-{}", kind.as_str(), n, asset.filename),
            kind,
        })
    }
}

pub fn png(name: &str) -> Asset {
    Asset {
        filename: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}
