//! Asset upload client: binary in, URL out.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AppError;

/// A binary supplied with a create or edit action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Storage endpoint chosen for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Raw,
}

impl AssetKind {
    pub fn for_content_type(content_type: &str) -> Self {
        if content_type.trim().to_ascii_lowercase().starts_with("image/") {
            AssetKind::Image
        } else {
            AssetKind::Raw
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAsset {
    pub url: String,
    pub kind: AssetKind,
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, asset: Asset) -> Result<UploadedAsset, AppError>;
}

/// Writes assets below a local directory that the HTTP layer serves statically.
pub struct LocalAssetStore {
    root: PathBuf,
    base_url: String,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AssetUploader for LocalAssetStore {
    async fn upload(&self, asset: Asset) -> Result<UploadedAsset, AppError> {
        if asset.bytes.is_empty() {
            return Err(AppError::Upload(format!("{} is empty", asset.filename)));
        }

        let kind = AssetKind::for_content_type(&asset.content_type);
        let name = match extension(&asset.filename) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let dir = self.root.join(kind.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), &asset.bytes).await?;

        tracing::info!(
            "Stored {} asset {} ({} bytes)",
            kind.as_str(),
            name,
            asset.bytes.len()
        );

        Ok(UploadedAsset {
            url: format!("{}/{}/{}", self.base_url, kind.as_str(), name),
            kind,
        })
    }
}

/// Lower-cased alphanumeric extension of a client file name.
fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
