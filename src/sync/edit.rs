//! Inline edit controller: the edit/save/cancel/delete lifecycle of one stored entity.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::EditSchema;
use crate::store::{Asset, AssetUploader, Collection, Document, DocumentStore, Fields};

/// Whatever keeps derived views of a collection current after a write.
#[async_trait]
pub trait SnapshotRefresher: Send + Sync {
    /// Drop cached snapshots of `collection` and re-read them.
    async fn refresh_collection(&self, collection: Collection) -> Result<(), AppError>;
}

/// Unsaved field values plus an optional replacement asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBuffer {
    pub fields: BTreeMap<String, String>,
    /// Filename of an attached asset not yet written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_asset: Option<String>,
    #[serde(skip)]
    asset: Option<Asset>,
    /// URL of an asset already uploaded by a save that then failed
    #[serde(skip)]
    uploaded_url: Option<String>,
    /// Stored fields as fetched when editing began
    #[serde(skip)]
    baseline: Fields,
}

impl EditBuffer {
    fn from_document(schema: &EditSchema, stored: Document) -> Self {
        let fields = schema
            .editable()
            .map(|name| (name.to_string(), stored.text(name).unwrap_or_default()))
            .collect();
        Self {
            fields,
            pending_asset: None,
            asset: None,
            uploaded_url: None,
            baseline: stored.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EditState {
    Viewing,
    Editing {
        buffer: EditBuffer,
        /// Validation message from the last rejected save
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The buffer stays here while the write is in flight, so an interrupted save loses nothing.
    Saving {
        buffer: EditBuffer,
    },
    ErrorDisplayed {
        buffer: EditBuffer,
        message: String,
    },
}

impl EditState {
    pub fn name(&self) -> &'static str {
        match self {
            EditState::Viewing => "viewing",
            EditState::Editing { .. } => "editing",
            EditState::Saving { .. } => "saving",
            EditState::ErrorDisplayed { .. } => "errorDisplayed",
        }
    }

    pub fn buffer(&self) -> Option<&EditBuffer> {
        match self {
            EditState::Editing { buffer, .. }
            | EditState::Saving { buffer }
            | EditState::ErrorDisplayed { buffer, .. } => Some(buffer),
            EditState::Viewing => None,
        }
    }
}

/// Edit lifecycle of one entity instance.
pub struct EditController {
    collection: Collection,
    id: String,
    schema: &'static EditSchema,
    state: EditState,
    store: Arc<dyn DocumentStore>,
    uploader: Arc<dyn AssetUploader>,
    refresher: Arc<dyn SnapshotRefresher>,
}

impl EditController {
    pub fn new(
        collection: Collection,
        id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        uploader: Arc<dyn AssetUploader>,
        refresher: Arc<dyn SnapshotRefresher>,
    ) -> Result<Self, AppError> {
        let schema = EditSchema::for_collection(collection).ok_or_else(|| {
            AppError::BadRequest(format!("{} documents are not edited inline", collection))
        })?;
        Ok(Self {
            collection,
            id: id.into(),
            schema,
            state: EditState::Viewing,
            store,
            uploader,
            refresher,
        })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Enter `Editing` with a buffer taken from a fresh copy of the stored document.
    pub async fn begin_edit(&mut self) -> Result<&EditBuffer, AppError> {
        self.recover_interrupted();
        if !matches!(self.state, EditState::Viewing) {
            return Err(AppError::BadRequest(format!(
                "{}/{} is already being edited",
                self.collection, self.id
            )));
        }

        let fresh = self
            .store
            .get_one(self.collection, &self.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", self.collection, self.id)))?;

        tracing::debug!("Editing {}/{}", self.collection, self.id);
        self.state = EditState::Editing {
            buffer: EditBuffer::from_document(self.schema, fresh),
            message: None,
        };
        self.buffer().ok_or_else(|| AppError::Internal("edit buffer missing".into()))
    }

    pub fn buffer(&self) -> Option<&EditBuffer> {
        self.state.buffer()
    }

    fn buffer_mut(&mut self) -> Result<&mut EditBuffer, AppError> {
        self.recover_interrupted();
        match &mut self.state {
            EditState::Editing { buffer, .. } | EditState::ErrorDisplayed { buffer, .. } => {
                Ok(buffer)
            }
            EditState::Viewing | EditState::Saving { .. } => Err(AppError::BadRequest(format!(
                "{}/{} is not being edited",
                self.collection, self.id
            ))),
        }
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), AppError> {
        if !self.schema.is_editable(name) {
            return Err(AppError::Validation(format!(
                "Field '{}' of {} cannot be edited",
                name, self.collection
            )));
        }
        self.buffer_mut()?
            .fields
            .insert(name.to_string(), value.into());
        Ok(())
    }

    /// Replace the entity's asset on the next save.
    pub fn attach_asset(&mut self, asset: Asset) -> Result<(), AppError> {
        if self.schema.asset_field.is_none() {
            return Err(AppError::Validation(format!(
                "{} documents carry no asset",
                self.collection
            )));
        }
        let buffer = self.buffer_mut()?;
        buffer.pending_asset = Some(asset.filename.clone());
        buffer.uploaded_url = None;
        buffer.asset = Some(asset);
        Ok(())
    }

    /// Validate, upload any new asset, write, and return to `Viewing`.
    ///
    /// A validation failure leaves the controller in `Editing` without touching the store.
    /// An upload or store failure moves it to `ErrorDisplayed` with the buffer intact.
    pub async fn save(&mut self) -> Result<(), AppError> {
        self.recover_interrupted();
        let buffer = match &self.state {
            EditState::Editing { buffer, .. } | EditState::ErrorDisplayed { buffer, .. } => {
                buffer.clone()
            }
            EditState::Viewing | EditState::Saving { .. } => {
                return Err(AppError::BadRequest(format!(
                    "{}/{} is not being edited",
                    self.collection, self.id
                )));
            }
        };

        if let Err(e) = self.schema.validate(&buffer.fields) {
            self.state = EditState::Editing {
                buffer,
                message: Some(e.message()),
            };
            return Err(e);
        }

        self.state = EditState::Saving { buffer };
        match self.write().await {
            Ok(()) => {
                tracing::info!("Saved {}/{}", self.collection, self.id);
                self.state = EditState::Viewing;
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Saving {}/{} failed: {}", self.collection, self.id, e);
                self.fail_saving(e.message());
                Err(e)
            }
        }
    }

    /// Upload the pending asset (once) and write the `Saving` buffer.
    async fn write(&mut self) -> Result<(), AppError> {
        let pending = match &self.state {
            EditState::Saving { buffer } if buffer.uploaded_url.is_none() => buffer.asset.clone(),
            _ => None,
        };
        if let Some(asset) = pending {
            let url = self.uploader.upload(asset).await?.url;
            if let EditState::Saving { buffer } = &mut self.state {
                buffer.uploaded_url = Some(url);
            }
        }

        let fields = match &self.state {
            EditState::Saving { buffer } => self.fields_for(buffer),
            _ => return Err(AppError::Internal("save lost its buffer".into())),
        };
        self.store
            .put(self.collection, Some(&self.id), fields)
            .await?;
        Ok(())
    }

    fn fields_for(&self, buffer: &EditBuffer) -> Fields {
        let mut fields: Fields = buffer
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.trim().to_string())))
            .collect();

        if let Some(asset_field) = self.schema.asset_field {
            let url = match &buffer.uploaded_url {
                Some(url) => Some(Value::String(url.clone())),
                None => buffer.baseline.get(asset_field).cloned(),
            };
            if let Some(url) = url {
                fields.insert(asset_field.to_string(), url);
            }
        }
        fields
    }

    /// Move a `Saving` controller to `ErrorDisplayed`, keeping its buffer.
    fn fail_saving(&mut self, message: String) {
        self.state = match std::mem::replace(&mut self.state, EditState::Viewing) {
            EditState::Saving { buffer } => EditState::ErrorDisplayed { buffer, message },
            other => other,
        };
    }

    /// A controller found in `Saving` outside of `save` had its save dropped mid-flight.
    fn recover_interrupted(&mut self) {
        if matches!(self.state, EditState::Saving { .. }) {
            tracing::warn!("Save of {}/{} was interrupted", self.collection, self.id);
            self.fail_saving("The last save was interrupted; check the fields and save again".into());
        }
    }

    /// Discard the buffer. Never touches the store.
    pub fn cancel(&mut self) {
        self.state = EditState::Viewing;
    }

    /// Delete the entity. Without confirmation nothing is sent to the store; on failure the
    /// controller state is left as it was.
    pub async fn delete(&mut self, confirmed: bool) -> Result<(), AppError> {
        if !confirmed {
            return Err(AppError::Validation(
                "Deletion must be confirmed".to_string(),
            ));
        }
        self.recover_interrupted();
        if !matches!(self.state, EditState::Viewing) {
            return Err(AppError::BadRequest(format!(
                "Cancel the edit of {}/{} before deleting it",
                self.collection, self.id
            )));
        }

        if let Err(e) = self.store.delete(self.collection, &self.id).await {
            tracing::error!("Deleting {}/{} failed: {}", self.collection, self.id, e);
            return Err(e);
        }
        tracing::info!("Deleted {}/{}", self.collection, self.id);
        self.refresh().await;
        Ok(())
    }

    async fn refresh(&self) {
        // The write already landed; a failed refresh only leaves views stale until the next push.
        if let Err(e) = self.refresher.refresh_collection(self.collection).await {
            tracing::warn!("Refreshing {} after write failed: {}", self.collection, e);
        }
    }
}
