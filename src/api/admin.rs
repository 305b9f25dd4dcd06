//! Admin console endpoints: create forms, per-row inline edit and delete, site singletons.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use super::{error, error_with_details, respond, revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    Activity, AssetPayload, CreateActivityRequest, CreateCalendarEventRequest, CreateDocumentationRequest,
    CreateHotlineRequest, CreateMemberRequest, CreatePostRequest, CreateRequest,
    CreateResourceRequest, SetBannerRequest, SetCampaignThemeRequest, SetFooterRequest, BANNER_ID,
    CAMPAIGN_THEME_ID, FOOTER_ID,
};
use crate::store::{Collection, Document, QuerySpec, Snapshot};
use crate::sync::edit::{EditController, EditState};
use crate::sync::projector::{group_by_year, year_options, YearIndex};
use crate::AppState;

type SessionKey = (Collection, String);

struct Session {
    controller: Arc<AsyncMutex<EditController>>,
    touched: Instant,
}

/// Open edit controllers, one per entity being edited. Sessions left idle longer than
/// `idle_timeout` are dropped the next time the map is used.
pub struct EditSessions {
    open: Mutex<HashMap<SessionKey, Session>>,
    idle_timeout: Duration,
}

impl EditSessions {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Lock the map, pruning idle sessions first.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, Session>> {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let before = open.len();
        open.retain(|_, session| session.touched.elapsed() < self.idle_timeout);
        if open.len() < before {
            tracing::info!("Dropped {} idle edit session(s)", before - open.len());
        }
        open
    }

    fn get(&self, collection: Collection, id: &str) -> Option<Arc<AsyncMutex<EditController>>> {
        let mut open = self.lock();
        let session = open.get_mut(&(collection, id.to_string()))?;
        session.touched = Instant::now();
        Some(Arc::clone(&session.controller))
    }

    fn get_or_open(
        &self,
        state: &AppState,
        collection: Collection,
        id: &str,
    ) -> Result<Arc<AsyncMutex<EditController>>, AppError> {
        let mut open = self.lock();
        if let Some(existing) = open.get_mut(&(collection, id.to_string())) {
            existing.touched = Instant::now();
            return Ok(Arc::clone(&existing.controller));
        }
        let controller = EditController::new(
            collection,
            id,
            state.store.clone(),
            state.uploader.clone(),
            state.hub.clone(),
        )?;
        let controller = Arc::new(AsyncMutex::new(controller));
        open.insert(
            (collection, id.to_string()),
            Session {
                controller: Arc::clone(&controller),
                touched: Instant::now(),
            },
        );
        Ok(controller)
    }

    fn close(&self, collection: Collection, id: &str) {
        self.lock().remove(&(collection, id.to_string()));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// What the console shows for a row under edit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditView {
    pub collection: Collection,
    pub id: String,
    #[serde(flatten)]
    pub state: EditState,
}

impl EditView {
    fn of(controller: &EditController) -> Self {
        Self {
            collection: controller.collection(),
            id: controller.id().to_string(),
            state: controller.state().clone(),
        }
    }
}

/// PATCH body for a row under edit.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPatch {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub asset: Option<AssetPayload>,
}

/// Console listing. Activities also come grouped by year.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListing {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_year: Option<YearIndex<Activity>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

fn parse_collection(name: &str) -> Result<Collection, AppError> {
    Collection::parse(name).ok_or_else(|| AppError::NotFound(format!("Collection {} not found", name)))
}

/// Map a singleton name from the URL to where it is stored.
fn singleton_location(kind: &str) -> Result<(Collection, &'static str), AppError> {
    match kind {
        "banner" => Ok((Collection::Banners, BANNER_ID)),
        "campaignTheme" => Ok((Collection::SiteSettings, CAMPAIGN_THEME_ID)),
        "footer" => Ok((Collection::Footer, FOOTER_ID)),
        _ => Err(AppError::NotFound(format!("Site setting {} not found", kind))),
    }
}

/// Validate a form, upload its asset if any, write it, and refresh the collection's views.
async fn write_form<R: CreateRequest>(
    state: &AppState,
    id: Option<&str>,
    body: Value,
) -> Result<Document, AppError> {
    let mut request: R = serde_json::from_value(body)?;
    request.validate()?;

    let asset_url = match request.take_asset() {
        Some(payload) => Some(state.uploader.upload(payload.decode()?).await?.url),
        None => None,
    };

    let id = state
        .store
        .put(R::COLLECTION, id, request.into_fields(asset_url))
        .await?;
    tracing::info!("Wrote {}/{}", R::COLLECTION, id);

    if let Err(e) = state.hub.refresh(R::COLLECTION).await {
        tracing::warn!("Refreshing {} after write failed: {}", R::COLLECTION, e);
    }

    state
        .store
        .get_one(R::COLLECTION, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", R::COLLECTION, id)))
}

/// GET /api/admin/:collection - Fresh listing for the console.
pub async fn admin_list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<AdminListing> {
    let outcome = match parse_collection(&collection) {
        Ok(collection) => state
            .hub
            .snapshot(QuerySpec::all(collection))
            .await
            .map(|snapshot| {
                let by_year = (collection == Collection::Activities)
                    .then(|| group_by_year(&snapshot.decode_all::<Activity>()));
                AdminListing { snapshot, by_year }
            }),
        Err(e) => Err(e),
    };
    respond(&state, outcome).await
}

/// POST /api/admin/:collection - Create from a console form.
pub async fn admin_create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Document> {
    let outcome = match parse_collection(&collection) {
        Ok(Collection::Posts) => write_form::<CreatePostRequest>(&state, None, body).await,
        Ok(Collection::Activities) => write_form::<CreateActivityRequest>(&state, None, body).await,
        Ok(Collection::CalendarActivities) => {
            write_form::<CreateCalendarEventRequest>(&state, None, body).await
        }
        Ok(Collection::Resources) => write_form::<CreateResourceRequest>(&state, None, body).await,
        Ok(Collection::Members) => write_form::<CreateMemberRequest>(&state, None, body).await,
        Ok(Collection::Documentations) => {
            write_form::<CreateDocumentationRequest>(&state, None, body).await
        }
        Ok(Collection::Hotlines) => write_form::<CreateHotlineRequest>(&state, None, body).await,
        Ok(singleton @ (Collection::Banners | Collection::SiteSettings | Collection::Footer)) => {
            Err(AppError::BadRequest(format!(
                "{} is a site setting; use /api/admin/site",
                singleton
            )))
        }
        Err(e) => Err(e),
    };
    respond(&state, outcome).await
}

/// GET /api/admin/year-options - Years offered by the activity form.
pub async fn admin_year_options(State(state): State<AppState>) -> ApiResult<Vec<i32>> {
    let years = year_options(Local::now().year());
    respond(&state, Ok(years)).await
}

/// POST /api/admin/:collection/:id/edit - Enter edit mode from a fresh copy.
pub async fn begin_edit(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<EditView> {
    let revision_id = revision(&state).await;
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };
    let controller = match state.sessions.get_or_open(&state, collection, &id) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };

    let mut controller = controller.lock().await;
    match controller.begin_edit().await {
        Ok(_) => success(EditView::of(&controller), revision_id),
        Err(e) => {
            if matches!(controller.state(), EditState::Viewing) {
                state.sessions.close(collection, &id);
            }
            error(e, revision_id)
        }
    }
}

/// PATCH /api/admin/:collection/:id/edit - Change buffered fields or attach a new asset.
pub async fn update_edit(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<EditPatch>,
) -> ApiResult<EditView> {
    let revision_id = revision(&state).await;
    let controller = match open_session(&state, &collection, &id) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };
    let mut controller = controller.lock().await;

    let applied = apply_patch(&mut controller, patch);
    let view = EditView::of(&controller);
    match applied {
        Ok(()) => success(view, revision_id),
        Err(e) => error_with_details(e, revision_id, serde_json::to_value(&view).ok()),
    }
}

fn apply_patch(controller: &mut EditController, patch: EditPatch) -> Result<(), AppError> {
    for (name, value) in patch.fields {
        controller.set_field(&name, value)?;
    }
    if let Some(payload) = patch.asset {
        controller.attach_asset(payload.decode()?)?;
    }
    Ok(())
}

fn open_session(
    state: &AppState,
    collection: &str,
    id: &str,
) -> Result<Arc<AsyncMutex<EditController>>, AppError> {
    let collection = parse_collection(collection)?;
    state
        .sessions
        .get(collection, id)
        .ok_or_else(|| AppError::NotFound(format!("No edit in progress for {}/{}", collection, id)))
}

/// POST /api/admin/:collection/:id/save - Validate and write the buffer.
///
/// On failure `error.details` carries the edit state, buffer included.
pub async fn save_edit(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<EditView> {
    let controller = match open_session(&state, &collection, &id) {
        Ok(c) => c,
        Err(e) => return error(e, revision(&state).await),
    };
    let mut controller = controller.lock().await;

    let saved = controller.save().await;
    let view = EditView::of(&controller);
    let revision_id = revision(&state).await;
    match saved {
        Ok(()) => {
            state.sessions.close(view.collection, &view.id);
            success(view, revision_id)
        }
        Err(e) => error_with_details(e, revision_id, serde_json::to_value(&view).ok()),
    }
}

/// POST /api/admin/:collection/:id/cancel - Discard the buffer.
pub async fn cancel_edit(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<EditView> {
    let revision_id = revision(&state).await;
    let controller = match open_session(&state, &collection, &id) {
        Ok(c) => c,
        Err(e) => return error(e, revision_id),
    };
    let mut controller = controller.lock().await;
    controller.cancel();
    state.sessions.close(controller.collection(), controller.id());
    success(EditView::of(&controller), revision_id)
}

/// DELETE /api/admin/:collection/:id?confirm=true - Delete a row.
pub async fn admin_delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<()> {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(e) => return error(e, revision(&state).await),
    };
    let controller = match state.sessions.get_or_open(&state, collection, &id) {
        Ok(c) => c,
        Err(e) => return error(e, revision(&state).await),
    };

    let mut controller = controller.lock().await;
    let deleted = controller.delete(params.confirm).await;
    if matches!(controller.state(), EditState::Viewing) {
        state.sessions.close(collection, &id);
    }
    respond(&state, deleted).await
}

/// PUT /api/admin/site/:kind - Set the banner, campaign theme or footer.
pub async fn set_site_setting(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Document> {
    let outcome = match singleton_location(&kind) {
        Ok((Collection::Banners, id)) => write_form::<SetBannerRequest>(&state, Some(id), body).await,
        Ok((Collection::SiteSettings, id)) => {
            write_form::<SetCampaignThemeRequest>(&state, Some(id), body).await
        }
        Ok((_, id)) => write_form::<SetFooterRequest>(&state, Some(id), body).await,
        Err(e) => Err(e),
    };
    respond(&state, outcome).await
}

/// DELETE /api/admin/site/:kind - Remove a site setting; the public site falls back to defaults.
pub async fn delete_site_setting(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<()> {
    let outcome = match singleton_location(&kind) {
        Ok((collection, id)) => match state.store.delete(collection, id).await {
            Ok(()) => {
                tracing::info!("Deleted {}/{}", collection, id);
                if let Err(e) = state.hub.refresh(collection).await {
                    tracing::warn!("Refreshing {} after delete failed: {}", collection, e);
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    respond(&state, outcome).await
}
