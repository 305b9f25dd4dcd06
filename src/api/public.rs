//! Public read-only endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{respond, ApiResult};
use crate::errors::AppError;
use crate::models::{
    parse_iso_date, CalendarEvent, Hotline, Post, PostType, Resource, ResourceCategory, SiteChrome,
};
use crate::sync::calendar::{MonthDirection, MonthView, SlideDirection};
use crate::sync::hub::{ActivitiesPage, ActivityDetail, CarouselView};
use crate::sync::projector::{Listing, PositionBucket, PostCard};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivitiesQuery {
    pub year: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub direction: MonthDirection,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub direction: SlideDirection,
}

/// GET /api/posts?type= - Post cards, optionally of one type.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> ApiResult<Listing<PostCard>> {
    let outcome = match query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        None => Ok(state.hub.posts(None)),
        Some(kind) => PostType::parse(kind)
            .map(|kind| state.hub.posts(Some(kind)))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown post type '{}'", kind))),
    };
    respond(&state, outcome).await
}

/// GET /api/posts/:id - Post detail.
pub async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Post> {
    let outcome = state.hub.post(&id).await;
    respond(&state, outcome).await
}

/// GET /api/activities?year= - Year buttons and the activities of one year (all by default).
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivitiesQuery>,
) -> ApiResult<ActivitiesPage> {
    let page = state.hub.activities(query.year.as_deref());
    respond(&state, Ok(page)).await
}

/// GET /api/activities/:id - Activity detail with gallery slides.
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActivityDetail> {
    let outcome = state.hub.activity(&id).await;
    respond(&state, outcome).await
}

/// GET /api/calendar - The month currently shown.
pub async fn get_calendar(State(state): State<AppState>) -> ApiResult<MonthView> {
    let month = state.hub.calendar();
    respond(&state, Ok(month)).await
}

/// POST /api/calendar/navigate - Move one month back or forward.
pub async fn navigate_calendar(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> ApiResult<MonthView> {
    let month = state.hub.navigate_calendar(request.direction);
    respond(&state, Ok(month)).await
}

/// GET /api/calendar/days/:date - Events of one day.
pub async fn get_calendar_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Listing<CalendarEvent>> {
    let outcome = parse_iso_date(&date)
        .map(|day| state.hub.calendar_day(day))
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a YYYY-MM-DD date", date)));
    respond(&state, outcome).await
}

/// GET /api/carousel - Documentation carousel.
pub async fn get_carousel(State(state): State<AppState>) -> ApiResult<CarouselView> {
    let view = state.hub.carousel();
    respond(&state, Ok(view)).await
}

/// POST /api/carousel/advance - Manual slide change.
pub async fn advance_carousel(
    State(state): State<AppState>,
    Json(request): Json<AdvanceRequest>,
) -> ApiResult<CarouselView> {
    let view = state.hub.advance_carousel(request.direction);
    respond(&state, Ok(view)).await
}

/// GET /api/resources/:category - Resources of one category, newest first.
pub async fn list_resources(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Vec<Resource>> {
    let outcome = match ResourceCategory::parse(&category) {
        Some(category) => state.hub.resources(category).await,
        None => Err(AppError::NotFound(format!(
            "Resource category {} not found",
            category
        ))),
    };
    respond(&state, outcome).await
}

/// GET /api/members - Members bucketed by position.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Listing<PositionBucket>> {
    let members = state.hub.members();
    respond(&state, Ok(members)).await
}

/// GET /api/site - Banner, campaign theme and footer.
pub async fn get_site(State(state): State<AppState>) -> ApiResult<SiteChrome> {
    let outcome = state.hub.site().await;
    respond(&state, outcome).await
}

/// GET /api/hotlines - Emergency hotlines by category.
pub async fn list_hotlines(State(state): State<AppState>) -> ApiResult<Vec<Hotline>> {
    let outcome = state.hub.hotlines().await;
    respond(&state, outcome).await
}
