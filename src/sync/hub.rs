//! The content hub: cached snapshots, the views derived from them, and the live
//! subscriptions and timers that keep both current.
//!
//! Cache and derived views share one lock. A snapshot is stored and every view depending on
//! its collection is rebuilt inside the same write section, so readers only ever see a
//! cache entry together with the projections made from it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::cache::CollectionCache;
use super::calendar::{
    events_on, CalendarEngine, Carousel, MonthDirection, MonthView, SlideDirection,
};
use super::edit::SnapshotRefresher;
use super::projector::{
    filter_by_type, filter_listing, gallery_slides, group_by_year, members_by_position,
    resolve_cover_image, ActivityCard, Listing, PositionBucket, PostCard, YearIndex,
};
use crate::errors::AppError;
use crate::models::{
    non_empty, Activity, Banner, CalendarEvent, CampaignTheme, Documentation, Footer, Hotline,
    Member, Post, PostType, Resource, ResourceCategory, SiteChrome, BANNER_ID, CAMPAIGN_THEME_ID,
    DEFAULT_BANNER_URL, FOOTER_ID,
};
use crate::store::{subscribe, Collection, DocumentStore, QuerySpec, Snapshot, Subscription};

/// Collections held current by a live subscription. Everything else is read on demand.
pub const LIVE_COLLECTIONS: [Collection; 5] = [
    Collection::Posts,
    Collection::Activities,
    Collection::CalendarActivities,
    Collection::Documentations,
    Collection::Members,
];

/// Excerpt limits applied when projecting cards.
#[derive(Debug, Clone, Copy)]
pub struct ExcerptLimits {
    pub words: usize,
    pub chars: usize,
}

/// Cache plus every derived view.
struct SiteViews {
    cache: CollectionCache,
    posts: Option<Vec<Post>>,
    activities: Option<Vec<Activity>>,
    activity_index: Option<YearIndex<Activity>>,
    calendar_events: Option<Vec<CalendarEvent>>,
    calendar: CalendarEngine,
    month: MonthView,
    today: NaiveDate,
    documentations: Vec<Documentation>,
    carousel: Carousel,
    members: Option<Vec<PositionBucket>>,
    /// Bumped whenever a collection is invalidated; a read started under an older epoch
    /// is not cached.
    epochs: HashMap<Collection, u64>,
}

impl SiteViews {
    fn new(today: NaiveDate) -> Self {
        let calendar = CalendarEngine::new(today);
        Self {
            cache: CollectionCache::new(),
            posts: None,
            activities: None,
            activity_index: None,
            calendar_events: None,
            month: calendar.render(&[], today),
            calendar,
            today,
            documentations: Vec::new(),
            carousel: Carousel::default(),
            members: None,
            epochs: HashMap::new(),
        }
    }

    fn epoch(&self, collection: Collection) -> u64 {
        self.epochs.get(&collection).copied().unwrap_or_default()
    }

    /// Drop every cached snapshot of `collection` and fence off reads already in flight.
    fn invalidate_collection(&mut self, collection: Collection) -> Vec<QuerySpec> {
        *self.epochs.entry(collection).or_default() += 1;
        self.cache.invalidate_collection(collection)
    }

    /// Store a snapshot read on demand, unless its collection was invalidated after the
    /// read began.
    fn apply_read(&mut self, snapshot: Snapshot, epoch: u64) -> bool {
        let collection = snapshot.query.collection;
        if self.epoch(collection) != epoch {
            tracing::debug!(
                "Not caching {} snapshot read before an invalidation (revision {})",
                collection,
                snapshot.revision
            );
            return false;
        }
        self.apply(snapshot)
    }

    /// Store a snapshot and rebuild its dependents. A snapshot read at an older revision
    /// than the cached one is dropped.
    fn apply(&mut self, snapshot: Snapshot) -> bool {
        if let Some(current) = self.cache.get(&snapshot.query) {
            if current.revision > snapshot.revision {
                tracing::debug!(
                    "Dropping stale {} snapshot (revision {} < {})",
                    snapshot.query.collection,
                    snapshot.revision,
                    current.revision
                );
                return false;
            }
        }
        let key = snapshot.query.clone();
        self.cache.set(key.clone(), snapshot);
        self.reproject(&key);
        true
    }

    fn reproject(&mut self, key: &QuerySpec) {
        // Derived views come from the unfiltered listing only.
        if *key != QuerySpec::all(key.collection) {
            return;
        }
        let Some(snapshot) = self.cache.get(key) else {
            return;
        };

        match key.collection {
            Collection::Posts => self.posts = Some(snapshot.decode_all()),
            Collection::Activities => {
                let activities: Vec<Activity> = snapshot.decode_all();
                self.activity_index = Some(group_by_year(&activities));
                self.activities = Some(activities);
            }
            Collection::CalendarActivities => {
                self.calendar_events = Some(snapshot.decode_all());
                self.rebuild_month();
            }
            Collection::Documentations => {
                self.documentations = snapshot.decode_all();
                self.carousel.set_len(self.documentations.len());
            }
            Collection::Members => {
                let members: Vec<Member> = snapshot.decode_all();
                self.members = Some(members_by_position(&members));
            }
            Collection::Resources
            | Collection::Banners
            | Collection::SiteSettings
            | Collection::Hotlines
            | Collection::Footer => {}
        }
    }

    fn rebuild_month(&mut self) {
        let events = self.calendar_events.as_deref().unwrap_or_default();
        self.month = self.calendar.render(events, self.today);
    }

    fn carousel_view(&self) -> CarouselView {
        CarouselView {
            index: self.carousel.index(),
            len: self.carousel.len(),
            current: self.documentations.get(self.carousel.index()).cloned(),
            slides: self.documentations.clone(),
        }
    }
}

/// Documentation carousel as shown on the home page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselView {
    pub index: usize,
    pub len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Documentation>,
    pub slides: Vec<Documentation>,
}

/// Activities page: year buttons and the activities of the selected year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesPage {
    pub years: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_year: Option<String>,
    pub activities: Listing<ActivityCard>,
}

/// Activity detail with its slide list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetail {
    pub activity: Activity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub slides: Vec<String>,
    pub carousel: Carousel,
}

pub struct ContentHub {
    store: Arc<dyn DocumentStore>,
    views: Arc<RwLock<SiteViews>>,
    limits: ExcerptLimits,
    subscriptions: Mutex<Vec<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn read(views: &RwLock<SiteViews>) -> RwLockReadGuard<'_, SiteViews> {
    views.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(views: &RwLock<SiteViews>) -> RwLockWriteGuard<'_, SiteViews> {
    views.write().unwrap_or_else(PoisonError::into_inner)
}

impl ContentHub {
    pub fn new(store: Arc<dyn DocumentStore>, limits: ExcerptLimits) -> Self {
        Self {
            store,
            views: Arc::new(RwLock::new(SiteViews::new(today()))),
            limits,
            subscriptions: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to every live collection, then start the carousel timer and the watcher
    /// that drops on-demand snapshots when their collection changes.
    pub async fn start(&self, carousel_interval: Duration) -> Result<(), AppError> {
        for collection in LIVE_COLLECTIONS {
            let views = Arc::clone(&self.views);
            let subscription = subscribe(
                Arc::clone(&self.store),
                QuerySpec::all(collection),
                Arc::new(move |pushed: Result<Snapshot, AppError>| match pushed {
                    Ok(snapshot) => {
                        write(&views).apply(snapshot);
                    }
                    Err(e) => {
                        tracing::warn!("Push for {} failed, keeping last snapshot: {}", collection, e)
                    }
                }),
            )
            .await?;
            self.lock_subscriptions().push(subscription);
        }
        tracing::info!("Subscribed to {} live collections", LIVE_COLLECTIONS.len());

        let auto_advance = {
            let views = Arc::clone(&self.views);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + carousel_interval;
                let mut ticker = tokio::time::interval_at(start, carousel_interval);
                loop {
                    ticker.tick().await;
                    write(&views).carousel.advance(SlideDirection::Auto);
                }
            })
        };

        let watcher = {
            let views = Arc::clone(&self.views);
            let mut changes = self.store.watch();
            tokio::spawn(async move {
                loop {
                    match changes.recv().await {
                        Ok(collection) if !LIVE_COLLECTIONS.contains(&collection) => {
                            write(&views).invalidate_collection(collection);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => {
                            let mut views = write(&views);
                            for collection in Collection::ALL {
                                if !LIVE_COLLECTIONS.contains(&collection) {
                                    views.invalidate_collection(collection);
                                }
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        self.lock_tasks().extend([auto_advance, watcher]);
        Ok(())
    }

    /// Tear down subscriptions and timers.
    pub fn shutdown(&self) {
        let subscriptions: Vec<Subscription> = self.lock_subscriptions().drain(..).collect();
        let count = subscriptions.len();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        tracing::info!("Content hub stopped ({} subscriptions released)", count);
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock_subscriptions()
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached snapshot for `spec`, querying the store on a miss.
    pub async fn snapshot(&self, spec: QuerySpec) -> Result<Snapshot, AppError> {
        let epoch = {
            let views = read(&self.views);
            if let Some(cached) = views.cache.get(&spec) {
                return Ok(cached.clone());
            }
            views.epoch(spec.collection)
        };
        let fresh = self.store.query(&spec).await?;
        write(&self.views).apply_read(fresh.clone(), epoch);
        Ok(fresh)
    }

    /// Drop every cached snapshot of `collection` and re-read it, rebuilding dependents.
    pub async fn refresh(&self, collection: Collection) -> Result<(), AppError> {
        let (mut keys, epoch) = {
            let mut views = write(&self.views);
            let keys = views.invalidate_collection(collection);
            (keys, views.epoch(collection))
        };
        let live_key = QuerySpec::all(collection);
        if LIVE_COLLECTIONS.contains(&collection) && !keys.contains(&live_key) {
            keys.push(live_key);
        }

        let mut first_error = None;
        for key in keys {
            match self.store.query(&key).await {
                Ok(snapshot) => {
                    write(&self.views).apply_read(snapshot, epoch);
                }
                Err(e) => {
                    tracing::warn!("Re-reading {} failed: {}", collection, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn posts(&self, kind: Option<PostType>) -> Listing<PostCard> {
        let views = read(&self.views);
        let listing = match kind {
            Some(kind) => filter_by_type(views.posts.as_deref(), kind),
            None => filter_listing(views.posts.as_deref(), |_| true),
        };
        listing.map(|post| PostCard::project(&post, self.limits.chars))
    }

    pub async fn post(&self, id: &str) -> Result<Post, AppError> {
        let cached = read(&self.views)
            .posts
            .as_ref()
            .and_then(|posts| posts.iter().find(|p| p.id == id).cloned());
        match cached {
            Some(post) => Ok(post),
            None => self.fetch(Collection::Posts, id).await,
        }
    }

    /// Year buttons and the cards of `year`; no year (or `All`) selects every activity.
    pub fn activities(&self, year: Option<&str>) -> ActivitiesPage {
        let views = read(&self.views);
        let selected_year = year
            .map(str::trim)
            .filter(|y| !y.is_empty() && !y.eq_ignore_ascii_case("all"))
            .map(str::to_string);

        let Some(index) = views.activity_index.as_ref() else {
            return ActivitiesPage {
                years: Vec::new(),
                selected_year,
                activities: Listing::NotLoaded,
            };
        };

        let selected: Listing<Activity> = match &selected_year {
            Some(label) => Listing::from_vec(index.bucket(label).unwrap_or_default().to_vec()),
            None => filter_listing(views.activities.as_deref(), |_| true),
        };

        ActivitiesPage {
            years: index.labels().into_iter().map(str::to_string).collect(),
            selected_year,
            activities: selected.map(|a| ActivityCard::project(&a, self.limits.words)),
        }
    }

    pub async fn activity(&self, id: &str) -> Result<ActivityDetail, AppError> {
        let cached = read(&self.views)
            .activities
            .as_ref()
            .and_then(|acts| acts.iter().find(|a| a.id == id).cloned());
        let activity = match cached {
            Some(activity) => activity,
            None => self.fetch(Collection::Activities, id).await?,
        };
        let slides = gallery_slides(&activity);
        Ok(ActivityDetail {
            cover_image_url: resolve_cover_image(&activity).map(str::to_string),
            carousel: Carousel::new(slides.len()),
            slides,
            activity,
        })
    }

    pub fn calendar(&self) -> MonthView {
        let now = today();
        {
            let views = read(&self.views);
            if views.today == now {
                return views.month.clone();
            }
        }
        let mut views = write(&self.views);
        views.today = now;
        views.rebuild_month();
        views.month.clone()
    }

    pub fn navigate_calendar(&self, direction: MonthDirection) -> MonthView {
        let mut views = write(&self.views);
        views.today = today();
        views.calendar.navigate(direction);
        views.rebuild_month();
        views.month.clone()
    }

    /// Events of one day, for the day detail view.
    pub fn calendar_day(&self, date: NaiveDate) -> Listing<CalendarEvent> {
        let views = read(&self.views);
        match views.calendar_events.as_deref() {
            Some(events) => Listing::from_vec(events_on(events, date)),
            None => Listing::NotLoaded,
        }
    }

    pub fn carousel(&self) -> CarouselView {
        read(&self.views).carousel_view()
    }

    pub fn advance_carousel(&self, direction: SlideDirection) -> CarouselView {
        let mut views = write(&self.views);
        views.carousel.advance(direction);
        views.carousel_view()
    }

    pub fn members(&self) -> Listing<PositionBucket> {
        match read(&self.views).members.clone() {
            Some(buckets) => Listing::Items(buckets),
            None => Listing::NotLoaded,
        }
    }

    pub async fn resources(&self, category: ResourceCategory) -> Result<Vec<Resource>, AppError> {
        let spec = QuerySpec::all(Collection::Resources).where_eq("type", category.as_str());
        Ok(self.snapshot(spec).await?.decode_all())
    }

    pub async fn hotlines(&self) -> Result<Vec<Hotline>, AppError> {
        Ok(self
            .snapshot(QuerySpec::all(Collection::Hotlines))
            .await?
            .decode_all())
    }

    /// Banner, campaign theme, and footer. A missing banner falls back to the default image.
    pub async fn site(&self) -> Result<SiteChrome, AppError> {
        let banner: Option<Banner> = self.singleton(Collection::Banners, BANNER_ID).await?;
        let campaign_theme: Option<CampaignTheme> = self
            .singleton(Collection::SiteSettings, CAMPAIGN_THEME_ID)
            .await?;
        let footer: Option<Footer> = self.singleton(Collection::Footer, FOOTER_ID).await?;

        let banner_url = banner
            .as_ref()
            .and_then(|b| non_empty(Some(b.image_url.as_str())))
            .unwrap_or(DEFAULT_BANNER_URL)
            .to_string();

        Ok(SiteChrome {
            banner_url,
            campaign_theme,
            footer,
        })
    }

    async fn singleton<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, AppError> {
        let snapshot = self.snapshot(QuerySpec::all(collection)).await?;
        match snapshot.documents.iter().find(|d| d.id == id) {
            Some(doc) => match doc.decode() {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!("Ignoring malformed {}/{}: {}", collection, id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<T, AppError> {
        self.store
            .get_one(collection, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?
            .decode()
    }
}

#[async_trait]
impl SnapshotRefresher for ContentHub {
    async fn refresh_collection(&self, collection: Collection) -> Result<(), AppError> {
        self.refresh(collection).await
    }
}

impl Drop for ContentHub {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}
