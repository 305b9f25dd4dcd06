//! View projector: pure functions from cached entities to display-ready views.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{non_empty, Activity, Member, Position, Post, PostType};

/// Bucket label for activities without a year.
pub const UNKNOWN_YEAR: &str = "Unknown Year";
/// Appended to word-truncated text.
pub const ELLIPSIS: &str = "...";
/// Appended to character-truncated post excerpts.
pub const EXCERPT_MARKER: char = '…';
/// First year offered by the activity form.
pub const FIRST_ACTIVITY_YEAR: i32 = 2022;

/// A projected list that distinguishes "nothing matched" from "not loaded yet".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "items", rename_all = "camelCase")]
pub enum Listing<T> {
    NotLoaded,
    Empty,
    Items(Vec<T>),
}

impl<T> Listing<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Listing::Empty
        } else {
            Listing::Items(items)
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Listing::Items(items) => items,
            Listing::NotLoaded | Listing::Empty => &[],
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        match self {
            Listing::NotLoaded => Listing::NotLoaded,
            Listing::Empty => Listing::Empty,
            Listing::Items(items) => Listing::Items(items.into_iter().map(f).collect()),
        }
    }
}

/// Keep the items matching `keep`, in snapshot order. `None` means the snapshot is absent.
pub fn filter_listing<T: Clone>(items: Option<&[T]>, keep: impl Fn(&T) -> bool) -> Listing<T> {
    match items {
        None => Listing::NotLoaded,
        Some(items) => Listing::from_vec(items.iter().filter(|i| keep(i)).cloned().collect()),
    }
}

pub fn filter_by_type(posts: Option<&[Post]>, kind: PostType) -> Listing<Post> {
    filter_listing(posts, |p| p.kind == kind)
}

/// Activities sharing one year label, in snapshot order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBucket<T> {
    pub year: String,
    pub items: Vec<T>,
}

/// Activities partitioned by year: numeric years descending, then any non-numeric labels,
/// then the unknown-year bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearIndex<T> {
    pub buckets: Vec<YearBucket<T>>,
}

impl<T> YearIndex<T> {
    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.year.as_str()).collect()
    }

    pub fn bucket(&self, year: &str) -> Option<&[T]> {
        self.buckets
            .iter()
            .find(|b| b.year == year)
            .map(|b| b.items.as_slice())
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.items.len()).sum()
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum YearKey<'a> {
    Numeric(Reverse<i64>),
    Text(&'a str),
    Unknown,
}

fn year_key(label: &str) -> YearKey<'_> {
    if label == UNKNOWN_YEAR {
        YearKey::Unknown
    } else if let Ok(year) = label.parse::<i64>() {
        YearKey::Numeric(Reverse(year))
    } else {
        YearKey::Text(label)
    }
}

pub fn group_by_year(activities: &[Activity]) -> YearIndex<Activity> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<YearBucket<Activity>> = Vec::new();

    for activity in activities {
        let label = activity
            .year
            .clone()
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string());
        let slot = *positions.entry(label.clone()).or_insert_with(|| {
            buckets.push(YearBucket {
                year: label,
                items: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[slot].items.push(activity.clone());
    }

    // Stable sort keeps the snapshot order inside equal keys.
    buckets.sort_by(|a, b| year_key(&a.year).cmp(&year_key(&b.year)));
    YearIndex { buckets }
}

/// Keep the first `word_limit` whitespace-separated words, joined by single spaces, with
/// `...` glued to the last kept word. Text within the limit is returned untouched.
///
/// Because the marker is glued rather than spaced, truncated output re-measures at exactly
/// `word_limit` words, so applying this twice yields the same text.
pub fn truncate_words(text: &str, word_limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= word_limit {
        return text.to_string();
    }
    let mut out = words[..word_limit].join(" ");
    out.push_str(ELLIPSIS);
    out
}

/// Character-based excerpt used on post cards.
pub fn excerpt_chars(text: &str, char_limit: usize) -> String {
    if text.chars().count() <= char_limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(char_limit).collect();
    out.push(EXCERPT_MARKER);
    out
}

/// Cover photo if set, else the first gallery image, else nothing.
pub fn resolve_cover_image(activity: &Activity) -> Option<&str> {
    activity
        .cover_photo()
        .or_else(|| non_empty(activity.image_urls.first().map(String::as_str)))
}

/// Slides of the activity detail carousel: the cover followed by the gallery.
pub fn gallery_slides(activity: &Activity) -> Vec<String> {
    activity
        .cover_photo()
        .into_iter()
        .chain(
            activity
                .image_urls
                .iter()
                .map(String::as_str)
                .filter(|u| !u.trim().is_empty()),
        )
        .map(str::to_string)
        .collect()
}

/// Members of one position, in snapshot order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionBucket {
    pub position: Position,
    pub members: Vec<Member>,
}

/// One bucket per position, in display order, empty buckets included.
pub fn members_by_position(members: &[Member]) -> Vec<PositionBucket> {
    Position::ALL
        .into_iter()
        .map(|position| PositionBucket {
            position,
            members: members
                .iter()
                .filter(|m| m.position == position)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Years offered by the activity form, newest first.
pub fn year_options(current_year: i32) -> Vec<i32> {
    (FIRST_ACTIVITY_YEAR..=current_year + 2).rev().collect()
}

/// Feed card for a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PostCard {
    pub fn project(post: &Post, char_limit: usize) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            excerpt: excerpt_chars(&post.description, char_limit),
            image_url: non_empty(post.image_url.as_deref()).map(str::to_string),
            created_at: post.created_at,
        }
    }
}

/// Card for an activity listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCard {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub year: String,
}

impl ActivityCard {
    pub fn project(activity: &Activity, word_limit: usize) -> Self {
        Self {
            id: activity.id.clone(),
            title: activity.title.clone(),
            excerpt: truncate_words(&activity.description, word_limit),
            cover_image_url: resolve_cover_image(activity).map(str::to_string),
            year: activity
                .year
                .clone()
                .unwrap_or_else(|| UNKNOWN_YEAR.to_string()),
        }
    }
}
