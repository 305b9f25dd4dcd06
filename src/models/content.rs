//! Posts, activities, calendar entries, and documentation images.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{non_empty, year_field};

/// Kind of a feed post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Announcement,
    Event,
}

impl PostType {
    pub const ALL: [PostType; 2] = [PostType::Announcement, PostType::Event];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Announcement => "announcement",
            PostType::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "announcement" => Some(PostType::Announcement),
            "event" => Some(PostType::Event),
            _ => None,
        }
    }
}

/// An announcement or event shown on the public feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: PostType,
    pub created_at: DateTime<Utc>,
}

/// A past or planned activity, grouped on the public site by year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "year_field")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_photo_url: Option<String>,
    /// Single image written by the admin form; acts as the cover when `coverPhotoUrl` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// The activity's own cover field, ignoring the gallery.
    pub fn cover_photo(&self) -> Option<&str> {
        non_empty(self.cover_photo_url.as_deref()).or(non_empty(self.image_url.as_deref()))
    }
}

/// A dated entry of the public calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// ISO `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.date)
    }
}

/// Parse a strict ISO calendar date.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// One slide of the documentation carousel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub id: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}
