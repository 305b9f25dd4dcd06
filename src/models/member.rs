//! Staff member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display bucket of a member on the about page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Chairperson,
    #[serde(rename = "Vice-Chairperson")]
    ViceChairperson,
    Secretary,
    Member,
}

impl Position {
    /// Display order of the buckets.
    pub const ALL: [Position; 4] = [
        Position::Chairperson,
        Position::ViceChairperson,
        Position::Secretary,
        Position::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Chairperson => "Chairperson",
            Position::ViceChairperson => "Vice-Chairperson",
            Position::Secretary => "Secretary",
            Position::Member => "Member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s.trim())
    }
}

/// A staff member profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub position: Position,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
}
