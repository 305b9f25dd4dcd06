//! Data models for the organization site.
//!
//! Field names follow the stored documents (camelCase) so decoded entities and API payloads
//! share one shape.

mod content;
mod member;
mod requests;
mod resource;
mod schema;
mod site;

pub use content::*;
pub use member::*;
pub use requests::*;
pub use resource::*;
pub use schema::*;
pub use site::*;

use serde::{Deserialize, Deserializer};

/// Accept a year stored either as a string or as a number. Blank strings count as absent.
pub(crate) fn year_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Raw::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `Some` only for strings with visible content.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Four ASCII digits.
pub fn is_valid_year(year: &str) -> bool {
    year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())
}
