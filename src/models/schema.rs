//! Which fields of each editable collection the inline editor exposes, and how an edit buffer
//! is validated before it may be written.

use std::collections::BTreeMap;

use super::{is_valid_year, parse_iso_date, Position};
use crate::errors::AppError;
use crate::store::Collection;

/// Edit surface of one collection.
#[derive(Debug, PartialEq, Eq)]
pub struct EditSchema {
    pub collection: Collection,
    /// Must be non-empty after trimming
    pub required: &'static [&'static str],
    /// Editable but may be left blank
    pub optional: &'static [&'static str],
    /// Field that receives the URL of a newly uploaded asset
    pub asset_field: Option<&'static str>,
}

const POSTS: EditSchema = EditSchema {
    collection: Collection::Posts,
    required: &["title", "description"],
    optional: &[],
    asset_field: Some("imageUrl"),
};

const ACTIVITIES: EditSchema = EditSchema {
    collection: Collection::Activities,
    required: &["title", "description"],
    optional: &["year"],
    asset_field: Some("imageUrl"),
};

const CALENDAR_ACTIVITIES: EditSchema = EditSchema {
    collection: Collection::CalendarActivities,
    required: &["title", "description", "date"],
    optional: &[],
    asset_field: Some("imageUrl"),
};

// `type` is deliberately absent: a resource's category is fixed at creation.
const RESOURCES: EditSchema = EditSchema {
    collection: Collection::Resources,
    required: &["title", "description"],
    optional: &[],
    asset_field: Some("fileUrl"),
};

const MEMBERS: EditSchema = EditSchema {
    collection: Collection::Members,
    required: &["name", "role", "position"],
    optional: &[],
    asset_field: Some("photoURL"),
};

const DOCUMENTATIONS: EditSchema = EditSchema {
    collection: Collection::Documentations,
    required: &[],
    optional: &[],
    asset_field: Some("imageUrl"),
};

const HOTLINES: EditSchema = EditSchema {
    collection: Collection::Hotlines,
    required: &["category", "name", "number"],
    optional: &[],
    asset_field: None,
};

impl EditSchema {
    /// Schema for a collection whose rows are edited in place; singletons have none.
    pub fn for_collection(collection: Collection) -> Option<&'static EditSchema> {
        match collection {
            Collection::Posts => Some(&POSTS),
            Collection::Activities => Some(&ACTIVITIES),
            Collection::CalendarActivities => Some(&CALENDAR_ACTIVITIES),
            Collection::Resources => Some(&RESOURCES),
            Collection::Members => Some(&MEMBERS),
            Collection::Documentations => Some(&DOCUMENTATIONS),
            Collection::Hotlines => Some(&HOTLINES),
            Collection::Banners | Collection::SiteSettings | Collection::Footer => None,
        }
    }

    pub fn editable(&self) -> impl Iterator<Item = &'static str> {
        self.required.iter().chain(self.optional.iter()).copied()
    }

    pub fn is_editable(&self, field: &str) -> bool {
        self.editable().any(|f| f == field)
    }

    /// Check a buffer: required fields present, then per-collection field formats.
    pub fn validate(&self, buffer: &BTreeMap<String, String>) -> Result<(), AppError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|f| buffer.get(*f).map_or(true, |v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Please fill all fields: {}",
                missing.join(", ")
            )));
        }

        let value = |f: &str| buffer.get(f).map(|v| v.trim()).unwrap_or_default();
        match self.collection {
            Collection::CalendarActivities if parse_iso_date(value("date")).is_none() => {
                Err(AppError::Validation(format!(
                    "Date must be a valid YYYY-MM-DD calendar date, got '{}'",
                    value("date")
                )))
            }
            Collection::Members if Position::parse(value("position")).is_none() => {
                Err(AppError::Validation(format!(
                    "Unknown position '{}'",
                    value("position")
                )))
            }
            Collection::Activities if !value("year").is_empty() && !is_valid_year(value("year")) => {
                Err(AppError::Validation(format!(
                    "Year must be four digits, got '{}'",
                    value("year")
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_singletons_have_no_inline_editor() {
        assert!(EditSchema::for_collection(Collection::Banners).is_none());
        assert!(EditSchema::for_collection(Collection::Footer).is_none());
        assert!(EditSchema::for_collection(Collection::Posts).is_some());
    }

    #[test]
    fn test_whitespace_only_counts_as_missing() {
        let schema = EditSchema::for_collection(Collection::Posts).unwrap();
        let err = schema
            .validate(&buffer(&[("title", "  "), ("description", "body")]))
            .unwrap_err();
        assert_eq!(
            err,
            AppError::Validation("Please fill all fields: title".into())
        );
    }

    #[test]
    fn test_calendar_date_must_be_a_real_day() {
        let schema = EditSchema::for_collection(Collection::CalendarActivities).unwrap();
        let fields = [("title", "t"), ("description", "d"), ("date", "2025-02-30")];
        assert!(matches!(
            schema.validate(&buffer(&fields)),
            Err(AppError::Validation(_))
        ));
        let fields = [("title", "t"), ("description", "d"), ("date", "2025-02-28")];
        assert!(schema.validate(&buffer(&fields)).is_ok());
    }

    #[test]
    fn test_member_position_is_a_closed_set() {
        let schema = EditSchema::for_collection(Collection::Members).unwrap();
        let fields = [("name", "n"), ("role", "r"), ("position", "Treasurer")];
        assert!(schema.validate(&buffer(&fields)).is_err());
        let fields = [("name", "n"), ("role", "r"), ("position", "Vice-Chairperson")];
        assert!(schema.validate(&buffer(&fields)).is_ok());
    }

    #[test]
    fn test_resource_type_is_not_editable() {
        let schema = EditSchema::for_collection(Collection::Resources).unwrap();
        assert!(!schema.is_editable("type"));
        assert!(schema.is_editable("title"));
    }

    #[test]
    fn test_activity_year_optional_but_checked() {
        let schema = EditSchema::for_collection(Collection::Activities).unwrap();
        let ok = [("title", "t"), ("description", "d"), ("year", "")];
        assert!(schema.validate(&buffer(&ok)).is_ok());
        let bad = [("title", "t"), ("description", "d"), ("year", "24")];
        assert!(schema.validate(&buffer(&bad)).is_err());
    }
}
