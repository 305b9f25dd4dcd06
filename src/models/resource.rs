//! Resource documents, partitioned by a fixed set of categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category tag of a resource. Fixed at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ResourceCategory {
    AccomplishmentReports,
    SpecialOrders,
    GadLaws,
    DswdAgenda,
    Genderlaws,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 5] = [
        ResourceCategory::AccomplishmentReports,
        ResourceCategory::SpecialOrders,
        ResourceCategory::GadLaws,
        ResourceCategory::DswdAgenda,
        ResourceCategory::Genderlaws,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::AccomplishmentReports => "accomplishmentReports",
            ResourceCategory::SpecialOrders => "specialOrders",
            ResourceCategory::GadLaws => "gadLaws",
            ResourceCategory::DswdAgenda => "dswdAgenda",
            ResourceCategory::Genderlaws => "genderlaws",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(rename = "type")]
    pub category: ResourceCategory,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// PDFs get a download action instead of a plain link.
    pub fn is_pdf(&self) -> bool {
        self.file_url.to_ascii_lowercase().ends_with(".pdf")
    }
}
