//! Singleton and flat-list documents: banner, campaign theme, footer, hotlines.

use serde::{Deserialize, Serialize};

/// Document id of the banner inside `banners`.
pub const BANNER_ID: &str = "site-banner";
/// Document id of the campaign theme inside `siteSettings`.
pub const CAMPAIGN_THEME_ID: &str = "campaignTheme";
/// Document id of the footer inside `footer`.
pub const FOOTER_ID: &str = "footer_data";
/// Shown when no banner has been uploaded.
pub const DEFAULT_BANNER_URL: &str = "images/4ft x 11ft Streamer.png";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTheme {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Footer {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hotline {
    pub id: String,
    pub category: String,
    pub name: String,
    pub number: String,
}

/// Everything the public layout shows around the content sections.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteChrome {
    pub banner_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_theme: Option<CampaignTheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}
