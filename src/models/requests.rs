//! Request bodies of the admin console's create forms and singleton settings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{is_valid_year, parse_iso_date, Position, PostType, ResourceCategory};
use crate::errors::AppError;
use crate::store::{Asset, Collection, Fields};

/// A binary attached to a JSON request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPayload {
    pub filename: String,
    pub content_type: String,
    pub data_base64: String,
}

impl AssetPayload {
    pub fn decode(self) -> Result<Asset, AppError> {
        Ok(Asset {
            bytes: STANDARD.decode(self.data_base64.trim())?,
            filename: self.filename,
            content_type: self.content_type,
        })
    }
}

/// A create form. Validation runs before any upload or store call.
pub trait CreateRequest: DeserializeOwned + Send {
    const COLLECTION: Collection;

    fn validate(&self) -> Result<(), AppError>;

    /// Detach the attached asset, if any, so it can be uploaded first.
    fn take_asset(&mut self) -> Option<AssetPayload>;

    /// Document fields to store, given the URL of the uploaded asset.
    fn into_fields(self, asset_url: Option<String>) -> Fields;
}

fn require(fields: &[(&str, &str)]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Please fill all fields: {}",
            missing.join(", ")
        )))
    }
}

fn object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PostType,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for CreatePostRequest {
    const COLLECTION: Collection = Collection::Posts;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
        ])
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({
            "title": self.title.trim(),
            "description": self.description.trim(),
            "imageUrl": asset_url.unwrap_or_default(),
            "type": self.kind.as_str(),
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    pub title: String,
    pub description: String,
    pub year: String,
    /// Already-hosted gallery images
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for CreateActivityRequest {
    const COLLECTION: Collection = Collection::Activities;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
            ("year", self.year.as_str()),
        ])?;
        if !is_valid_year(self.year.trim()) {
            return Err(AppError::Validation(format!(
                "Year must be four digits, got '{}'",
                self.year
            )));
        }
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({
            "title": self.title.trim(),
            "description": self.description.trim(),
            "year": self.year.trim(),
            "imageUrl": asset_url.unwrap_or_default(),
            "imageUrls": self.image_urls,
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCalendarEventRequest {
    pub title: String,
    pub description: String,
    pub date: String,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for CreateCalendarEventRequest {
    const COLLECTION: Collection = Collection::CalendarActivities;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
            ("date", self.date.as_str()),
        ])?;
        if parse_iso_date(&self.date).is_none() {
            return Err(AppError::Validation(format!(
                "Date must be a valid YYYY-MM-DD calendar date, got '{}'",
                self.date
            )));
        }
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({
            "title": self.title.trim(),
            "description": self.description.trim(),
            "date": self.date.trim(),
            "imageUrl": asset_url.unwrap_or_default(),
        }))
    }
}

/// A resource is either an uploaded file or a link to an external document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub category: ResourceCategory,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
    #[serde(default)]
    pub file_url: Option<String>,
}

impl CreateRequest for CreateResourceRequest {
    const COLLECTION: Collection = Collection::Resources;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
        ])?;
        let has_url = self
            .file_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        match (self.asset.is_some(), has_url) {
            (true, false) | (false, true) => Ok(()),
            (false, false) => Err(AppError::Validation(
                "Please fill all fields: file or fileUrl".to_string(),
            )),
            (true, true) => Err(AppError::Validation(
                "Provide either a file or a fileUrl, not both".to_string(),
            )),
        }
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        let file_url = asset_url
            .or(self.file_url.map(|u| u.trim().to_string()))
            .unwrap_or_default();
        object(json!({
            "title": self.title.trim(),
            "description": self.description.trim(),
            "fileUrl": file_url,
            "type": self.category.as_str(),
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub name: String,
    pub role: String,
    pub position: Position,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for CreateMemberRequest {
    const COLLECTION: Collection = Collection::Members;

    fn validate(&self) -> Result<(), AppError> {
        require(&[("name", self.name.as_str()), ("role", self.role.as_str())])?;
        if self.asset.is_none() {
            return Err(AppError::Validation("A member needs a photo".to_string()));
        }
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({
            "name": self.name.trim(),
            "role": self.role.trim(),
            "position": self.position.as_str(),
            "photoURL": asset_url.unwrap_or_default(),
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentationRequest {
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for CreateDocumentationRequest {
    const COLLECTION: Collection = Collection::Documentations;

    fn validate(&self) -> Result<(), AppError> {
        if self.asset.is_none() {
            return Err(AppError::Validation("Select an image first".to_string()));
        }
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({ "imageUrl": asset_url.unwrap_or_default() }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHotlineRequest {
    pub category: String,
    pub name: String,
    pub number: String,
}

impl CreateRequest for CreateHotlineRequest {
    const COLLECTION: Collection = Collection::Hotlines;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("category", self.category.as_str()),
            ("name", self.name.as_str()),
            ("number", self.number.as_str()),
        ])
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        None
    }

    fn into_fields(self, _asset_url: Option<String>) -> Fields {
        object(json!({
            "category": self.category.trim(),
            "name": self.name.trim(),
            "number": self.number.trim(),
        }))
    }
}

/// Banner replacement; the image is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBannerRequest {
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for SetBannerRequest {
    const COLLECTION: Collection = Collection::Banners;

    fn validate(&self) -> Result<(), AppError> {
        if self.asset.is_none() {
            return Err(AppError::Validation("Select a file first".to_string()));
        }
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        object(json!({ "imageUrl": asset_url.unwrap_or_default() }))
    }
}

/// Campaign theme update. Without a new image the stored one is kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCampaignThemeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub asset: Option<AssetPayload>,
}

impl CreateRequest for SetCampaignThemeRequest {
    const COLLECTION: Collection = Collection::SiteSettings;

    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        self.asset.take()
    }

    fn into_fields(self, asset_url: Option<String>) -> Fields {
        let mut fields = object(json!({
            "title": self.title.trim(),
            "description": self.description.trim(),
        }));
        if let Some(url) = asset_url {
            fields.insert("imageUrl".into(), Value::String(url));
        }
        fields
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFooterRequest {
    pub address: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub map_url: Option<String>,
}

impl CreateRequest for SetFooterRequest {
    const COLLECTION: Collection = Collection::Footer;

    fn validate(&self) -> Result<(), AppError> {
        require(&[
            ("address", self.address.as_str()),
            ("phone", self.phone.as_str()),
            ("email", self.email.as_str()),
        ])
    }

    fn take_asset(&mut self) -> Option<AssetPayload> {
        None
    }

    fn into_fields(self, _asset_url: Option<String>) -> Fields {
        let mut fields = object(json!({
            "address": self.address.trim(),
            "phone": self.phone.trim(),
            "email": self.email.trim(),
        }));
        if let Some(url) = self.map_url.filter(|u| !u.trim().is_empty()) {
            fields.insert("mapUrl".into(), Value::String(url));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> AssetPayload {
        AssetPayload {
            filename: "a.png".into(),
            content_type: "image/png".into(),
            data_base64: STANDARD.encode([0x89, 0x50, 0x4e, 0x47]),
        }
    }

    #[test]
    fn test_asset_payload_decodes_base64() {
        let asset = payload().decode().unwrap();
        assert_eq!(asset.bytes, vec![0x89, 0x50, 0x4e, 0x47]);

        let broken = AssetPayload {
            data_base64: "***".into(),
            ..payload()
        };
        assert!(matches!(broken.decode(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_post_requires_title_and_description() {
        let req: CreatePostRequest = serde_json::from_value(json!({
            "title": "Orientation", "description": " ", "type": "event"
        }))
        .unwrap();
        assert_eq!(
            req.validate().unwrap_err(),
            AppError::Validation("Please fill all fields: description".into())
        );
    }

    #[test]
    fn test_post_fields_without_asset_store_empty_image() {
        let req: CreatePostRequest = serde_json::from_value(json!({
            "title": " Orientation ", "description": "Day one", "type": "announcement"
        }))
        .unwrap();
        let fields = req.into_fields(None);
        assert_eq!(fields["title"], json!("Orientation"));
        assert_eq!(fields["imageUrl"], json!(""));
        assert_eq!(fields["type"], json!("announcement"));
    }

    #[test]
    fn test_resource_needs_exactly_one_source() {
        let mut req: CreateResourceRequest = serde_json::from_value(json!({
            "title": "RA 9710", "description": "Magna Carta of Women", "type": "gadLaws"
        }))
        .unwrap();
        assert!(req.validate().is_err());

        req.file_url = Some("https://example.org/ra9710.pdf".into());
        assert!(req.validate().is_ok());

        req.asset = Some(payload());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_activity_year_must_be_four_digits() {
        let req: CreateActivityRequest = serde_json::from_value(json!({
            "title": "Seminar", "description": "d", "year": "24"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_campaign_theme_keeps_image_without_upload() {
        let req: SetCampaignThemeRequest = serde_json::from_value(json!({
            "title": "Theme", "description": "Text"
        }))
        .unwrap();
        let fields = req.into_fields(None);
        assert!(!fields.contains_key("imageUrl"));
    }
}
