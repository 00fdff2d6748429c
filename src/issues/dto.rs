use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

use super::repo::{IssuePatch, IssueStatus, IssueWithCreator, NewIssue};

#[derive(Debug, Deserialize)]
pub struct IssueListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub area: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub area: String,
    pub address: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub status: Option<String>,
}

/// Issue as returned by list/detail reads, creator populated.
#[derive(Debug, Serialize)]
pub struct IssueDetails {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub status: IssueStatus,
    pub created_by: Creator,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct Creator {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

impl From<IssueWithCreator> for IssueDetails {
    fn from(row: IssueWithCreator) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            kind: row.kind,
            area: row.area,
            address: row.address,
            image: row.image,
            status: row.status,
            created_by: Creator {
                id: row.created_by,
                name: row.creator_name,
                email: row.creator_email,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn is_http_url(value: &str) -> bool {
    lazy_static! {
        static ref HTTP_RE: Regex = Regex::new(r"(?i)^https?://").unwrap();
    }
    HTTP_RE.is_match(value)
}

fn check_title(title: &str, errors: &mut Vec<&'static str>) {
    if title.len() < 3 {
        errors.push("Title must be at least 3 characters");
    }
}

fn check_description(description: &str, errors: &mut Vec<&'static str>) {
    if description.len() < 6 {
        errors.push("Description must be at least 6 characters");
    }
}

fn check_kind(kind: &str, errors: &mut Vec<&'static str>) {
    if kind.len() < 2 {
        errors.push("Type must be at least 2 characters");
    }
}

fn check_area(area: &str, errors: &mut Vec<&'static str>) {
    if area.is_empty() {
        errors.push("Area is required");
    }
}

/// Trim an optional field; empty strings are stored as absent.
fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_image(image: &Option<String>, errors: &mut Vec<&'static str>) {
    if let Some(url) = image {
        if !is_http_url(url) {
            errors.push("Invalid image URL");
        }
    }
}

fn check_address(address: &Option<String>, errors: &mut Vec<&'static str>) {
    if let Some(addr) = address {
        if addr.len() < 2 {
            errors.push("Address must be at least 2 characters");
        }
    }
}

impl CreateIssueRequest {
    /// Validate all fields at once; failures carry every message, comma-joined.
    pub fn validate(self) -> Result<NewIssue, ApiError> {
        let mut errors = Vec::new();
        check_title(&self.title, &mut errors);
        check_description(&self.description, &mut errors);
        check_kind(&self.kind, &mut errors);
        check_area(&self.area, &mut errors);

        let address = normalize_optional(self.address);
        let image = normalize_optional(self.image);
        check_image(&image, &mut errors);
        check_address(&address, &mut errors);

        if !errors.is_empty() {
            return Err(ApiError::InvalidInput(errors.join(", ")));
        }

        Ok(NewIssue {
            title: self.title,
            description: self.description,
            kind: self.kind,
            area: self.area,
            address,
            image,
        })
    }
}

impl UpdateIssueRequest {
    /// Same field rules as create, every field optional. The status string is
    /// matched against the enum here so a bad value is a validation failure,
    /// not a deserialization one.
    pub fn validate(self) -> Result<IssuePatch, ApiError> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        if let Some(kind) = &self.kind {
            check_kind(kind, &mut errors);
        }
        if let Some(area) = &self.area {
            check_area(area, &mut errors);
        }

        let address = normalize_optional(self.address);
        let image = normalize_optional(self.image);
        check_image(&image, &mut errors);
        check_address(&address, &mut errors);

        let status = match self.status.as_deref() {
            Some(raw) => match IssueStatus::from_str(raw) {
                Ok(s) => Some(s),
                Err(()) => {
                    errors.push("Invalid status");
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(ApiError::InvalidInput(errors.join(", ")));
        }

        Ok(IssuePatch {
            title: self.title,
            description: self.description,
            kind: self.kind,
            area: self.area,
            address,
            image,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> CreateIssueRequest {
        CreateIssueRequest {
            title: "Streetlight out".into(),
            description: "The light on Main St has been dark for a week".into(),
            kind: "Streetlight".into(),
            area: "North".into(),
            address: Some("12 Main St".into()),
            image: Some("https://cdn.example.com/issues/1.jpg".into()),
        }
    }

    #[test]
    fn valid_payload_passes() {
        let new = valid_create().validate().unwrap();
        assert_eq!(new.title, "Streetlight out");
        assert_eq!(new.address.as_deref(), Some("12 Main St"));
    }

    #[test]
    fn short_fields_are_rejected_with_aggregated_message() {
        let req = CreateIssueRequest {
            title: "ab".into(),
            description: "short".into(),
            kind: "x".into(),
            area: "".into(),
            address: None,
            image: None,
        };
        let err = req.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Title must be at least 3 characters"));
        assert!(msg.contains("Description must be at least 6 characters"));
        assert!(msg.contains("Type must be at least 2 characters"));
        assert!(msg.contains("Area is required"));
    }

    #[test]
    fn image_must_be_http_url() {
        let mut req = valid_create();
        req.image = Some("ftp://example.com/pic.jpg".into());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid image URL"));

        let mut req = valid_create();
        req.image = Some("HTTPS://example.com/pic.jpg".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_optional_fields_become_absent() {
        let mut req = valid_create();
        req.address = Some("   ".into());
        req.image = Some("".into());
        let new = req.validate().unwrap();
        assert_eq!(new.address, None);
        assert_eq!(new.image, None);
    }

    #[test]
    fn one_char_address_is_rejected() {
        let mut req = valid_create();
        req.address = Some("x".into());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("Address must be at least 2 characters"));
    }

    #[test]
    fn empty_patch_is_valid() {
        let patch = UpdateIssueRequest::default().validate().unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn patch_parses_status_against_enum() {
        let req = UpdateIssueRequest {
            status: Some("Completed".into()),
            ..Default::default()
        };
        let patch = req.validate().unwrap();
        assert_eq!(patch.status, Some(IssueStatus::Completed));

        let req = UpdateIssueRequest {
            status: Some("Done".into()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid status"));
    }

    #[test]
    fn patch_applies_field_rules_to_present_fields_only() {
        let req = UpdateIssueRequest {
            title: Some("ab".into()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Title must be at least 3 characters");
    }
}
