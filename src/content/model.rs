use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::content::approval::ApprovalStatus;
use crate::taxonomy::model::Classification;
use crate::types::{ContentId, NodeId};

/// The content-type radio on the authoring form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Youtube,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::Youtube => "youtube",
        }
    }
}

/// A file already held by the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_name: String,
    pub file_size: u64,
    pub mime_category: String,
    pub url: Option<String>,
}

/// Exactly one payload per content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    File(StoredFile),
    ExternalVideo { url: String, video_id: String },
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::File(_) => ContentKind::File,
            ContentPayload::ExternalVideo { .. } => ContentKind::Youtube,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContentRecord", into = "ContentRecord")]
pub struct ContentItem {
    pub id: ContentId,
    pub title: String,
    pub description: String,
    pub classification: Classification,
    pub payload: ContentPayload,
    pub banner_url: Option<String>,
    pub tags: BTreeSet<String>,
    pub status: ApprovalStatus,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub downloads: u64,
}

/// Flat wire shape of a content item, with the discriminator and both payload field groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub grade_id: NodeId,
    pub topic_id: NodeId,
    pub section_id: NodeId,
    pub content_type: Option<ContentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub downloads: u64,
}

impl TryFrom<ContentRecord> for ContentItem {
    type Error = String;

    fn try_from(record: ContentRecord) -> Result<Self, Self::Error> {
        // Blank strings count as absent
        let record = ContentRecord {
            file_url: present(record.file_url),
            file_name: present(record.file_name),
            file_type: present(record.file_type),
            youtube_url: present(record.youtube_url),
            youtube_id: present(record.youtube_id),
            ..record
        };
        let has_file = record.file_url.is_some() || record.file_name.is_some();
        let has_video = record.youtube_url.is_some() || record.youtube_id.is_some();

        let kind = match (record.content_type, has_file, has_video) {
            (_, true, true) => {
                return Err(format!("content '{}' carries both a file and a video", record.id))
            }
            (_, false, false) => {
                return Err(format!("content '{}' carries no payload", record.id))
            }
            (Some(kind), _, _) => kind,
            (None, true, false) => ContentKind::File,
            (None, false, true) => ContentKind::Youtube,
        };

        let payload = match kind {
            ContentKind::File if has_file => ContentPayload::File(StoredFile {
                file_name: record
                    .file_name
                    .clone()
                    .or_else(|| record.file_url.as_deref().and_then(last_path_segment))
                    .unwrap_or_default(),
                file_size: record.file_size.unwrap_or(0),
                mime_category: record.file_type.clone().unwrap_or_else(|| "other".to_string()),
                url: record.file_url.clone(),
            }),
            ContentKind::Youtube if has_video => {
                let video_id = record
                    .youtube_id
                    .clone()
                    .or_else(|| {
                        record
                            .youtube_url
                            .as_deref()
                            .and_then(crate::content::validate::extract_video_id)
                    })
                    .ok_or_else(|| format!("content '{}' has no extractable video id", record.id))?;
                ContentPayload::ExternalVideo {
                    url: record
                        .youtube_url
                        .clone()
                        .unwrap_or_else(|| format!("https://youtu.be/{}", video_id)),
                    video_id,
                }
            }
            _ => {
                return Err(format!(
                    "content '{}' is typed '{}' but carries the other payload",
                    record.id,
                    kind.as_str()
                ))
            }
        };

        Ok(ContentItem {
            id: record.id,
            title: record.title,
            description: record.description,
            classification: Classification {
                grade_id: record.grade_id,
                topic_id: record.topic_id,
                section_id: record.section_id,
            },
            payload,
            banner_url: record.banner_url,
            tags: record
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            status: ApprovalStatus::from_flag(record.is_approved),
            author_id: record.author_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            views: record.views,
            downloads: record.downloads,
        })
    }
}

impl From<ContentItem> for ContentRecord {
    fn from(item: ContentItem) -> Self {
        let mut record = ContentRecord {
            id: item.id,
            title: item.title,
            description: item.description,
            grade_id: item.classification.grade_id,
            topic_id: item.classification.topic_id,
            section_id: item.classification.section_id,
            content_type: Some(item.payload.kind()),
            banner_url: item.banner_url,
            tags: item.tags.into_iter().collect(),
            is_approved: item.status.is_approved(),
            author_id: item.author_id,
            created_at: item.created_at,
            updated_at: item.updated_at,
            views: item.views,
            downloads: item.downloads,
            ..Default::default()
        };
        match item.payload {
            ContentPayload::File(file) => {
                record.file_name = Some(file.file_name);
                record.file_size = Some(file.file_size);
                record.file_type = Some(file.mime_category);
                record.file_url = file.url;
            }
            ContentPayload::ExternalVideo { url, video_id } => {
                record.youtube_url = Some(url);
                record.youtube_id = Some(video_id);
            }
        }
        record
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

fn last_path_segment(url: &str) -> Option<String> {
    url.rsplit('/').next().filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Listing filters; also the parameter set of the listing's cache key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentQuery {
    pub status: Option<ApprovalStatus>,
    pub grade_id: Option<NodeId>,
    pub topic_id: Option<NodeId>,
    pub section_id: Option<NodeId>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ContentQuery {
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                params.insert(key.to_string(), v);
            }
        };
        put("status", self.status.map(|s| s.as_str().to_string()));
        put("grade_id", self.grade_id.clone());
        put("topic_id", self.topic_id.clone());
        put("section_id", self.section_id.clone());
        put("search", self.search.clone());
        put("page", self.page.map(|p| p.to_string()));
        put("per_page", self.per_page.map(|p| p.to_string()));
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPage {
    #[serde(default)]
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
}

fn first_page() -> u32 {
    1
}

impl ContentPage {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
}
