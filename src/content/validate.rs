//! Pre-submission checks for content items.
//!
//! Everything here runs before a request is built. The service re-checks the
//! same rules, since the tree snapshot used here may be stale.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::content::model::{ContentItem, ContentKind, ContentPayload};
use crate::selection::CascadingSelection;
use crate::taxonomy::model::{Classification, TaxonomyTree};

/// Length of a video-platform external id
pub const VIDEO_ID_LEN: usize = 11;

static VIDEO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("video URL pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Payload,
    Banner,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Payload => f.write_str("File"),
            FileRole::Banner => f.write_str("Banner image"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileRejection {
    #[error("file is {actual} bytes, the limit is {limit} bytes")]
    TooLarge { limit: u64, actual: u64 },

    #[error("type '{mime}' is not allowed")]
    UnsupportedType { mime: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid classification: {0}")]
    InvalidPath(String),

    #[error("Not a recognized video URL: {0}")]
    InvalidExternalReference(String),

    #[error("{role} rejected: {reason}")]
    FileRejected { role: FileRole, reason: FileRejection },
}

impl SubmissionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SubmissionError::MissingField(_) => "MISSING_FIELD",
            SubmissionError::InvalidPath(_) => "INVALID_PATH",
            SubmissionError::InvalidExternalReference(_) => "INVALID_EXTERNAL_REFERENCE",
            SubmissionError::FileRejected { .. } => "FILE_REJECTED",
        }
    }
}

/// A file picked on the operator's machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_for_extension)
            .unwrap_or("application/octet-stream");
        Ok(Self::new(file_name, mime, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_bytes: u64,
    pub max_banner_bytes: u64,
    pub payload_mime_types: Vec<String>,
    pub banner_mime_types: Vec<String>,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            max_banner_bytes: config.max_banner_bytes,
            payload_mime_types: config.payload_mime_types.clone(),
            banner_mime_types: config.banner_mime_types.clone(),
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// The authoring form: text fields, the author's classification picker and the payload inputs
#[derive(Debug, Clone)]
pub struct ContentDraft {
    pub title: String,
    pub description: String,
    pub picker: CascadingSelection,
    pub kind: ContentKind,
    pub file: Option<LocalFile>,
    pub video_url: Option<String>,
    pub banner: Option<LocalFile>,
    pub tags: Vec<String>,
    /// Payload already stored for the item being edited
    pub existing: Option<ContentPayload>,
}

impl ContentDraft {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            picker: CascadingSelection::new(),
            kind,
            file: None,
            video_url: None,
            banner: None,
            tags: Vec::new(),
            existing: None,
        }
    }

    /// Prefill an edit form from a stored item
    pub fn from_item(item: &ContentItem) -> Self {
        let mut picker = CascadingSelection::new();
        picker.select_grade(Some(item.classification.grade_id.clone()));
        picker.select_topic(Some(item.classification.topic_id.clone()));
        picker.select_section(Some(item.classification.section_id.clone()));

        let video_url = match &item.payload {
            ContentPayload::ExternalVideo { url, .. } => Some(url.clone()),
            ContentPayload::File(_) => None,
        };

        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            picker,
            kind: item.payload.kind(),
            file: None,
            video_url,
            banner: None,
            tags: item.tags.iter().cloned().collect(),
            existing: Some(item.payload.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPayload {
    File(LocalFile),
    Video { url: String, video_id: String },
    /// Editing without replacing the stored file
    KeepExisting,
}

/// A draft that passed every client-side check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub title: String,
    pub description: String,
    pub classification: Classification,
    pub kind: ContentKind,
    pub payload: UploadPayload,
    pub banner: Option<LocalFile>,
    pub tags: Vec<String>,
    /// Ask the service to put the item back into review
    pub reset_approval: bool,
}

pub fn validate_classification(
    grade_id: Option<&str>,
    topic_id: Option<&str>,
    section_id: Option<&str>,
    tree: &TaxonomyTree,
) -> Result<Classification, SubmissionError> {
    let present = |value: Option<&str>, field: &'static str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(SubmissionError::MissingField(field))
    };
    let grade_id = present(grade_id, "grade")?;
    let topic_id = present(topic_id, "topic")?;
    let section_id = present(section_id, "section")?;

    if tree.grade(&grade_id).is_none() {
        return Err(SubmissionError::InvalidPath(format!("unknown grade '{}'", grade_id)));
    }
    match tree.topic(&topic_id) {
        Some(topic) if topic.grade_id == grade_id => {}
        _ => {
            return Err(SubmissionError::InvalidPath(format!(
                "topic '{}' is not under grade '{}'",
                topic_id, grade_id
            )))
        }
    }
    match tree.section(&section_id) {
        Some(section) if section.topic_id == topic_id => {}
        _ => {
            return Err(SubmissionError::InvalidPath(format!(
                "section '{}' is not under topic '{}'",
                section_id, topic_id
            )))
        }
    }

    Ok(Classification {
        grade_id,
        topic_id,
        section_id,
    })
}

/// External id of a recognized video-platform URL
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_URL
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| id.len() == VIDEO_ID_LEN)
}

fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

pub fn check_file(file: &LocalFile, role: FileRole, limits: &UploadLimits) -> Result<(), SubmissionError> {
    let (limit, allowed) = match role {
        FileRole::Payload => (limits.max_file_bytes, &limits.payload_mime_types),
        FileRole::Banner => (limits.max_banner_bytes, &limits.banner_mime_types),
    };

    if file.size() > limit {
        return Err(SubmissionError::FileRejected {
            role,
            reason: FileRejection::TooLarge {
                limit,
                actual: file.size(),
            },
        });
    }

    let mime = base_mime(&file.mime);
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&mime)) {
        return Err(SubmissionError::FileRejected {
            role,
            reason: FileRejection::UnsupportedType { mime },
        });
    }

    Ok(())
}

/// Trimmed, de-duplicated, sorted; tags are a set
pub fn normalize_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn resolve_payload(draft: &ContentDraft, limits: &UploadLimits) -> Result<UploadPayload, SubmissionError> {
    match draft.kind {
        ContentKind::File => match (&draft.file, &draft.existing) {
            (Some(file), _) => {
                check_file(file, FileRole::Payload, limits)?;
                Ok(UploadPayload::File(file.clone()))
            }
            (None, Some(ContentPayload::File(_))) => Ok(UploadPayload::KeepExisting),
            (None, _) => Err(SubmissionError::MissingField("file")),
        },
        ContentKind::Youtube => {
            let url = draft
                .video_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or(SubmissionError::MissingField("video URL"))?;
            let video_id = extract_video_id(url)
                .ok_or_else(|| SubmissionError::InvalidExternalReference(url.to_string()))?;
            Ok(UploadPayload::Video {
                url: url.to_string(),
                video_id,
            })
        }
    }
}

pub fn validate_submission(
    draft: &ContentDraft,
    tree: &TaxonomyTree,
    limits: &UploadLimits,
) -> Result<Submission, SubmissionError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(SubmissionError::MissingField("title"));
    }

    let picked = draft.picker.state();
    let classification = validate_classification(
        picked.grade_id.as_deref(),
        picked.topic_id.as_deref(),
        picked.section_id.as_deref(),
        tree,
    )?;

    let payload = resolve_payload(draft, limits)?;

    if let Some(banner) = &draft.banner {
        check_file(banner, FileRole::Banner, limits)?;
    }

    Ok(Submission {
        title: title.to_string(),
        description: draft.description.clone(),
        classification,
        kind: draft.kind,
        payload,
        banner: draft.banner.clone(),
        tags: normalize_tags(&draft.tags),
        reset_approval: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::model::fixtures::sample_tree;

    const MB: usize = 1024 * 1024;

    fn draft_for(kind: ContentKind) -> ContentDraft {
        let mut draft = ContentDraft::new(kind);
        draft.title = "Bài giảng".into();
        draft.picker.select_grade(Some("lop-10".into()));
        draft.picker.select_topic(Some("cd-1".into()));
        draft.picker.select_section(Some("muc-a".into()));
        draft
    }

    #[test]
    fn scenario_path_validation() {
        let tree = sample_tree();
        let ok = validate_classification(Some("lop-10"), Some("cd-1"), Some("muc-a"), &tree).unwrap();
        assert_eq!(ok.section_id, "muc-a");

        let bad = validate_classification(Some("lop-10"), Some("cd-1"), Some("muc-x"), &tree);
        assert!(matches!(bad, Err(SubmissionError::InvalidPath(_))));
    }

    #[test]
    fn cross_branch_paths_are_invalid() {
        let tree = sample_tree();
        // Topic under another grade
        let err = validate_classification(Some("lop-11"), Some("cd-1"), Some("muc-a"), &tree).unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidPath(_)));
        // Section under another topic
        let err = validate_classification(Some("lop-10"), Some("cd-2"), Some("muc-a"), &tree).unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidPath(_)));
    }

    #[test]
    fn missing_ids_are_reported_by_field() {
        let tree = sample_tree();
        assert_eq!(
            validate_classification(None, Some("cd-1"), Some("muc-a"), &tree),
            Err(SubmissionError::MissingField("grade"))
        );
        assert_eq!(
            validate_classification(Some("lop-10"), Some(" "), Some("muc-a"), &tree),
            Err(SubmissionError::MissingField("topic"))
        );
        assert_eq!(
            validate_classification(Some("lop-10"), Some("cd-1"), None, &tree),
            Err(SubmissionError::MissingField("section"))
        );
    }

    #[test]
    fn extracts_video_ids() {
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("youtube.com/embed/dQw4w9WgXcQ?rel=0").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_video_id("https://m.youtube.com/shorts/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("https://example.com/video"), None);
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQextra"), None);
    }

    #[test]
    fn scenario_video_submission() {
        let tree = sample_tree();
        let mut draft = draft_for(ContentKind::Youtube);
        draft.video_url = Some("https://youtu.be/dQw4w9WgXcQ".into());
        let submission = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap();
        assert_eq!(
            submission.payload,
            UploadPayload::Video {
                url: "https://youtu.be/dQw4w9WgXcQ".into(),
                video_id: "dQw4w9WgXcQ".into(),
            }
        );

        draft.video_url = Some("https://example.com/video".into());
        let err = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidExternalReference(_)));
    }

    #[test]
    fn payload_must_match_content_kind() {
        let tree = sample_tree();
        let mut draft = draft_for(ContentKind::File);
        draft.video_url = Some("https://youtu.be/dQw4w9WgXcQ".into());
        let err = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap_err();
        assert_eq!(err, SubmissionError::MissingField("file"));

        let mut draft = draft_for(ContentKind::Youtube);
        draft.file = Some(LocalFile::new("a.pdf", "application/pdf", vec![1]));
        let err = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap_err();
        assert_eq!(err, SubmissionError::MissingField("video URL"));
    }

    #[test]
    fn blank_title_is_rejected_first() {
        let tree = sample_tree();
        let mut draft = ContentDraft::new(ContentKind::File);
        draft.title = "   ".into();
        let err = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap_err();
        assert_eq!(err, SubmissionError::MissingField("title"));
    }

    #[test]
    fn file_limits_name_the_violation() {
        let limits = UploadLimits::default();
        let big = LocalFile::new("big.pdf", "application/pdf", vec![0; 50 * MB + 1]);
        let err = check_file(&big, FileRole::Payload, &limits).unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::FileRejected { role: FileRole::Payload, reason: FileRejection::TooLarge { .. } }
        ));

        let exe = LocalFile::new("setup.exe", "application/x-msdownload", vec![0; 10]);
        let err = check_file(&exe, FileRole::Payload, &limits).unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::FileRejected { reason: FileRejection::UnsupportedType { .. }, .. }
        ));

        let banner = LocalFile::new("cover.png", "image/png", vec![0; 10 * MB + 1]);
        assert!(check_file(&banner, FileRole::Banner, &limits).is_err());
        let banner = LocalFile::new("cover.png", "IMAGE/PNG; q=1", vec![0; 1024]);
        assert!(check_file(&banner, FileRole::Banner, &limits).is_ok());

        let pdf_banner = LocalFile::new("cover.pdf", "application/pdf", vec![0; 10]);
        assert!(check_file(&pdf_banner, FileRole::Banner, &limits).is_err());
    }

    #[test]
    fn editing_may_keep_stored_file() {
        let tree = sample_tree();
        let mut draft = draft_for(ContentKind::File);
        draft.existing = Some(ContentPayload::File(crate::content::model::StoredFile {
            file_name: "old.pdf".into(),
            file_size: 10,
            mime_category: "pdf".into(),
            url: None,
        }));
        let submission = validate_submission(&draft, &tree, &UploadLimits::default()).unwrap();
        assert_eq!(submission.payload, UploadPayload::KeepExisting);
    }

    #[test]
    fn tags_are_a_set() {
        let tags = normalize_tags(&["b, a".into(), " a ".into(), "".into(), "c".into()]);
        assert_eq!(tags, ["a", "b", "c"]);
    }
}
