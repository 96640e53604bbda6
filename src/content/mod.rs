pub mod approval;
pub mod model;
pub mod service;
pub mod validate;

pub use approval::{confirm_delete, ApprovalStatus, DeleteConfirmation, EditPolicy};
pub use model::{ContentItem, ContentKind, ContentPage, ContentPayload, ContentQuery, ContentStats};
pub use service::ContentCoordinator;
pub use validate::{ContentDraft, LocalFile, Submission, UploadLimits};
