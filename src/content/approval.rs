//! Content approval lifecycle.
//!
//! `Pending` → `Approved` through an explicit approve action. There is no way
//! back to `Pending` except through an edit under
//! [`EditPolicy::RequireReapproval`]. Deletion is terminal and available from
//! both states, but only with a [`DeleteConfirmation`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::content::model::ContentItem;
use crate::types::ContentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

impl ApprovalStatus {
    pub fn from_flag(approved: bool) -> Self {
        if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Pending
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            other => Err(format!("unknown approval status '{}'", other)),
        }
    }
}

/// Actions a UI may offer for a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAction {
    Approve,
    Edit,
    Delete,
}

/// What happens to an approved item when it is edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    KeepApproval,
    RequireReapproval,
}

impl FromStr for EditPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_approval" | "keep" => Ok(EditPolicy::KeepApproval),
            "require_reapproval" | "reapprove" => Ok(EditPolicy::RequireReapproval),
            other => Err(format!("unknown edit policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Content '{0}' is already approved")]
    AlreadyApproved(ContentId),
}

pub fn available_actions(status: ApprovalStatus) -> Vec<ContentAction> {
    match status {
        ApprovalStatus::Pending => vec![ContentAction::Approve, ContentAction::Edit, ContentAction::Delete],
        ApprovalStatus::Approved => vec![ContentAction::Edit, ContentAction::Delete],
    }
}

/// The approve transition; refuses to run twice and never regresses
pub fn approve(id: &str, status: ApprovalStatus) -> Result<ApprovalStatus, ApprovalError> {
    match status {
        ApprovalStatus::Pending => Ok(ApprovalStatus::Approved),
        ApprovalStatus::Approved => Err(ApprovalError::AlreadyApproved(id.to_string())),
    }
}

pub fn status_after_edit(status: ApprovalStatus, policy: EditPolicy) -> ApprovalStatus {
    match policy {
        EditPolicy::KeepApproval => status,
        EditPolicy::RequireReapproval => ApprovalStatus::Pending,
    }
}

/// Proof that the operator confirmed a deletion; only [`confirm_delete`] builds one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    id: ContentId,
    title: String,
    status: ApprovalStatus,
}

impl DeleteConfirmation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }
}

pub fn confirm_delete(item: &ContentItem) -> DeleteConfirmation {
    DeleteConfirmation {
        id: item.id.clone(),
        title: item.title.clone(),
        status: item.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_is_one_way() {
        let status = approve("c1", ApprovalStatus::Pending).unwrap();
        assert_eq!(status, ApprovalStatus::Approved);

        let again = approve("c1", status);
        assert_eq!(again, Err(ApprovalError::AlreadyApproved("c1".into())));
    }

    #[test]
    fn approve_only_offered_while_pending() {
        assert!(available_actions(ApprovalStatus::Pending).contains(&ContentAction::Approve));
        assert!(!available_actions(ApprovalStatus::Approved).contains(&ContentAction::Approve));
        assert!(available_actions(ApprovalStatus::Approved).contains(&ContentAction::Delete));
    }

    #[test]
    fn edit_policy_decides_post_edit_status() {
        assert_eq!(
            status_after_edit(ApprovalStatus::Approved, EditPolicy::KeepApproval),
            ApprovalStatus::Approved
        );
        assert_eq!(
            status_after_edit(ApprovalStatus::Approved, EditPolicy::RequireReapproval),
            ApprovalStatus::Pending
        );
        assert_eq!("require-reapproval".parse::<EditPolicy>(), Ok(EditPolicy::RequireReapproval));
        assert!("sometimes".parse::<EditPolicy>().is_err());
    }
}
