/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Identifier of a Grade, Topic or Section as issued by the remote service
pub type NodeId = String;

/// Identifier of a content item as issued by the remote service
pub type ContentId = String;

/// The three taxonomy levels, parent to child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Grade,
    Topic,
    Section,
}

impl NodeKind {
    /// REST collection name for this level
    pub fn collection(&self) -> &'static str {
        match self {
            NodeKind::Grade => "grades",
            NodeKind::Topic => "topics",
            NodeKind::Section => "sections",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Grade => "grade",
            NodeKind::Topic => "topic",
            NodeKind::Section => "section",
        }
    }

    /// Name of the field carrying the parent id, if this level has a parent
    pub fn parent_field(&self) -> Option<&'static str> {
        match self {
            NodeKind::Grade => None,
            NodeKind::Topic => Some("grade_id"),
            NodeKind::Section => Some("topic_id"),
        }
    }

    pub fn parent_kind(&self) -> Option<NodeKind> {
        match self {
            NodeKind::Grade => None,
            NodeKind::Topic => Some(NodeKind::Grade),
            NodeKind::Section => Some(NodeKind::Topic),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote mutations issued by the console
/// Used by in-flight tracking and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Approve,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Approve => "approve",
        };
        f.write_str(name)
    }
}
