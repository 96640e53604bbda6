//! Cascading Grade → Topic → Section selection.
//!
//! Setting a level clears every level below it, so a pending selection can
//! never name a Topic outside its Grade or a Section outside its Topic.

use serde::{Deserialize, Serialize};

use crate::taxonomy::model::{Section, TaxonomyTree, Topic};
use crate::types::{NodeId, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionField {
    Grade,
    Topic,
    Section,
}

impl From<NodeKind> for SelectionField {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Grade => SelectionField::Grade,
            NodeKind::Topic => SelectionField::Topic,
            NodeKind::Section => SelectionField::Section,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub grade_id: Option<NodeId>,
    pub topic_id: Option<NodeId>,
    pub section_id: Option<NodeId>,
}

impl SelectionState {
    pub fn is_empty(&self) -> bool {
        self.grade_id.is_none() && self.topic_id.is_none() && self.section_id.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.grade_id.is_some() && self.topic_id.is_some() && self.section_id.is_some()
    }
}

/// The single transition rule for every selection change
pub fn apply_selection(
    state: &SelectionState,
    field: SelectionField,
    value: Option<NodeId>,
) -> SelectionState {
    match field {
        SelectionField::Grade => SelectionState {
            grade_id: value,
            topic_id: None,
            section_id: None,
        },
        SelectionField::Topic => SelectionState {
            grade_id: state.grade_id.clone(),
            topic_id: value,
            section_id: None,
        },
        SelectionField::Section => SelectionState {
            grade_id: state.grade_id.clone(),
            topic_id: state.topic_id.clone(),
            section_id: value,
        },
    }
}

/// One independent selection engine; option lists are always derived from a tree
#[derive(Debug, Clone, Default)]
pub struct CascadingSelection {
    state: SelectionState,
}

impl CascadingSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn set(&mut self, field: SelectionField, value: Option<NodeId>) -> &SelectionState {
        self.state = apply_selection(&self.state, field, value);
        &self.state
    }

    pub fn select_grade(&mut self, grade_id: Option<NodeId>) -> &SelectionState {
        self.set(SelectionField::Grade, grade_id)
    }

    pub fn select_topic(&mut self, topic_id: Option<NodeId>) -> &SelectionState {
        self.set(SelectionField::Topic, topic_id)
    }

    pub fn select_section(&mut self, section_id: Option<NodeId>) -> &SelectionState {
        self.set(SelectionField::Section, section_id)
    }

    pub fn topic_enabled(&self) -> bool {
        self.state.grade_id.is_some()
    }

    pub fn section_enabled(&self) -> bool {
        self.state.topic_id.is_some()
    }

    pub fn topic_options<'t>(&self, tree: &'t TaxonomyTree) -> &'t [Topic] {
        match &self.state.grade_id {
            Some(grade_id) => tree.topics_of(grade_id),
            None => &[],
        }
    }

    pub fn section_options<'t>(&self, tree: &'t TaxonomyTree) -> &'t [Section] {
        match &self.state.topic_id {
            Some(topic_id) => tree.sections_of(topic_id),
            None => &[],
        }
    }

    /// Apply the cascading reset for a node that no longer exists
    pub fn clear_deleted(&mut self, kind: NodeKind, id: &str) -> bool {
        let field = SelectionField::from(kind);
        let selected = match field {
            SelectionField::Grade => &self.state.grade_id,
            SelectionField::Topic => &self.state.topic_id,
            SelectionField::Section => &self.state.section_id,
        };
        if selected.as_deref() != Some(id) {
            return false;
        }
        self.set(field, None);
        true
    }

    /// Drop selections that a refreshed tree no longer supports
    pub fn prune(&mut self, tree: &TaxonomyTree) {
        if let Some(grade_id) = self.state.grade_id.clone() {
            if tree.grade(&grade_id).is_none() {
                self.select_grade(None);
                return;
            }
        }
        if let (Some(grade_id), Some(topic_id)) = (self.state.grade_id.clone(), self.state.topic_id.clone()) {
            if !tree.topics_of(&grade_id).iter().any(|t| t.id == topic_id) {
                self.select_topic(None);
                return;
            }
        }
        if let (Some(topic_id), Some(section_id)) = (self.state.topic_id.clone(), self.state.section_id.clone()) {
            if !tree.sections_of(&topic_id).iter().any(|s| s.id == section_id) {
                self.select_section(None);
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::default();
    }
}
