//! Taxonomy mutations.
//!
//! Every successful create/update/delete invalidates the tree and refetches
//! it; nothing is patched locally. Failures leave the cache and the browse
//! selection exactly as they were.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::api::{AdminApi, Committed};
use crate::error::{AdminError, AdminResult};
use crate::inflight::{InFlight, MutationKey};
use crate::selection::{CascadingSelection, SelectionField, SelectionState};
use crate::taxonomy::model::{lenient_order, Grade, Section, TaxonomyTree, Topic};
use crate::taxonomy::store::TreeStore;
use crate::types::{NodeId, NodeKind, Operation};

/// Fields shared by every taxonomy level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInput {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub order: i64,
}

impl NodeInput {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, order: i64) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            order,
        }
    }

    /// Build from raw form fields; a missing or non-numeric order becomes 0
    pub fn from_form(name: &str, slug: &str, order: Option<&str>) -> Self {
        Self::new(name, slug, Self::parse_order(order))
    }

    pub fn parse_order(raw: Option<&str>) -> i64 {
        raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
    }

    /// Trimmed copy, or per-field errors for blank name/slug
    pub fn validated(&self) -> AdminResult<NodeInput> {
        let name = self.name.trim();
        let slug = self.slug.trim();

        let mut field_errors = HashMap::new();
        if name.is_empty() {
            field_errors.insert("name".to_string(), "Name is required".to_string());
        }
        if slug.is_empty() {
            field_errors.insert("slug".to_string(), "Slug is required".to_string());
        }
        if !field_errors.is_empty() {
            return Err(AdminError::validation("Missing required fields", field_errors));
        }

        Ok(NodeInput::new(name, slug, self.order))
    }
}

/// Request body for create/update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePayload {
    pub name: String,
    pub slug: String,
    pub order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<NodeId>,
}

impl NodePayload {
    pub fn build(kind: NodeKind, parent_id: Option<&str>, input: &NodeInput) -> AdminResult<Self> {
        let input = input.validated()?;
        let parent = match kind.parent_field() {
            None => None,
            Some(field) => {
                let parent = parent_id.map(str::trim).filter(|p| !p.is_empty()).ok_or_else(|| {
                    AdminError::field(field, format!("A {} must belong to a parent", kind))
                })?;
                Some(parent.to_string())
            }
        };

        let (grade_id, topic_id) = match kind {
            NodeKind::Grade => (None, None),
            NodeKind::Topic => (parent, None),
            NodeKind::Section => (None, parent),
        };

        Ok(Self {
            name: input.name,
            slug: input.slug,
            order: input.order,
            grade_id,
            topic_id,
        })
    }
}

/// A node as echoed back by the service after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
}

impl NodeRecord {
    fn from_payload(id: &str, payload: &NodePayload) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            slug: payload.slug.clone(),
            order: payload.order,
        }
    }
}

/// Edit-form state for one node, prefilled from the node itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub kind: NodeKind,
    pub id: Option<NodeId>,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub slug: String,
    pub order: String,
}

impl NodeDraft {
    pub fn blank(kind: NodeKind, parent_id: Option<NodeId>) -> Self {
        Self {
            kind,
            id: None,
            parent_id,
            name: String::new(),
            slug: String::new(),
            order: String::new(),
        }
    }

    pub fn from_grade(grade: &Grade) -> Self {
        Self {
            kind: NodeKind::Grade,
            id: Some(grade.id.clone()),
            parent_id: None,
            name: grade.name.clone(),
            slug: grade.slug.clone(),
            order: grade.order.to_string(),
        }
    }

    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            kind: NodeKind::Topic,
            id: Some(topic.id.clone()),
            parent_id: Some(topic.grade_id.clone()),
            name: topic.name.clone(),
            slug: topic.slug.clone(),
            order: topic.order.to_string(),
        }
    }

    pub fn from_section(section: &Section) -> Self {
        Self {
            kind: NodeKind::Section,
            id: Some(section.id.clone()),
            parent_id: Some(section.topic_id.clone()),
            name: section.name.clone(),
            slug: section.slug.clone(),
            order: section.order.to_string(),
        }
    }

    pub fn input(&self) -> NodeInput {
        NodeInput::from_form(&self.name, &self.slug, Some(&self.order))
    }
}

/// The only path that mutates taxonomy state
pub struct TaxonomyCoordinator {
    api: Arc<dyn AdminApi>,
    store: Arc<TreeStore>,
    browse: Mutex<CascadingSelection>,
    in_flight: InFlight,
}

impl TaxonomyCoordinator {
    pub fn new(api: Arc<dyn AdminApi>, store: Arc<TreeStore>) -> Self {
        Self {
            api,
            store,
            browse: Mutex::new(CascadingSelection::new()),
            in_flight: InFlight::new(),
        }
    }

    pub fn store(&self) -> &Arc<TreeStore> {
        &self.store
    }

    fn browse(&self) -> MutexGuard<'_, CascadingSelection> {
        self.browse.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The admin's current Grade/Topic/Section browse selection
    pub fn selection(&self) -> SelectionState {
        self.browse().state().clone()
    }

    pub fn select(&self, field: SelectionField, value: Option<NodeId>) -> SelectionState {
        self.browse().set(field, value).clone()
    }

    pub fn topic_options(&self, tree: &TaxonomyTree) -> Vec<Topic> {
        self.browse().topic_options(tree).to_vec()
    }

    pub fn section_options(&self, tree: &TaxonomyTree) -> Vec<Section> {
        self.browse().section_options(tree).to_vec()
    }

    pub fn reset_selection(&self) {
        self.browse().reset();
    }

    pub fn is_busy(&self, kind: NodeKind, operation: Operation, target: Option<&str>) -> bool {
        self.in_flight.is_active(&MutationKey::new(kind.label(), operation, target))
    }

    pub fn any_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub async fn create_grade(&self, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.create(NodeKind::Grade, None, input).await
    }

    pub async fn update_grade(&self, id: &str, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.update(NodeKind::Grade, id, None, input).await
    }

    pub async fn delete_grade(&self, id: &str) -> AdminResult<()> {
        self.delete(NodeKind::Grade, id).await
    }

    pub async fn create_topic(&self, grade_id: &str, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.create(NodeKind::Topic, Some(grade_id), input).await
    }

    pub async fn update_topic(&self, id: &str, grade_id: &str, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.update(NodeKind::Topic, id, Some(grade_id), input).await
    }

    pub async fn delete_topic(&self, id: &str) -> AdminResult<()> {
        self.delete(NodeKind::Topic, id).await
    }

    pub async fn create_section(&self, topic_id: &str, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.create(NodeKind::Section, Some(topic_id), input).await
    }

    pub async fn update_section(&self, id: &str, topic_id: &str, input: &NodeInput) -> AdminResult<NodeRecord> {
        self.update(NodeKind::Section, id, Some(topic_id), input).await
    }

    pub async fn delete_section(&self, id: &str) -> AdminResult<()> {
        self.delete(NodeKind::Section, id).await
    }

    /// Save a prefilled edit form, creating or updating as appropriate
    pub async fn save_draft(&self, draft: &NodeDraft) -> AdminResult<NodeRecord> {
        let input = draft.input();
        let parent = draft.parent_id.as_deref();
        match &draft.id {
            Some(id) => self.update(draft.kind, id, parent, &input).await,
            None => self.create(draft.kind, parent, &input).await,
        }
    }

    async fn create(&self, kind: NodeKind, parent_id: Option<&str>, input: &NodeInput) -> AdminResult<NodeRecord> {
        let payload = NodePayload::build(kind, parent_id, input)?;
        let _guard = self
            .in_flight
            .begin(MutationKey::new(kind.label(), Operation::Create, Some(&payload.slug)))?;

        let reply = self.api.create_node(kind, &payload).await.map_err(|e| {
            warn!(%kind, slug = %payload.slug, "create failed: {}", e);
            e
        })?;

        self.reconcile().await;
        let record = self.committed_record(kind, None, &payload, reply)?;
        info!(%kind, id = %record.id, slug = %record.slug, "created");
        Ok(record)
    }

    async fn update(
        &self,
        kind: NodeKind,
        id: &str,
        parent_id: Option<&str>,
        input: &NodeInput,
    ) -> AdminResult<NodeRecord> {
        let payload = NodePayload::build(kind, parent_id, input)?;
        let _guard = self
            .in_flight
            .begin(MutationKey::new(kind.label(), Operation::Update, Some(id)))?;

        let reply = self.api.update_node(kind, id, &payload).await.map_err(|e| {
            warn!(%kind, id, "update failed: {}", e);
            e
        })?;

        self.reconcile().await;
        let record = self.committed_record(kind, Some(id), &payload, reply)?;
        info!(%kind, id, "updated");
        Ok(record)
    }

    async fn delete(&self, kind: NodeKind, id: &str) -> AdminResult<()> {
        let _guard = self
            .in_flight
            .begin(MutationKey::new(kind.label(), Operation::Delete, Some(id)))?;

        self.api.delete_node(kind, id).await.map_err(|e| {
            match &e {
                AdminError::Conflict(_) => warn!(%kind, id, "delete refused, node still has children"),
                _ => warn!(%kind, id, "delete failed: {}", e),
            }
            e
        })?;
        info!(%kind, id, "deleted");

        if self.browse().clear_deleted(kind, id) {
            info!(%kind, id, "cleared browse selection of deleted node");
        }
        self.reconcile().await;
        Ok(())
    }

    /// The echoed node, or one rebuilt from the request when the reply is empty
    /// or unreadable. A created node's id then comes from the refetched tree.
    fn committed_record(
        &self,
        kind: NodeKind,
        id: Option<&str>,
        payload: &NodePayload,
        reply: Committed,
    ) -> AdminResult<NodeRecord> {
        match reply.decode::<NodeRecord>() {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => warn!(%kind, slug = %payload.slug, "write accepted but reply unreadable: {}", e),
        }

        if let Some(id) = id {
            return Ok(NodeRecord::from_payload(id, payload));
        }
        let tree = self.store.current();
        let created = tree.as_deref().and_then(|tree| match kind {
            NodeKind::Grade => tree.grade_by_slug(&payload.slug).map(|g| g.id.clone()),
            NodeKind::Topic => payload
                .grade_id
                .as_deref()
                .and_then(|grade_id| tree.topic_by_slug(grade_id, &payload.slug))
                .map(|t| t.id.clone()),
            NodeKind::Section => payload
                .topic_id
                .as_deref()
                .and_then(|topic_id| tree.section_by_slug(topic_id, &payload.slug))
                .map(|s| s.id.clone()),
        });
        created
            .map(|id| NodeRecord::from_payload(&id, payload))
            .ok_or_else(|| {
                AdminError::invalid_response(format!(
                    "{} '{}' was saved but the reply did not identify it",
                    kind, payload.slug
                ))
            })
    }

    /// Invalidate and refetch, then drop browse selections the new tree lacks.
    /// A failed refetch leaves the cache invalidated.
    async fn reconcile(&self) {
        self.store.invalidate();
        match self.store.refetch().await {
            Ok(tree) => self.browse().prune(&tree),
            Err(e) => warn!("taxonomy refetch after mutation failed, tree stays invalidated: {}", e),
        }
    }
}
