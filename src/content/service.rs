//! Content workflow: cached reads, validated submissions and approval
//! transitions against the remote service.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::AdminApi;
use crate::cache::{Entity, QueryCache, QueryKey};
use crate::content::approval::{
    self, available_actions, status_after_edit, ContentAction, DeleteConfirmation, EditPolicy,
};
use crate::content::model::{ContentItem, ContentPage, ContentQuery, ContentStats};
use crate::content::validate::{validate_submission, ContentDraft, UploadLimits};
use crate::error::{AdminError, AdminResult};
use crate::inflight::{InFlight, MutationKey};
use crate::taxonomy::model::ClassificationLabels;
use crate::taxonomy::store::TreeStore;
use crate::types::Operation;

const ENTITY: &str = "content";

/// Everything the content cache can hold
#[derive(Debug, Clone)]
pub enum ContentView {
    Page(ContentPage),
    Item(ContentItem),
    Stats(ContentStats),
}

pub struct ContentCoordinator {
    api: Arc<dyn AdminApi>,
    tree: Arc<TreeStore>,
    cache: QueryCache<ContentView>,
    limits: UploadLimits,
    edit_policy: EditPolicy,
    in_flight: InFlight,
}

impl ContentCoordinator {
    pub fn new(
        api: Arc<dyn AdminApi>,
        tree: Arc<TreeStore>,
        listing_ttl: Duration,
        limits: UploadLimits,
        edit_policy: EditPolicy,
    ) -> Self {
        Self {
            api,
            tree,
            cache: QueryCache::new(listing_ttl),
            limits,
            edit_policy,
            in_flight: InFlight::new(),
        }
    }

    pub fn actions(&self, item: &ContentItem) -> Vec<ContentAction> {
        available_actions(item.status)
    }

    pub fn is_busy(&self, operation: Operation, id: Option<&str>) -> bool {
        self.in_flight.is_active(&MutationKey::new(ENTITY, operation, id))
    }

    pub fn any_busy(&self) -> bool {
        self.in_flight.entity_busy(ENTITY)
    }

    pub async fn list(&self, query: &ContentQuery) -> AdminResult<ContentPage> {
        let key = QueryKey::with_params(Entity::ContentList, query.to_params());
        if let Some(ContentView::Page(page)) = self.cache.get(&key) {
            debug!(params = ?key.params, "serving cached content listing");
            return Ok(page);
        }

        let ticket = self.cache.begin(key);
        let page = self.api.list_content(query).await?;
        self.cache.complete(ticket, ContentView::Page(page.clone()));
        Ok(page)
    }

    pub async fn get(&self, id: &str) -> AdminResult<ContentItem> {
        let key = QueryKey::new(Entity::ContentDetail).param("id", id);
        if let Some(ContentView::Item(item)) = self.cache.get(&key) {
            return Ok(item);
        }

        let ticket = self.cache.begin(key);
        let item = self.api.get_content(id).await?;
        self.cache.complete(ticket, ContentView::Item(item.clone()));
        Ok(item)
    }

    pub async fn stats(&self) -> AdminResult<ContentStats> {
        let key = QueryKey::new(Entity::ContentStats);
        if let Some(ContentView::Stats(stats)) = self.cache.get(&key) {
            return Ok(stats);
        }

        let ticket = self.cache.begin(key);
        let stats = self.api.content_stats().await?;
        self.cache.complete(ticket, ContentView::Stats(stats));
        Ok(stats)
    }

    /// Display names for an item's classification; missing nodes read "(deleted)"
    pub async fn labels(&self, item: &ContentItem) -> AdminResult<ClassificationLabels> {
        let tree = self.tree.fetch_tree().await?;
        Ok(tree.labels(&item.classification))
    }

    /// Validate against the current tree, then create
    pub async fn submit(&self, draft: &ContentDraft) -> AdminResult<ContentItem> {
        let tree = self.tree.fetch_tree().await?;
        let submission = validate_submission(draft, &tree, &self.limits).map_err(|e| {
            debug!(code = e.error_code(), "submission blocked: {}", e);
            e
        })?;

        let _guard = self
            .in_flight
            .begin(MutationKey::new(ENTITY, Operation::Create, Some(&submission.title)))?;
        let reply = self.api.create_content(&submission).await?;
        self.invalidate();

        let item = reply
            .decode::<ContentItem>()?
            .ok_or_else(|| AdminError::invalid_response("content was saved but the reply carried no item"))?;
        info!(id = %item.id, kind = item.payload.kind().as_str(), "content submitted");
        Ok(item)
    }

    pub async fn edit(&self, item: &ContentItem, draft: &ContentDraft) -> AdminResult<ContentItem> {
        let tree = self.tree.fetch_tree().await?;
        let mut submission = validate_submission(draft, &tree, &self.limits)?;
        let next = status_after_edit(item.status, self.edit_policy);
        submission.reset_approval = item.status != next;

        let _guard = self
            .in_flight
            .begin(MutationKey::new(ENTITY, Operation::Update, Some(&item.id)))?;
        let reply = self.api.update_content(&item.id, &submission).await?;
        self.invalidate();

        // An empty reply still means the edit was stored; read it back
        let updated = match reply.decode::<ContentItem>()? {
            Some(updated) => updated,
            None => self.api.get_content(&item.id).await?,
        };
        info!(id = %item.id, status = %updated.status, reset = submission.reset_approval, "content updated");
        Ok(updated)
    }

    /// Pending → Approved; an already approved item is refused before any request
    pub async fn approve(&self, item: &ContentItem) -> AdminResult<ContentItem> {
        let next = approval::approve(&item.id, item.status).map_err(|e| {
            warn!(id = %item.id, "{}", e);
            AdminError::from(e)
        })?;

        let _guard = self
            .in_flight
            .begin(MutationKey::new(ENTITY, Operation::Approve, Some(&item.id)))?;
        self.api.approve_content(&item.id).await?;
        info!(id = %item.id, "content approved");

        self.invalidate();
        Ok(ContentItem {
            status: next,
            ..item.clone()
        })
    }

    /// Permanent removal; only reachable with an explicit confirmation
    pub async fn delete(&self, confirmation: DeleteConfirmation) -> AdminResult<()> {
        let id = confirmation.id();
        let _guard = self
            .in_flight
            .begin(MutationKey::new(ENTITY, Operation::Delete, Some(id)))?;
        self.api.delete_content(id).await?;
        info!(id, title = confirmation.title(), was = %confirmation.status(), "content deleted");

        self.invalidate();
        Ok(())
    }

    /// Drop every cached listing, detail and stats entry
    pub fn invalidate(&self) {
        let dropped = self.cache.invalidate_entities(&Entity::CONTENT);
        debug!(dropped, "content cache invalidated");
    }

    pub fn reset(&self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
