use std::sync::Arc;
use tracing::info;

use crate::api::{AdminApi, CredentialSource, HttpAdminApi};
use crate::config::AppConfig;
use crate::content::model::ContentKind;
use crate::content::service::ContentCoordinator;
use crate::content::validate::{ContentDraft, UploadLimits};
use crate::error::AdminResult;
use crate::taxonomy::mutation::TaxonomyCoordinator;
use crate::taxonomy::store::TreeStore;

/// Root of the admin console state.
///
/// Owns one tree store shared by the taxonomy and content coordinators.
/// Nothing here is global; build one per session and call [`reset`] on logout.
///
/// [`reset`]: AdminConsole::reset
pub struct AdminConsole {
    tree: Arc<TreeStore>,
    taxonomy: TaxonomyCoordinator,
    content: ContentCoordinator,
}

impl AdminConsole {
    pub fn new(api: Arc<dyn AdminApi>, config: &AppConfig) -> Self {
        let tree = Arc::new(TreeStore::from_config(api.clone(), &config.cache));
        let taxonomy = TaxonomyCoordinator::new(api.clone(), tree.clone());
        let content = ContentCoordinator::new(
            api,
            tree.clone(),
            config.cache.listing_ttl(),
            UploadLimits::from(&config.upload),
            config.moderation.edit_policy,
        );
        Self { tree, taxonomy, content }
    }

    /// Console backed by the HTTP adapter
    pub fn with_http(config: &AppConfig, credentials: Arc<dyn CredentialSource>) -> AdminResult<Self> {
        let api = HttpAdminApi::new(&config.api, credentials)?;
        info!(base_url = %api.base_url(), "admin console connected");
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn tree(&self) -> &Arc<TreeStore> {
        &self.tree
    }

    pub fn taxonomy(&self) -> &TaxonomyCoordinator {
        &self.taxonomy
    }

    pub fn content(&self) -> &ContentCoordinator {
        &self.content
    }

    /// Blank authoring form with its own classification picker
    pub fn new_draft(&self, kind: ContentKind) -> ContentDraft {
        ContentDraft::new(kind)
    }

    /// Forget every cached tree, listing and selection
    pub fn reset(&self) {
        self.tree.reset();
        self.content.reset();
        self.taxonomy.reset_selection();
        info!("admin console state cleared");
    }
}
