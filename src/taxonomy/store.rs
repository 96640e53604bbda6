use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::AdminApi;
use crate::config::CacheConfig;
use crate::error::AdminResult;
use crate::taxonomy::model::TaxonomyTree;

#[derive(Default)]
struct StoreState {
    tree: Option<Arc<TaxonomyTree>>,
    fetched_at: Option<Instant>,
    /// Version stamped on the most recently issued fetch
    issued: u64,
    /// Version of the fetch whose tree is currently held
    applied: u64,
    /// Fetches issued at or before this version predate the last invalidation
    invalidated_through: u64,
}

/// Cached taxonomy tree with a staleness window.
///
/// Reads inside the window are served from memory. Every fetch carries a
/// version, and a response older than the tree already held is dropped.
pub struct TreeStore {
    api: Arc<dyn AdminApi>,
    staleness: Duration,
    state: Mutex<StoreState>,
}

impl TreeStore {
    pub fn new(api: Arc<dyn AdminApi>, staleness: Duration) -> Self {
        Self {
            api,
            staleness,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn from_config(api: Arc<dyn AdminApi>, config: &CacheConfig) -> Self {
        Self::new(api, config.tree_staleness())
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last applied tree, without any I/O
    pub fn current(&self) -> Option<Arc<TaxonomyTree>> {
        self.state().tree.clone()
    }

    pub fn is_fresh(&self) -> bool {
        let state = self.state();
        Self::fresh(&state, self.staleness).is_some()
    }

    fn fresh(state: &StoreState, staleness: Duration) -> Option<Arc<TaxonomyTree>> {
        if state.applied <= state.invalidated_through {
            return None;
        }
        match (&state.tree, state.fetched_at) {
            (Some(tree), Some(at)) if at.elapsed() < staleness => Some(tree.clone()),
            _ => None,
        }
    }

    /// Cached tree while fresh, otherwise a refetch
    pub async fn fetch_tree(&self) -> AdminResult<Arc<TaxonomyTree>> {
        let cached = {
            let state = self.state();
            Self::fresh(&state, self.staleness)
        };
        if let Some(tree) = cached {
            debug!("serving cached taxonomy tree");
            return Ok(tree);
        }
        self.refetch().await
    }

    /// Unconditional fetch; a superseded response resolves to the newer tree
    pub async fn refetch(&self) -> AdminResult<Arc<TaxonomyTree>> {
        let version = {
            let mut state = self.state();
            state.issued += 1;
            state.issued
        };
        debug!(version, "fetching taxonomy tree");

        let grades = self.api.fetch_tree().await.map_err(|e| {
            warn!(version, "taxonomy tree fetch failed: {}", e);
            e.into_unavailable()
        })?;
        let tree = Arc::new(TaxonomyTree::from_grades(grades));
        for warning in tree.integrity_warnings() {
            warn!("taxonomy integrity: {}", warning);
        }

        let mut state = self.state();
        if version <= state.applied {
            debug!(version, applied = state.applied, "discarding superseded taxonomy response");
            return Ok(state.tree.clone().unwrap_or(tree));
        }

        let counts = tree.counts();
        info!(
            version,
            grades = counts.grades,
            topics = counts.topics,
            sections = counts.sections,
            "taxonomy tree loaded"
        );
        state.applied = version;
        state.tree = Some(tree.clone());
        state.fetched_at = Some(Instant::now());
        Ok(tree)
    }

    /// Mark the cached tree stale so the next read refetches
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.invalidated_through = state.issued;
        debug!(through = state.issued, "taxonomy tree invalidated");
    }

    /// Forget the tree (logout); responses still in flight are discarded
    pub fn reset(&self) {
        let mut state = self.state();
        let issued = state.issued;
        *state = StoreState {
            issued,
            applied: issued,
            invalidated_through: issued,
            ..Default::default()
        };
    }
}
