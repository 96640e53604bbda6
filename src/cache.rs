//! Read cache keyed by a structured request descriptor.
//!
//! Invalidation drops every entry of an entity and bumps that entity's
//! generation. A read that started before the bump cannot write its result
//! back, so a listing that was in flight during a mutation never resurrects
//! pre-mutation data.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    ContentList,
    ContentDetail,
    ContentStats,
}

impl Entity {
    pub const CONTENT: [Entity; 3] = [Entity::ContentList, Entity::ContentDetail, Entity::ContentStats];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub entity: Entity,
    pub params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            params: BTreeMap::new(),
        }
    }

    pub fn with_params(entity: Entity, params: BTreeMap<String, String>) -> Self {
        Self { entity, params }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Handed out when a read starts; redeemed when it completes
#[derive(Debug)]
pub struct QueryTicket {
    key: QueryKey,
    generation: u64,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct CacheInner<V> {
    entries: HashMap<QueryKey, Entry<V>>,
    generations: HashMap<Entity, u64>,
}

pub struct QueryCache<V> {
    ttl: Duration,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                generations: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh cached value, if any
    pub fn get(&self, key: &QueryKey) -> Option<V> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn begin(&self, key: QueryKey) -> QueryTicket {
        let generation = self.lock().generations.get(&key.entity).copied().unwrap_or(0);
        QueryTicket { key, generation }
    }

    /// Store a result unless its entity was invalidated since the ticket was issued
    pub fn complete(&self, ticket: QueryTicket, value: V) -> bool {
        let mut inner = self.lock();
        let current = inner.generations.get(&ticket.key.entity).copied().unwrap_or(0);
        if current != ticket.generation {
            debug!(entity = ?ticket.key.entity, "discarding result of a read issued before invalidation");
            return false;
        }
        inner.entries.insert(
            ticket.key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drop all entries of an entity; returns how many were dropped
    pub fn invalidate_entity(&self, entity: Entity) -> usize {
        let mut inner = self.lock();
        *inner.generations.entry(entity).or_insert(0) += 1;
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.entity != entity);
        before - inner.entries.len()
    }

    pub fn invalidate_entities(&self, entities: &[Entity]) -> usize {
        entities.iter().map(|e| self.invalidate_entity(*e)).sum()
    }

    /// Forget everything (logout); in-flight reads are invalidated too
    pub fn clear(&self) {
        let mut inner = self.lock();
        for generation in inner.generations.values_mut() {
            *generation += 1;
        }
        for entity in Entity::CONTENT {
            inner.generations.entry(entity).or_insert(1);
        }
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
