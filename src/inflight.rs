use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{AdminError, AdminResult};
use crate::types::Operation;

/// Identity of an outstanding mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub entity: &'static str,
    pub operation: Operation,
    pub target: Option<String>,
}

impl MutationKey {
    pub fn new(entity: &'static str, operation: Operation, target: Option<&str>) -> Self {
        Self {
            entity,
            operation,
            target: target.map(str::to_string),
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} {} '{}'", self.operation, self.entity, target),
            None => write!(f, "{} {}", self.operation, self.entity),
        }
    }
}

/// Tracks outstanding mutations so controls can show busy state
#[derive(Debug, Default)]
pub struct InFlight {
    active: Mutex<HashSet<MutationKey>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<MutationKey>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a mutation outstanding until the guard drops; an identical one is refused
    pub fn begin(&self, key: MutationKey) -> AdminResult<InFlightGuard<'_>> {
        let mut active = self.lock();
        if active.contains(&key) {
            return Err(AdminError::InFlight(key.to_string()));
        }
        active.insert(key.clone());
        Ok(InFlightGuard { owner: self, key })
    }

    pub fn is_active(&self, key: &MutationKey) -> bool {
        self.lock().contains(key)
    }

    /// Any outstanding mutation on this entity
    pub fn entity_busy(&self, entity: &str) -> bool {
        self.lock().iter().any(|k| k.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[must_use = "the mutation is only tracked while the guard is alive"]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: MutationKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
