//! Name -> store lookup used by the load hook.
//!
//! The registry holds weak references only: a store is kept alive by its owner,
//! and an entry whose store was dropped resolves to `None`.

use crate::error::{Error, MutexResultExt, Result};
use crate::manager::MetaManager;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

/// Handle to a registered store.
pub type CollectionHandle = Arc<MetaManager>;

#[derive(Default)]
pub struct CollectionRegistry {
    stores: RwLock<HashMap<String, Weak<MetaManager>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under its collection name.
    ///
    /// Fails if a live store is already registered under that name. Entries
    /// whose store has been dropped are replaced.
    pub fn register(&self, store: &Arc<MetaManager>) -> Result<()> {
        let name = store.collection().name().to_string();
        let mut stores = self.stores.write().mutex_err()?;
        if let Some(existing) = stores.get(&name) {
            if existing.strong_count() > 0 {
                return Err(Error::DuplicateCollection(name));
            }
        }
        tracing::debug!("Registered store for collection {}", name);
        stores.insert(name, Arc::downgrade(store));
        Ok(())
    }

    /// Remove the entry for `name` if it points at `store`.
    pub fn deregister(&self, name: &str, store: &MetaManager) -> Result<bool> {
        let mut stores = self.stores.write().mutex_err()?;
        let matches = stores
            .get(name)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), store));
        if matches {
            stores.remove(name);
            tracing::debug!("Deregistered store for collection {}", name);
        }
        Ok(matches)
    }

    /// Look up the live store for `name`.
    pub fn resolve(&self, name: &str) -> Result<Option<CollectionHandle>> {
        Ok(self
            .stores
            .read()
            .mutex_err()?
            .get(name)
            .and_then(Weak::upgrade))
    }

    /// Number of entries whose store is still alive.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .stores
            .read()
            .mutex_err()?
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
