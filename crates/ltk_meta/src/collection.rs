//! Collections: named override profiles and their redirect tables.
//!
//! A [`Collection`] is what the host resolves game paths through. Its store
//! registers a [`VirtualPath`] for every patched file while the collection's
//! overlay is active; the host then loads the virtual path instead of the game
//! path, and the load hook fills in the patched bytes.

use crate::error::{MutexResultExt, Result};
use crate::path::{validate_collection_name, GamePath, VirtualPath};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug)]
pub struct Collection {
    name: String,
    generation: AtomicU64,
    redirects: RwLock<HashMap<GamePath, VirtualPath>>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_collection_name(&name)?;
        Ok(Self {
            name,
            generation: AtomicU64::new(0),
            redirects: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advance the generation, invalidating virtual paths built from older ones.
    ///
    /// Returns the new generation.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Virtual path for `path` under the current generation.
    pub fn virtual_path(&self, path: &GamePath) -> VirtualPath {
        VirtualPath::new(self.name.clone(), self.generation(), path.clone())
    }

    /// Redirect loads of `path` to `target`, replacing any earlier redirect.
    pub fn force_file(&self, path: GamePath, target: VirtualPath) -> Result<()> {
        tracing::debug!("Collection {}: {} -> {}", self.name, path, target);
        self.redirects.write().mutex_err()?.insert(path, target);
        Ok(())
    }

    /// Drop the redirect for `path`. Returns whether one existed.
    pub fn remove_file(&self, path: &GamePath) -> Result<bool> {
        let removed = self.redirects.write().mutex_err()?.remove(path).is_some();
        if removed {
            tracing::debug!("Collection {}: removed redirect for {}", self.name, path);
        }
        Ok(removed)
    }

    /// Where a load of `path` should go, if it is redirected.
    pub fn resolve(&self, path: &GamePath) -> Result<Option<VirtualPath>> {
        Ok(self.redirects.read().mutex_err()?.get(path).cloned())
    }

    /// Snapshot of all redirects, sorted by game path.
    pub fn redirects(&self) -> Result<Vec<(GamePath, VirtualPath)>> {
        let mut all: Vec<_> = self
            .redirects
            .read()
            .mutex_err()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }

    /// Poison the redirect table so every later access fails.
    #[cfg(test)]
    pub(crate) fn poison_redirects(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.redirects.write();
            panic!("poisoning redirect table");
        }));
    }
}
