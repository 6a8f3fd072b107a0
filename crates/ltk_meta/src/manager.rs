//! Per-collection metadata store.
//!
//! A [`MetaManager`] owns the patched IMC files of one collection and the
//! ordered list of manipulations currently applied to them.
//!
//! # Overlay
//!
//! While the collection's overlay is active, every patched file has a virtual
//! path registered with the [`Collection`], which is what routes host loads to
//! the load hook. Deactivating removes the registrations but keeps the files
//! and their edits, so toggling a collection off and on is lossless.
//!
//! # Locking
//!
//! All file and record state sits behind one mutex. The load hook reads the
//! dirty flag and encodes the bytes while holding it, so a concurrent edit is
//! either fully visible to a load or not at all. Events are emitted after the
//! lock is released.

use crate::collection::Collection;
use crate::diagnostics::diagnostics;
use crate::error::{Error, ErrorKind, MutexResultExt, Result};
use crate::events::{EventBus, MetaEvent};
use crate::hook::HookLease;
use crate::imc::{add_or_replace, ImcEntry, ImcFile, ImcManipulation, ImcSelector};
use crate::path::{GamePath, VirtualPath};
use crate::registry::CollectionRegistry;
use crate::source::DefaultSource;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// When [`MetaManager::serve`] hands out bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Whenever a patched file exists (fresh loads).
    Always,
    /// Only if the file changed since it was last served (resident resources).
    IfDirty,
}

#[derive(Default)]
struct MetaState {
    files: HashMap<GamePath, ImcFile>,
    manipulations: Vec<ImcManipulation>,
    has_overlay: bool,
    disposed: bool,
}

pub struct MetaManager {
    collection: Arc<Collection>,
    defaults: Arc<dyn DefaultSource>,
    events: Arc<EventBus>,
    registry: Arc<CollectionRegistry>,
    verify_encoding: bool,
    state: Mutex<MetaState>,
    lease: Mutex<Option<HookLease>>,
}

/// Turn anything but a rejection into an [`Error::ApplyFault`].
fn into_apply_fault(path: &GamePath, error: Error) -> Error {
    match error {
        Error::RejectedEdit { .. } | Error::ApplyFault { .. } => error,
        other => Error::ApplyFault {
            path: path.clone(),
            reason: other.to_string(),
        },
    }
}

fn record_fault(action: &str, manip: &ImcManipulation, error: &Error) {
    diagnostics().record_apply_failure();
    tracing::error!(
        "Could not {} IMC manipulation {}: {}",
        action,
        manip.selector,
        error
    );
}

impl MetaManager {
    pub(crate) fn new(
        collection: Arc<Collection>,
        defaults: Arc<dyn DefaultSource>,
        events: Arc<EventBus>,
        registry: Arc<CollectionRegistry>,
        verify_encoding: bool,
        lease: HookLease,
    ) -> Self {
        Self {
            collection,
            defaults,
            events,
            registry,
            verify_encoding,
            state: Mutex::new(MetaState::default()),
            lease: Mutex::new(Some(lease)),
        }
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    fn name(&self) -> String {
        self.collection.name().to_string()
    }

    /// Lock the state for mutation; fails once the store is disposed.
    fn lock_live(&self) -> Result<MutexGuard<'_, MetaState>> {
        let state = self.state.lock().mutex_err()?;
        if state.disposed {
            return Err(Error::StoreDisposed(self.name()));
        }
        Ok(state)
    }

    fn register(&self, path: &GamePath) -> Result<()> {
        self.collection
            .force_file(path.clone(), self.collection.virtual_path(path))
    }

    /// Apply `manip`, replacing any live record with the same selector.
    ///
    /// The live record list is updated even when the file rejects the edit, so
    /// it always reflects what was requested. Faults other than a rejection
    /// are counted in [`Diagnostics::apply_failures`](crate::diagnostics::Diagnostics::apply_failures).
    pub fn apply_manipulation(&self, manip: ImcManipulation) -> Result<()> {
        let manip = manip.normalized();
        let path = manip.game_path();
        let result = {
            let mut state = self.lock_live()?;
            add_or_replace(&mut state.manipulations, manip);
            let has_overlay = state.has_overlay;
            self.apply_to_file(&mut state, &path, &manip)
                .and_then(|()| if has_overlay { self.register(&path) } else { Ok(()) })
        };

        match &result {
            Ok(()) => self.events.emit(MetaEvent::ManipulationApplied {
                collection: self.name(),
                path,
                manipulation: manip,
            }),
            Err(error) => {
                if error.kind() == ErrorKind::ApplyFault {
                    record_fault("apply", &manip, error);
                } else {
                    tracing::debug!("Rejected IMC manipulation {}: {}", manip.selector, error);
                }
                self.events.emit(MetaEvent::ManipulationRejected {
                    collection: self.name(),
                    path,
                    manipulation: manip,
                    reason: error.to_string(),
                });
            }
        }
        result
    }

    fn apply_to_file(
        &self,
        state: &mut MetaState,
        path: &GamePath,
        manip: &ImcManipulation,
    ) -> Result<()> {
        match state.files.entry(path.clone()) {
            Entry::Occupied(mut occupied) => occupied
                .get_mut()
                .apply(&manip.selector, manip.entry)
                .map_err(|e| into_apply_fault(path, e)),
            Entry::Vacant(vacant) => {
                let mut file = ImcFile::load(path.clone(), self.defaults.as_ref())
                    .map_err(|e| into_apply_fault(path, e))?
                    .with_verify_encoding(self.verify_encoding);
                file.apply(&manip.selector, manip.entry)
                    .map_err(|e| into_apply_fault(path, e))?;
                vacant.insert(file);
                Ok(())
            }
        }
    }

    /// Remove the live record matching `manip`'s selector and restore the host's
    /// canonical entry for it. Other edits to the same file are kept.
    ///
    /// The record is only removed once the canonical entry is back in place. A
    /// record whose edit never reached a file (it was rejected, or its file was
    /// never created) is removed without touching any file.
    pub fn revert_manipulation(&self, manip: &ImcManipulation) -> Result<()> {
        let manip = manip.normalized();
        let path = manip.game_path();
        let result = {
            let mut state = self.lock_live()?;
            let Some(index) = state.manipulations.iter().position(|m| *m == manip) else {
                return Err(Error::MissingTarget(manip.selector));
            };
            self.restore_default(&mut state, &path, &manip.selector)
                .map(|()| state.manipulations.remove(index))
        };

        match result {
            Ok(reverted) => {
                self.events.emit(MetaEvent::ManipulationReverted {
                    collection: self.name(),
                    path,
                    manipulation: reverted,
                });
                Ok(())
            }
            Err(error) => {
                if error.kind() == ErrorKind::ApplyFault {
                    record_fault("revert", &manip, &error);
                }
                Err(error)
            }
        }
    }

    fn restore_default(
        &self,
        state: &mut MetaState,
        path: &GamePath,
        selector: &ImcSelector,
    ) -> Result<()> {
        let has_overlay = state.has_overlay;
        let Some(file) = state.files.get_mut(path) else {
            tracing::debug!("Reverted {} without a patched file", selector);
            return Ok(());
        };
        if file.entry(selector).is_err() {
            tracing::debug!("Reverted {} which is out of range for {}", selector, path);
            return Ok(());
        }

        let default = self
            .defaults
            .read_default(path, selector)
            .map_err(|e| into_apply_fault(path, e))?;
        file.apply(selector, default)
            .map_err(|e| into_apply_fault(path, e))?;
        if has_overlay {
            self.register(path)?;
        }
        Ok(())
    }

    /// Drop every edit.
    ///
    /// With an active overlay each file's redirect is removed before the file is
    /// restored and released; otherwise files are restored in place. The live
    /// record list is always cleared. Per-file failures are logged and the
    /// first one is returned after all files were processed.
    pub fn reset_all(&self) -> Result<()> {
        let mut first_error = None;
        {
            let mut state = self.lock_live()?;
            if state.has_overlay {
                let files: Vec<ImcFile> = state.files.drain().map(|(_, file)| file).collect();
                for mut file in files {
                    if let Err(error) = self.collection.remove_file(file.path()) {
                        first_error.get_or_insert(error);
                    }
                    if let Err(error) = file.reset(self.defaults.as_ref()) {
                        tracing::warn!("Could not restore {}: {}", file.path(), error);
                        first_error.get_or_insert(error);
                    }
                    file.release();
                }
            } else {
                for file in state.files.values_mut() {
                    if let Err(error) = file.reset(self.defaults.as_ref()) {
                        tracing::warn!("Could not restore {}: {}", file.path(), error);
                        first_error.get_or_insert(error);
                    }
                }
            }
            state.manipulations.clear();
            self.collection.bump_generation();
        }

        tracing::info!("Reset IMC manipulations of collection {}", self.collection.name());
        self.events.emit(MetaEvent::StoreReset {
            collection: self.name(),
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Start routing loads of every patched file through this collection.
    ///
    /// Redirects are registered under the next generation, which becomes current
    /// only once every file is registered. On failure the registered redirects
    /// are removed again and the overlay stays inactive.
    pub fn activate_overlay(&self) -> Result<()> {
        let files = {
            let mut state = self.lock_live()?;
            if state.has_overlay {
                return Ok(());
            }

            let generation = self.collection.generation() + 1;
            let mut registered = Vec::with_capacity(state.files.len());
            for path in state.files.keys() {
                let target =
                    VirtualPath::new(self.collection.name(), generation, path.clone());
                if let Err(error) = self.collection.force_file(path.clone(), target) {
                    for path in &registered {
                        if let Err(rollback) = self.collection.remove_file(path) {
                            tracing::error!(
                                "Failed to roll back redirect for {}: {}",
                                path,
                                rollback
                            );
                        }
                    }
                    return Err(error);
                }
                registered.push(path.clone());
            }

            self.collection.bump_generation();
            state.has_overlay = true;
            registered.len()
        };

        tracing::info!(
            "Activated overlay of collection {} ({} files)",
            self.collection.name(),
            files
        );
        self.events.emit(MetaEvent::OverlayActivated {
            collection: self.name(),
            files,
        });
        Ok(())
    }

    /// Stop routing loads through this collection. Files and edits are kept.
    ///
    /// On failure the removed redirects are registered again and the overlay
    /// stays active.
    pub fn deactivate_overlay(&self) -> Result<()> {
        let files = {
            let mut state = self.lock_live()?;
            if !state.has_overlay {
                return Ok(());
            }

            let mut removed: Vec<&GamePath> = Vec::with_capacity(state.files.len());
            for path in state.files.keys() {
                if let Err(error) = self.collection.remove_file(path) {
                    for path in &removed {
                        if let Err(rollback) = self.register(path) {
                            tracing::error!(
                                "Failed to restore redirect for {}: {}",
                                path,
                                rollback
                            );
                        }
                    }
                    return Err(error);
                }
                removed.push(path);
            }

            let files = removed.len();
            state.has_overlay = false;
            files
        };

        tracing::info!(
            "Deactivated overlay of collection {}",
            self.collection.name()
        );
        self.events.emit(MetaEvent::OverlayDeactivated {
            collection: self.name(),
            files,
        });
        Ok(())
    }

    /// Release every file, leave the registry and give up the hook lease.
    ///
    /// Idempotent; also runs on drop.
    pub fn dispose(&self) -> Result<()> {
        {
            let mut state = self.state.lock().mutex_err()?;
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            let has_overlay = std::mem::take(&mut state.has_overlay);
            for (path, file) in state.files.drain() {
                if has_overlay {
                    if let Err(error) = self.collection.remove_file(&path) {
                        tracing::warn!("Could not remove redirect for {}: {}", path, error);
                    }
                }
                file.release();
            }
            state.manipulations.clear();
        }

        self.registry.deregister(self.collection.name(), self)?;
        let lease = self.lease.lock().mutex_err()?.take();
        if let Some(lease) = lease {
            lease.release();
        }

        tracing::info!("Disposed IMC store of collection {}", self.collection.name());
        self.events.emit(MetaEvent::StoreDisposed {
            collection: self.name(),
        });
        Ok(())
    }

    /// Patched bytes for `path`, clearing its dirty flag.
    ///
    /// Returns `None` when the overlay is inactive, the store owns no file for
    /// `path`, or `mode` is [`ServeMode::IfDirty`] and the file is clean.
    pub fn serve(&self, path: &GamePath, mode: ServeMode) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().mutex_err()?;
        if state.disposed || !state.has_overlay {
            return Ok(None);
        }
        let Some(file) = state.files.get_mut(path) else {
            return Ok(None);
        };
        if mode == ServeMode::IfDirty && !file.is_dirty() {
            return Ok(None);
        }

        let bytes = file.to_bytes()?;
        file.consume_dirty();
        diagnostics().record_override_served();
        Ok(Some(bytes))
    }

    /// Read and clear the dirty flag of the file at `path`.
    pub fn consume_dirty(&self, path: &GamePath) -> Result<bool> {
        let mut state = self.state.lock().mutex_err()?;
        Ok(state
            .files
            .get_mut(path)
            .is_some_and(|file| file.consume_dirty()))
    }

    pub fn has_overlay(&self) -> Result<bool> {
        Ok(self.state.lock().mutex_err()?.has_overlay)
    }

    pub fn is_disposed(&self) -> Result<bool> {
        Ok(self.state.lock().mutex_err()?.disposed)
    }

    /// Live records in application order.
    pub fn manipulations(&self) -> Result<Vec<ImcManipulation>> {
        Ok(self.state.lock().mutex_err()?.manipulations.clone())
    }

    /// Paths of all owned files, sorted.
    pub fn file_paths(&self) -> Result<Vec<GamePath>> {
        let mut paths: Vec<GamePath> = self
            .state
            .lock()
            .mutex_err()?
            .files
            .keys()
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Encoded bytes of the file at `path`, without touching its dirty flag.
    pub fn file_bytes(&self, path: &GamePath) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock().mutex_err()?;
        state.files.get(path).map(ImcFile::to_bytes).transpose()
    }

    /// Current patched entry for `selector`, if its file is owned.
    pub fn entry(&self, selector: &ImcSelector) -> Result<Option<ImcEntry>> {
        let state = self.state.lock().mutex_err()?;
        state
            .files
            .get(&selector.game_path())
            .map(|file| file.entry(selector))
            .transpose()
    }
}

impl Drop for MetaManager {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::warn!(
                "Failed to dispose store of collection {}: {}",
                self.collection.name(),
                error
            );
        }
    }
}
