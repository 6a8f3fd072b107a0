//! The process-wide load interception hook.
//!
//! One hook serves every store. It is installed into the [`HostLoader`] when the
//! first store acquires a [`HookLease`] and removed when the last lease is
//! released. The hook itself holds no per-collection state: at call time it
//! parses the collection out of the request, looks the store up in the
//! [`CollectionRegistry`] and asks the store for bytes.
//!
//! # Install transaction
//!
//! Installing subscribes the pre-load handler, then the post-load handler. If
//! the second subscription fails, the first is rolled back and the lease is
//! refused, so the host never sees half a hook.
//!
//! # Fault containment
//!
//! Handlers run on the host's threads. Every error or panic inside them is
//! caught, logged, counted in [`Diagnostics`](crate::diagnostics::Diagnostics)
//! and turned into "no override", leaving the host's own load untouched.

use crate::diagnostics::diagnostics;
use crate::error::{Error, MutexResultExt, Result};
use crate::host::{
    HandlerId, HostLoader, LoadOverride, LoadRequest, PostLoadHandler, PreLoadHandler,
    ResidentResource, ResourceType,
};
use crate::manager::ServeMode;
use crate::path::VirtualPath;
use crate::registry::CollectionRegistry;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// The two handlers, as plain functions of their request.
#[derive(Clone)]
pub struct HookDispatch {
    registry: Arc<CollectionRegistry>,
    trace: bool,
}

impl HookDispatch {
    pub fn new(registry: Arc<CollectionRegistry>, trace: bool) -> Self {
        Self { registry, trace }
    }

    fn pass(&self, reason: &str, path: &str) -> Result<Option<LoadOverride>> {
        if self.trace {
            tracing::trace!("Load hook pass-through for {}: {}", path, reason);
        }
        Ok(None)
    }

    /// Decide whether a fresh load should receive a collection's patched bytes.
    ///
    /// Serves whenever the collection owns a patched file for the path, and
    /// clears that file's dirty flag.
    pub fn pre_load(&self, request: &LoadRequest<'_>) -> Result<Option<LoadOverride>> {
        if request.resource_type != ResourceType::Imc {
            return Ok(None);
        }
        if !VirtualPath::is_virtual(request.requested) {
            return self.pass("not a virtual path", request.requested);
        }

        let vpath = VirtualPath::parse(request.requested)?;
        let Some(store) = self.registry.resolve(&vpath.collection)? else {
            return self.pass("collection not registered", request.requested);
        };

        let current = store.collection().generation();
        if vpath.generation != current && self.trace {
            tracing::trace!(
                "Request {} carries generation {}, collection is at {}",
                request.requested,
                vpath.generation,
                current
            );
        }

        let Some(bytes) = store.serve(&vpath.path, ServeMode::Always)? else {
            return self.pass("no patched file", request.requested);
        };

        tracing::debug!(
            "Loaded {} from file and replaced with IMC from collection {}",
            vpath.path,
            vpath.collection
        );
        Ok(Some(LoadOverride {
            collection: vpath.collection,
            game_path: vpath.path,
            bytes,
        }))
    }

    /// Decide whether an already-resident resource is stale.
    ///
    /// Serves only if the patched file changed since it was last served.
    pub fn post_load(&self, resource: &ResidentResource<'_>) -> Result<Option<LoadOverride>> {
        if resource.resource_type != ResourceType::Imc {
            return Ok(None);
        }
        let Some(name) = resource.collection else {
            return self.pass("no collection", resource.game_path.as_str());
        };
        let Some(store) = self.registry.resolve(name)? else {
            return self.pass("collection not registered", resource.game_path.as_str());
        };
        let Some(bytes) = store.serve(resource.game_path, ServeMode::IfDirty)? else {
            return self.pass("unchanged", resource.game_path.as_str());
        };

        tracing::debug!(
            "{} was already loaded but IMC in collection {} changed, reloading",
            resource.game_path,
            name
        );
        Ok(Some(LoadOverride {
            collection: name.to_string(),
            game_path: resource.game_path.clone(),
            bytes,
        }))
    }
}

/// Run a handler body, containing every error and panic.
fn guarded<F>(stage: &'static str, body: F) -> Option<LoadOverride>
where
    F: FnOnce() -> Result<Option<LoadOverride>>,
{
    let error = match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(result)) => return result,
        Ok(Err(error)) => error,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Error::HookFault(format!("panic: {}", message))
        }
    };

    diagnostics().record_hook_fault();
    tracing::error!("{} hook failed, deferring to host: {}", stage, error);
    None
}

struct Installed {
    pre_load: HandlerId,
    post_load: HandlerId,
}

#[derive(Default)]
struct HookState {
    leases: usize,
    installed: Option<Installed>,
}

struct HookInner {
    loader: Arc<dyn HostLoader>,
    dispatch: HookDispatch,
    active: AtomicUsize,
    state: Mutex<HookState>,
}

impl HookInner {
    fn install(&self) -> Result<Installed> {
        let dispatch = self.dispatch.clone();
        let pre: PreLoadHandler =
            Arc::new(move |request: &LoadRequest<'_>| guarded("pre-load", || dispatch.pre_load(request)));
        let dispatch = self.dispatch.clone();
        let post: PostLoadHandler =
            Arc::new(move |resource: &ResidentResource<'_>| guarded("post-load", || dispatch.post_load(resource)));

        let pre_load = self
            .loader
            .subscribe_pre_load(pre)
            .map_err(|e| Error::HookInstall(e.to_string()))?;

        match self.loader.subscribe_post_load(post) {
            Ok(post_load) => {
                tracing::info!("Installed load hook");
                Ok(Installed {
                    pre_load,
                    post_load,
                })
            }
            Err(error) => {
                if let Err(rollback) = self.loader.unsubscribe(pre_load) {
                    tracing::error!("Failed to roll back pre-load handler: {}", rollback);
                }
                Err(Error::HookInstall(error.to_string()))
            }
        }
    }

    fn uninstall(&self, installed: Installed) {
        for id in [installed.pre_load, installed.post_load] {
            if let Err(error) = self.loader.unsubscribe(id) {
                tracing::error!("Failed to remove load handler {:?}: {}", id, error);
            }
        }
        tracing::info!("Removed load hook");
    }

    fn release(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.leases = state.leases.saturating_sub(1);
        self.active.store(state.leases, Ordering::Release);
        if state.leases == 0 {
            if let Some(installed) = state.installed.take() {
                self.uninstall(installed);
            }
        }
    }
}

/// Reference-counted installation of the load handlers.
pub struct InterceptionHook {
    inner: Arc<HookInner>,
}

impl InterceptionHook {
    pub fn new(loader: Arc<dyn HostLoader>, dispatch: HookDispatch) -> Self {
        Self {
            inner: Arc::new(HookInner {
                loader,
                dispatch,
                active: AtomicUsize::new(0),
                state: Mutex::new(HookState::default()),
            }),
        }
    }

    /// Take a lease, installing the handlers on the 0 -> 1 transition.
    pub fn acquire(&self) -> Result<HookLease> {
        let mut state = self.inner.state.lock().mutex_err()?;
        if state.leases == 0 {
            state.installed = Some(self.inner.install()?);
        }
        state.leases += 1;
        self.inner.active.store(state.leases, Ordering::Release);
        Ok(HookLease {
            inner: Some(Arc::clone(&self.inner)),
        })
    }

    /// Number of outstanding leases.
    pub fn active_leases(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn is_installed(&self) -> bool {
        self.active_leases() > 0
    }

    pub fn dispatch(&self) -> &HookDispatch {
        &self.inner.dispatch
    }
}

/// One store's share of the hook installation. Releasing (or dropping) the last
/// lease uninstalls the handlers.
pub struct HookLease {
    inner: Option<Arc<HookInner>>,
}

impl HookLease {
    pub fn release(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

impl Drop for HookLease {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::GamePath;

    #[test]
    fn test_guarded_contains_panic() {
        let before = diagnostics().hook_faults();
        let result = guarded("pre-load", || panic!("handler exploded"));
        assert!(result.is_none());
        assert!(diagnostics().hook_faults() > before);
    }

    #[test]
    fn test_guarded_passes_result_through() {
        let served = LoadOverride {
            collection: "Default".to_string(),
            game_path: GamePath::new("chara/x.imc").unwrap(),
            bytes: vec![1, 2, 3],
        };
        let expected = served.clone();
        assert_eq!(guarded("post-load", move || Ok(Some(served))), Some(expected));
    }

    #[test]
    fn test_dispatch_ignores_unknown_collection() {
        let dispatch = HookDispatch::new(Arc::new(CollectionRegistry::new()), true);
        let request = LoadRequest {
            resource_type: ResourceType::Imc,
            requested: "|Nobody_3|chara/x.imc",
        };
        assert!(dispatch.pre_load(&request).unwrap().is_none());

        let path = GamePath::new("chara/x.imc").unwrap();
        let resource = ResidentResource {
            resource_type: ResourceType::Imc,
            game_path: &path,
            collection: None,
        };
        assert!(dispatch.post_load(&resource).unwrap().is_none());
    }
}
