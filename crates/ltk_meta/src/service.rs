//! The process-wide service tying stores, registry and hook together.
//!
//! # Example
//!
//! ```no_run
//! use ltk_meta::{Collection, MetaConfig, MetaService, FsDefaultSource};
//! use ltk_meta::imc::{EquipSlot, ImcEntry, ImcManipulation, ImcSelector};
//! use std::sync::Arc;
//!
//! # fn main() -> ltk_meta::Result<()> {
//! # let loader: Arc<dyn ltk_meta::HostLoader> = unimplemented!();
//! let config = MetaConfig::default();
//! let defaults = Arc::new(FsDefaultSource::new("C:/game/extracted".into()));
//! let service = MetaService::install_global(MetaService::new(config, loader, defaults))?;
//!
//! let store = service.create_store(Arc::new(Collection::new("Default")?))?;
//! store.apply_manipulation(ImcManipulation::new(
//!     ImcSelector::equipment(1, 3, EquipSlot::Head),
//!     ImcEntry { material_id: 2, ..Default::default() },
//! ))?;
//! store.activate_overlay()?;
//! # Ok(())
//! # }
//! ```

use crate::collection::Collection;
use crate::config::MetaConfig;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::hook::{HookDispatch, InterceptionHook};
use crate::host::HostLoader;
use crate::manager::MetaManager;
use crate::registry::{CollectionHandle, CollectionRegistry};
use crate::source::DefaultSource;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<MetaService> = OnceLock::new();

pub struct MetaService {
    config: MetaConfig,
    registry: Arc<CollectionRegistry>,
    hook: InterceptionHook,
    defaults: Arc<dyn DefaultSource>,
    events: Arc<EventBus>,
}

impl MetaService {
    pub fn new(
        config: MetaConfig,
        loader: Arc<dyn HostLoader>,
        defaults: Arc<dyn DefaultSource>,
    ) -> Self {
        let registry = Arc::new(CollectionRegistry::new());
        let dispatch = HookDispatch::new(registry.clone(), config.trace_hook_dispatch);
        Self {
            config,
            hook: InterceptionHook::new(loader, dispatch),
            registry,
            defaults,
            events: Arc::new(EventBus::new()),
        }
    }

    /// Install `service` as the process-wide instance. Fails if one exists.
    pub fn install_global(service: MetaService) -> Result<&'static MetaService> {
        let already = || Error::HookInstall("a global MetaService is already installed".into());
        GLOBAL.set(service).map_err(|_| already())?;
        tracing::info!("Installed global metadata service");
        GLOBAL.get().ok_or_else(already)
    }

    pub fn global() -> Option<&'static MetaService> {
        GLOBAL.get()
    }

    /// Create, register and hook up the store for `collection`.
    pub fn create_store(&self, collection: Arc<Collection>) -> Result<Arc<MetaManager>> {
        if self.registry.resolve(collection.name())?.is_some() {
            return Err(Error::DuplicateCollection(collection.name().to_string()));
        }

        let lease = self.hook.acquire()?;
        let store = Arc::new(MetaManager::new(
            collection,
            self.defaults.clone(),
            self.events.clone(),
            self.registry.clone(),
            self.config.verify_encoding,
            lease,
        ));
        self.registry.register(&store)?;

        tracing::info!("Created IMC store for collection {}", store.collection().name());
        Ok(store)
    }

    pub fn resolve(&self, name: &str) -> Result<Option<CollectionHandle>> {
        self.registry.resolve(name)
    }

    pub fn config(&self) -> &MetaConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    pub fn hook(&self) -> &InterceptionHook {
        &self.hook
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}
