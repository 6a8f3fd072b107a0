//! Per-collection metadata patching and load redirection.
//!
//! This crate keeps, for every collection (a named override profile), an
//! in-memory patched copy of the host's IMC variant tables, and hooks the host's
//! asset loader so that loads of those tables receive the patched bytes. It
//! supports:
//!
//! - **Selector-addressed edits**: [`ImcManipulation`](imc::ImcManipulation)s
//!   replace one entry of one table; re-applying a selector replaces the earlier
//!   edit instead of stacking.
//! - **Revert to canonical**: reverting restores the host's own entry and keeps
//!   every other edit to the same file.
//! - **Overlay toggling**: a collection's virtual paths can be registered and
//!   removed without discarding its edits.
//! - **Staleness tracking**: resources the host already holds are refreshed in
//!   place when their table changed after they were served.
//! - **Shared hook**: one reference-counted interception point serves every
//!   store and is installed only while at least one store exists.
//!
//! # Example
//!
//! ```no_run
//! use ltk_meta::imc::{EquipSlot, ImcEntry, ImcManipulation, ImcSelector};
//! use ltk_meta::{Collection, MemoryDefaultSource, MetaConfig, MetaService};
//! use std::sync::Arc;
//!
//! # fn main() -> ltk_meta::Result<()> {
//! # let loader: Arc<dyn ltk_meta::HostLoader> = unimplemented!();
//! let service = MetaService::new(
//!     MetaConfig::default(),
//!     loader,
//!     Arc::new(MemoryDefaultSource::new()),
//! );
//!
//! let store = service.create_store(Arc::new(Collection::new("Default")?))?;
//! store.activate_overlay()?;
//!
//! let manip = ImcManipulation::new(
//!     ImcSelector::equipment(1, 3, EquipSlot::Head),
//!     ImcEntry { material_id: 2, ..Default::default() },
//! );
//! store.apply_manipulation(manip)?;
//! store.revert_manipulation(&manip)?;
//! store.dispose()?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod hook;
pub mod host;
pub mod imc;
pub mod manager;
pub mod path;
pub mod registry;
pub mod service;
pub mod source;


// Re-export main types
pub use collection::Collection;
pub use config::MetaConfig;
pub use diagnostics::{diagnostics, Diagnostics};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventBus, MetaEvent, SubscriptionId};
pub use hook::{HookDispatch, HookLease, InterceptionHook};
pub use host::{
    HandlerId, HostLoader, LoadOverride, LoadRequest, PostLoadHandler, PreLoadHandler,
    ResidentResource, ResourceType,
};
pub use manager::{MetaManager, ServeMode};
pub use path::{GamePath, VirtualPath};
pub use registry::{CollectionHandle, CollectionRegistry};
pub use service::MetaService;
pub use source::{DefaultSource, FsDefaultSource, MemoryDefaultSource};
