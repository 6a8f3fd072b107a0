//! The seam between this crate and the host's native asset loader.
//!
//! The host calls two kinds of handlers on its own loading threads:
//!
//! 1. **Pre-load** handlers see every fresh load request. The host performs its
//!    normal load and, if a handler returns a [`LoadOverride`], replaces the
//!    loaded object's bytes with the override before handing it out.
//! 2. **Post-load** handlers see resources that were already resident (possibly
//!    from the host's own cache). A returned override is written into the
//!    resident object in place, so holders of the old object observe it.
//!
//! Handlers are plain functions of the request. The actual byte substitution is
//! the [`HostLoader`] implementation's job, which keeps everything on this side
//! testable without a real host.

use crate::error::Result;
use crate::path::GamePath;
use std::sync::Arc;

/// File type of a resource, as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Imc,
    Mdl,
    Mtrl,
    Tex,
    Other,
}

impl ResourceType {
    /// Classify by the extension of `path`.
    pub fn from_path(path: &str) -> Self {
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "imc" => ResourceType::Imc,
            "mdl" => ResourceType::Mdl,
            "mtrl" => ResourceType::Mtrl,
            "tex" => ResourceType::Tex,
            _ => ResourceType::Other,
        }
    }
}

/// A fresh load request.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub resource_type: ResourceType,
    /// The path exactly as the host is about to load it; a virtual path when the
    /// request was redirected by a collection.
    pub requested: &'a str,
}

/// A resource that is already resident in the host.
#[derive(Debug, Clone, Copy)]
pub struct ResidentResource<'a> {
    pub resource_type: ResourceType,
    pub game_path: &'a GamePath,
    /// Name of the collection the resource was resolved through, if any.
    pub collection: Option<&'a str>,
}

/// Bytes to substitute into a loaded or resident resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOverride {
    pub collection: String,
    pub game_path: GamePath,
    pub bytes: Vec<u8>,
}

pub type PreLoadHandler = Arc<dyn Fn(&LoadRequest<'_>) -> Option<LoadOverride> + Send + Sync>;
pub type PostLoadHandler =
    Arc<dyn Fn(&ResidentResource<'_>) -> Option<LoadOverride> + Send + Sync>;

/// Identifies one handler subscription within a [`HostLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// The host's loader, as far as this crate needs it.
pub trait HostLoader: Send + Sync {
    fn subscribe_pre_load(&self, handler: PreLoadHandler) -> Result<HandlerId>;

    fn subscribe_post_load(&self, handler: PostLoadHandler) -> Result<HandlerId>;

    fn unsubscribe(&self, id: HandlerId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_from_path() {
        assert_eq!(ResourceType::from_path("chara/x.IMC"), ResourceType::Imc);
        assert_eq!(
            ResourceType::from_path("|Default_1|chara/x.imc"),
            ResourceType::Imc
        );
        assert_eq!(ResourceType::from_path("chara/x.mdl"), ResourceType::Mdl);
        assert_eq!(ResourceType::from_path("chara/x"), ResourceType::Other);
    }
}
