//! In-process stand-in for the host's loader.

use crate::error::{Error, Result};
use crate::host::{
    HandlerId, HostLoader, LoadRequest, PostLoadHandler, PreLoadHandler, ResidentResource,
    ResourceType,
};
use crate::path::GamePath;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeLoader {
    next_id: AtomicU64,
    pre_load: Mutex<Vec<(HandlerId, PreLoadHandler)>>,
    post_load: Mutex<Vec<(HandlerId, PostLoadHandler)>>,
    pub fail_post_subscribe: AtomicBool,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_counts(&self) -> (usize, usize) {
        (
            self.pre_load.lock().unwrap().len(),
            self.post_load.lock().unwrap().len(),
        )
    }

    /// Load `requested`: read `canonical`, then let the pre-load handlers
    /// substitute the bytes.
    pub fn load(&self, requested: &str, canonical: &[u8]) -> Vec<u8> {
        let handlers: Vec<PreLoadHandler> = self
            .pre_load
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        let request = LoadRequest {
            resource_type: ResourceType::from_path(requested),
            requested,
        };

        let mut bytes = canonical.to_vec();
        for handler in handlers {
            if let Some(replacement) = handler(&request) {
                bytes = replacement.bytes;
            }
        }
        bytes
    }

    /// Re-check a resident resource, replacing `resident` in place if a handler
    /// reports it stale. Returns whether it was replaced.
    pub fn recheck(&self, path: &GamePath, collection: Option<&str>, resident: &mut Vec<u8>) -> bool {
        let handlers: Vec<PostLoadHandler> = self
            .post_load
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        let resource = ResidentResource {
            resource_type: ResourceType::from_path(path.as_str()),
            game_path: path,
            collection,
        };

        let mut replaced = false;
        for handler in handlers {
            if let Some(replacement) = handler(&resource) {
                *resident = replacement.bytes;
                replaced = true;
            }
        }
        replaced
    }

    fn next(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl HostLoader for FakeLoader {
    fn subscribe_pre_load(&self, handler: PreLoadHandler) -> Result<HandlerId> {
        let id = self.next();
        self.pre_load.lock().unwrap().push((id, handler));
        Ok(id)
    }

    fn subscribe_post_load(&self, handler: PostLoadHandler) -> Result<HandlerId> {
        if self.fail_post_subscribe.load(Ordering::Relaxed) {
            return Err(Error::HookInstall("post-load subscription refused".into()));
        }
        let id = self.next();
        self.post_load.lock().unwrap().push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: HandlerId) -> Result<()> {
        self.pre_load.lock().unwrap().retain(|(hid, _)| *hid != id);
        self.post_load.lock().unwrap().retain(|(hid, _)| *hid != id);
        Ok(())
    }
}
