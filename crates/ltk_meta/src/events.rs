//! Lifecycle events for collaborators (UI, mod management).
//!
//! Events are serialized as JSON with a `kind` tag so they can be forwarded to a
//! frontend unchanged, the same way overlay progress is.

use crate::error::{MutexResultExt, Result};
use crate::imc::ImcManipulation;
use crate::path::GamePath;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MetaEvent {
    #[serde(rename_all = "camelCase")]
    OverlayActivated { collection: String, files: usize },
    #[serde(rename_all = "camelCase")]
    OverlayDeactivated { collection: String, files: usize },
    #[serde(rename_all = "camelCase")]
    ManipulationApplied {
        collection: String,
        path: GamePath,
        manipulation: ImcManipulation,
    },
    #[serde(rename_all = "camelCase")]
    ManipulationRejected {
        collection: String,
        path: GamePath,
        manipulation: ImcManipulation,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    ManipulationReverted {
        collection: String,
        path: GamePath,
        manipulation: ImcManipulation,
    },
    #[serde(rename_all = "camelCase")]
    StoreReset { collection: String },
    #[serde(rename_all = "camelCase")]
    StoreDisposed { collection: String },
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type EventCallback = Arc<dyn Fn(&MetaEvent) + Send + Sync>;

/// Fan-out of [`MetaEvent`]s to registered callbacks.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, EventCallback)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&MetaEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .mutex_err()?
            .push((id, Arc::new(callback)));
        Ok(id)
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subscribers = self.subscribers.write().mutex_err()?;
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        Ok(subscribers.len() != before)
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Callbacks run outside the subscriber lock, so they may subscribe or
    /// unsubscribe.
    pub fn emit(&self, event: MetaEvent) {
        let callbacks: Vec<EventCallback> = match self.subscribers.read() {
            Ok(subscribers) => subscribers.iter().map(|(_, cb)| cb.clone()).collect(),
            Err(_) => {
                tracing::error!("Event subscriber list poisoned; dropping {:?}", event);
                return;
            }
        };
        for callback in callbacks {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = bus
            .subscribe(move |event| sink.lock().unwrap().push(event.clone()))
            .unwrap();

        bus.emit(MetaEvent::StoreReset {
            collection: "Default".to_string(),
        });
        assert_eq!(seen.lock().unwrap().len(), 1);

        assert!(bus.unsubscribe(id).unwrap());
        assert!(!bus.unsubscribe(id).unwrap());
        bus.emit(MetaEvent::StoreDisposed {
            collection: "Default".to_string(),
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_string(&MetaEvent::OverlayActivated {
            collection: "Default".to_string(),
            files: 2,
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"overlayActivated\""));
        assert!(json.contains("\"collection\":\"Default\""));
        assert!(json.contains("\"files\":2"));
    }
}
