//! Process-wide counters for observability.

use std::sync::atomic::{AtomicU64, Ordering};

/// Read-only counters shared by every store and the load hook.
#[derive(Debug, Default)]
pub struct Diagnostics {
    apply_failures: AtomicU64,
    hook_faults: AtomicU64,
    overrides_served: AtomicU64,
}

static DIAGNOSTICS: Diagnostics = Diagnostics {
    apply_failures: AtomicU64::new(0),
    hook_faults: AtomicU64::new(0),
    overrides_served: AtomicU64::new(0),
};

/// The process-wide counters.
pub fn diagnostics() -> &'static Diagnostics {
    &DIAGNOSTICS
}

impl Diagnostics {
    /// Edits that faulted while decoding or encoding.
    pub fn apply_failures(&self) -> u64 {
        self.apply_failures.load(Ordering::Relaxed)
    }

    /// Faults caught at the load hook boundary.
    pub fn hook_faults(&self) -> u64 {
        self.hook_faults.load(Ordering::Relaxed)
    }

    /// Patched files handed to the host.
    pub fn overrides_served(&self) -> u64 {
        self.overrides_served.load(Ordering::Relaxed)
    }

    pub(crate) fn record_apply_failure(&self) {
        self.apply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hook_fault(&self) {
        self.hook_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_override_served(&self) {
        self.overrides_served.fetch_add(1, Ordering::Relaxed);
    }
}
