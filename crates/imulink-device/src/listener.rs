//! Callback registries shared between the session and transport tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use imulink_pkg::Package;

use crate::session::DeviceState;

/// Handle returned by [`Listeners::add`], used to deregister.
pub type ListenerId = u64;

/// Called with every package the session decodes, on the transport task.
pub type PackageListener = dyn Fn(&Package) + Send + Sync;

/// Called on connection state edges.
pub type StateListener = dyn Fn(DeviceState) + Send + Sync;

/// Called with each real-time chunk exactly as the transport received
/// it, before extraction, plus the host receive timestamp in
/// nanoseconds. This is the hook stream captures record from.
pub type RawChunkListener = dyn Fn(&[u8], i64) + Send + Sync;

/// Called with the post-extraction bytes of every chunk on every
/// transport, plus the host receive timestamp in nanoseconds.
pub type RawDataListener = dyn Fn(&[u8], i64) + Send + Sync;

/// A set of registered callbacks. Notification takes a snapshot first,
/// so a callback may add or remove listeners without deadlocking.
pub struct Listeners<F: ?Sized> {
    inner: Mutex<HashMap<ListenerId, Arc<F>>>,
    next_id: AtomicU64,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<F>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().unwrap().insert(id, listener);
        id
    }

    /// Returns false if the id was already removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.inner.lock().unwrap().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Current listeners, detached from the lock.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.inner.lock().unwrap().values().cloned().collect()
    }
}

impl<F: ?Sized> std::fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn add_remove_and_notify() {
        let listeners: Listeners<PackageListener> = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let id = {
            let hits = hits.clone();
            listeners.add(Arc::new(move |_: &Package| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };
        assert_eq!(listeners.len(), 1);

        for listener in listeners.snapshot() {
            listener(&Package::CmdGetDeviceInfo);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert!(listeners.is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let listeners: Listeners<PackageListener> = Listeners::new();
        let a = listeners.add(Arc::new(|_: &Package| {}));
        listeners.remove(a);
        let b = listeners.add(Arc::new(|_: &Package| {}));
        assert_ne!(a, b);
    }
}
