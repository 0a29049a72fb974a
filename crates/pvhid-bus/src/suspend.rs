//! Hypervisor suspend/resume notification.
//!
//! The host suspend framework fires registered callbacks after a
//! live-migration style pause, once the domain is running again. Frontends
//! use this to rebuild channel state whose host-side identity did not
//! survive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type SuspendCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuspendHandle(u64);

/// In-process suspend source; tests call [`SuspendNotifier::fire`] to model
/// a resume-from-suspend.
#[derive(Default)]
pub struct SuspendNotifier {
    inner: Mutex<SuspendInner>,
}

#[derive(Default)]
struct SuspendInner {
    next_id: u64,
    callbacks: HashMap<u64, Arc<SuspendCallback>>,
}

impl SuspendNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: SuspendCallback) -> SuspendHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.callbacks.insert(id, Arc::new(callback));
        SuspendHandle(id)
    }

    pub fn deregister(&self, handle: SuspendHandle) {
        self.inner.lock().unwrap().callbacks.remove(&handle.0);
    }

    /// Invoke every registered callback, as the suspend framework does on
    /// resume.
    pub fn fire(&self) {
        let callbacks: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}
