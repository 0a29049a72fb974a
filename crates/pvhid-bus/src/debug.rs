//! Diagnostic-dump registration.
//!
//! Subsystems register a callback that renders their current state; the
//! host's crash/debug path collects all of them. Registration is scoped to
//! the powered-on window of a device.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub type DebugCallback = Box<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugHandle(u64);

#[derive(Default)]
pub struct DebugRegistry {
    inner: Mutex<DebugInner>,
}

#[derive(Default)]
struct DebugInner {
    next_id: u64,
    callbacks: BTreeMap<u64, (String, Arc<DebugCallback>)>,
}

impl DebugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, callback: DebugCallback) -> DebugHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .callbacks
            .insert(id, (name.to_string(), Arc::new(callback)));
        DebugHandle(id)
    }

    pub fn deregister(&self, handle: DebugHandle) {
        self.inner.lock().unwrap().callbacks.remove(&handle.0);
    }

    /// Render every registered dump, one section per registration.
    pub fn dump_all(&self) -> String {
        let callbacks: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .callbacks
            .values()
            .cloned()
            .collect();
        let mut out = String::new();
        for (name, callback) in callbacks {
            out.push_str(&format!("[{name}]\n{}\n", callback()));
        }
        out
    }
}
