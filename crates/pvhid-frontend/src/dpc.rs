//! Deferred work queue.
//!
//! Interrupt handlers must not touch locks or the ring; they schedule a
//! [`DpcQueue`] instead, which runs the bound work item on its own thread.
//! Schedules coalesce: scheduling while a run is already queued is a no-op,
//! though a schedule arriving during a run queues one more.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

pub struct DpcQueue {
    shared: Arc<DpcShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct DpcShared {
    state: Mutex<DpcState>,
    wake: Condvar,
}

#[derive(Default)]
struct DpcState {
    queued: bool,
    running: bool,
    shutdown: bool,
}

impl DpcQueue {
    pub fn new(work: impl Fn() + Send + 'static) -> Self {
        let shared = Arc::new(DpcShared {
            state: Mutex::new(DpcState::default()),
            wake: Condvar::new(),
        });
        let worker_shared = shared.clone();
        let worker = std::thread::spawn(move || run_worker(&worker_shared, work));
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Request a run of the work item. Returns false if a run was already
    /// queued (the schedules coalesced).
    pub fn schedule(&self) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if state.queued || state.shutdown {
            return false;
        }
        state.queued = true;
        self.shared.wake.notify_all();
        true
    }

    /// Block until no run is queued or in progress. Runs scheduled while
    /// flushing are waited out too.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.queued || state.running {
            state = self.shared.wake.wait(state).unwrap();
        }
    }
}

fn run_worker(shared: &DpcShared, work: impl Fn()) {
    loop {
        {
            let mut state = shared.state.lock().unwrap();
            while !state.queued && !state.shutdown {
                state = shared.wake.wait(state).unwrap();
            }
            if state.shutdown {
                return;
            }
            state.queued = false;
            state.running = true;
        }
        work();
        let mut state = shared.state.lock().unwrap();
        state.running = false;
        shared.wake.notify_all();
    }
}

impl Drop for DpcQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn flush_observes_scheduled_run() {
        let runs = Arc::new(AtomicU32::new(0));
        let runs2 = runs.clone();
        let dpc = DpcQueue::new(move || {
            runs2.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dpc.schedule());
        dpc.flush();
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn flush_on_idle_queue_returns() {
        let dpc = DpcQueue::new(|| {});
        dpc.flush();
    }

    #[test]
    fn drop_joins_worker() {
        let dpc = DpcQueue::new(|| {});
        dpc.schedule();
        drop(dpc);
    }
}
