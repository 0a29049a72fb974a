//! Read-request completion object.
//!
//! A read is split into a [`ReadRequest`] (held by the driver until a report
//! is available) and a [`ReadHandle`] (held by the caller, who blocks on it
//! for the outcome). Completion happens exactly once, from either side of
//! the split.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{HidError, Result};

struct RequestInner {
    slot: Mutex<Option<Result<Vec<u8>>>>,
    done: Condvar,
}

/// Driver-side half of a pending read. Capacity is the size of the caller's
/// output buffer; a report larger than it fails the request rather than
/// truncating.
pub struct ReadRequest {
    inner: Arc<RequestInner>,
    capacity: usize,
}

/// Caller-side half of a pending read.
pub struct ReadHandle {
    inner: Arc<RequestInner>,
}

impl ReadRequest {
    pub fn new(capacity: usize) -> (ReadRequest, ReadHandle) {
        let inner = Arc::new(RequestInner {
            slot: Mutex::new(None),
            done: Condvar::new(),
        });
        (
            ReadRequest {
                inner: inner.clone(),
                capacity,
            },
            ReadHandle { inner },
        )
    }

    /// Complete the request with a report payload.
    pub fn complete(self, payload: &[u8]) {
        let outcome = if payload.len() > self.capacity {
            Err(HidError::BufferTooSmall {
                needed: payload.len(),
                provided: self.capacity,
            })
        } else {
            Ok(payload.to_vec())
        };
        self.finish(outcome);
    }

    /// Complete the request with an error.
    pub fn fail(self, err: HidError) {
        self.finish(Err(err));
    }

    fn finish(self, outcome: Result<Vec<u8>>) {
        *self.inner.slot.lock().unwrap() = Some(outcome);
        self.inner.done.notify_all();
    }
}

impl ReadHandle {
    /// Block until the request completes.
    pub fn wait(self) -> Result<Vec<u8>> {
        let mut slot = self.inner.slot.lock().unwrap();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self.inner.done.wait(slot).unwrap();
        }
    }

    /// Block until the request completes or `timeout` elapses.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Vec<u8>> {
        let mut slot = self.inner.slot.lock().unwrap();
        if slot.is_none() {
            let (guard, _) = self.inner.done.wait_timeout(slot, timeout).unwrap();
            slot = guard;
        }
        slot.take().unwrap_or(Err(HidError::Timeout))
    }

    pub fn is_complete(&self) -> bool {
        self.inner.slot.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completion_wakes_waiter() {
        let (request, handle) = ReadRequest::new(8);
        let worker = thread::spawn(move || handle.wait());
        request.complete(&[1, 0, 4, 0, 0, 0, 0, 0]);
        assert_eq!(worker.join().unwrap().unwrap(), vec![1, 0, 4, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn oversized_payload_fails_with_buffer_too_small() {
        let (request, handle) = ReadRequest::new(4);
        request.complete(&[0; 8]);
        assert!(matches!(
            handle.wait(),
            Err(HidError::BufferTooSmall {
                needed: 8,
                provided: 4
            })
        ));
    }

    #[test]
    fn wait_timeout_expires_on_pending_request() {
        let (_request, handle) = ReadRequest::new(8);
        assert!(matches!(
            handle.wait_timeout(Duration::from_millis(5)),
            Err(HidError::Timeout)
        ));
    }
}
