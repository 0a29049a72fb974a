//! Fixed-capacity FIFO of pending read requests.
//!
//! Reads arrive faster than reports during quiet periods, so the device
//! keeps a small queue of outstanding requests and completes the oldest one
//! when a report becomes available. The enabled flag tracks device power:
//! paused means no request may wait (D3 or shutdown), and pausing drains
//! every queued request with a not-ready failure.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{HidError, Result};
use crate::request::ReadRequest;

pub const CACHE_SLOTS: usize = 4;

pub struct ReadRequestCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    enabled: bool,
    slots: VecDeque<ReadRequest>,
}

impl Default for ReadRequestCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                enabled: false,
                slots: VecDeque::with_capacity(CACHE_SLOTS),
            }),
        }
    }
}

impl ReadRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. The enabled check happens under the same lock as the
    /// insert, so a request can never slip in behind a concurrent
    /// [`pause`](Self::pause). On failure the request is failed with the
    /// returned error before this call returns.
    pub fn enqueue(&self, request: ReadRequest) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.enabled {
            drop(inner);
            request.fail(HidError::NotReady);
            return Err(HidError::NotReady);
        }
        if inner.slots.len() == CACHE_SLOTS {
            drop(inner);
            request.fail(HidError::Exhausted);
            return Err(HidError::Exhausted);
        }
        inner.slots.push_back(request);
        Ok(())
    }

    /// Remove and return the oldest queued request, if any.
    pub fn dequeue(&self) -> Option<ReadRequest> {
        self.inner.lock().unwrap().slots.pop_front()
    }

    /// Complete the oldest queued request with `payload`. Fails with
    /// not-ready when nothing is queued; the caller still owns the payload
    /// and must hold it pending.
    pub fn complete(&self, payload: &[u8]) -> Result<()> {
        let request = self.dequeue().ok_or(HidError::NotReady)?;
        request.complete(payload);
        Ok(())
    }

    /// Stop accepting requests and fail every queued one.
    pub fn pause(&self) {
        let drained: Vec<ReadRequest> = {
            let mut inner = self.inner.lock().unwrap();
            inner.enabled = false;
            inner.slots.drain(..).collect()
        };
        for request in drained {
            request.fail(HidError::NotReady);
        }
    }

    pub fn resume(&self) {
        self.inner.lock().unwrap().enabled = true;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ReadRequest;
    use std::time::Duration;

    #[test]
    fn completes_in_fifo_order() {
        let cache = ReadRequestCache::new();
        cache.resume();

        let (first, first_handle) = ReadRequest::new(8);
        let (second, second_handle) = ReadRequest::new(8);
        cache.enqueue(first).unwrap();
        cache.enqueue(second).unwrap();

        cache.complete(&[1]).unwrap();
        cache.complete(&[2]).unwrap();
        assert_eq!(first_handle.wait().unwrap(), vec![1]);
        assert_eq!(second_handle.wait().unwrap(), vec![2]);
    }

    #[test]
    fn rejects_when_full() {
        let cache = ReadRequestCache::new();
        cache.resume();
        let mut handles = Vec::new();
        for _ in 0..CACHE_SLOTS {
            let (request, handle) = ReadRequest::new(8);
            cache.enqueue(request).unwrap();
            handles.push(handle);
        }
        let (overflow, overflow_handle) = ReadRequest::new(8);
        assert!(matches!(cache.enqueue(overflow), Err(HidError::Exhausted)));
        assert!(matches!(
            overflow_handle.wait(),
            Err(HidError::Exhausted)
        ));
    }

    #[test]
    fn pause_drains_and_blocks_new_requests() {
        let cache = ReadRequestCache::new();
        cache.resume();
        let (queued, queued_handle) = ReadRequest::new(8);
        cache.enqueue(queued).unwrap();

        cache.pause();
        assert!(matches!(queued_handle.wait(), Err(HidError::NotReady)));
        assert!(cache.is_empty());

        let (late, late_handle) = ReadRequest::new(8);
        assert!(matches!(cache.enqueue(late), Err(HidError::NotReady)));
        assert!(matches!(
            late_handle.wait_timeout(Duration::from_millis(5)),
            Err(HidError::NotReady)
        ));
    }

    #[test]
    fn disabled_until_first_resume() {
        let cache = ReadRequestCache::new();
        let (request, _handle) = ReadRequest::new(8);
        assert!(matches!(cache.enqueue(request), Err(HidError::NotReady)));
    }
}
