//! Grant-table access: capability tokens that let the backend domain map a
//! frontend page.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pvhid_protocol::ring::EventPage;
use thiserror::Error;

pub type GrantRef = u32;

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("grant table exhausted")]
    Exhausted,

    #[error("unknown grant reference {0}")]
    BadRef(GrantRef),
}

pub trait GrantTable: Send + Sync {
    /// Reserve a grant entry.
    fn get(&self) -> Result<GrantRef, GrantError>;

    /// Point the entry at `page` and permit `remote_domain` to map it.
    fn permit_foreign_access(
        &self,
        gref: GrantRef,
        remote_domain: u16,
        page: Arc<EventPage>,
    ) -> Result<(), GrantError>;

    fn revoke_foreign_access(&self, gref: GrantRef);

    /// Return the entry to the free pool. Must follow revocation.
    fn put(&self, gref: GrantRef);
}

#[derive(Default)]
struct GrantInner {
    next_ref: GrantRef,
    reserved: HashMap<GrantRef, Option<(u16, Arc<EventPage>)>>,
}

/// In-process grant table. The backend side of a test looks mapped pages up
/// with [`MemoryGrantTable::foreign_page`].
#[derive(Default)]
pub struct MemoryGrantTable {
    inner: Mutex<GrantInner>,
}

impl MemoryGrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend view: the page a grant reference currently exposes, if any.
    pub fn foreign_page(&self, gref: GrantRef) -> Option<Arc<EventPage>> {
        self.inner
            .lock()
            .unwrap()
            .reserved
            .get(&gref)
            .and_then(|entry| entry.as_ref().map(|(_, page)| page.clone()))
    }
}

impl GrantTable for MemoryGrantTable {
    fn get(&self) -> Result<GrantRef, GrantError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_ref += 1;
        let gref = inner.next_ref;
        inner.reserved.insert(gref, None);
        Ok(gref)
    }

    fn permit_foreign_access(
        &self,
        gref: GrantRef,
        remote_domain: u16,
        page: Arc<EventPage>,
    ) -> Result<(), GrantError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.reserved.get_mut(&gref).ok_or(GrantError::BadRef(gref))?;
        *entry = Some((remote_domain, page));
        Ok(())
    }

    fn revoke_foreign_access(&self, gref: GrantRef) {
        if let Some(entry) = self.inner.lock().unwrap().reserved.get_mut(&gref) {
            *entry = None;
        }
    }

    fn put(&self, gref: GrantRef) {
        self.inner.lock().unwrap().reserved.remove(&gref);
    }
}

/// Owned grant over one shared page: reserves an entry and permits foreign
/// access on construction, revokes and releases in reverse order on drop.
pub struct GrantedPage {
    table: Arc<dyn GrantTable>,
    gref: GrantRef,
    page: Arc<EventPage>,
}

impl GrantedPage {
    pub fn grant(
        table: Arc<dyn GrantTable>,
        remote_domain: u16,
        page: Arc<EventPage>,
    ) -> Result<Self, GrantError> {
        let gref = table.get()?;
        if let Err(err) = table.permit_foreign_access(gref, remote_domain, page.clone()) {
            table.put(gref);
            return Err(err);
        }
        Ok(Self { table, gref, page })
    }

    pub fn reference(&self) -> GrantRef {
        self.gref
    }

    pub fn page(&self) -> &Arc<EventPage> {
        &self.page
    }
}

impl Drop for GrantedPage {
    fn drop(&mut self) {
        self.table.revoke_foreign_access(self.gref);
        self.table.put(self.gref);
    }
}
