//! Device-model abstraction behind the channel negotiator.
//!
//! The negotiator drives the handshake and owns the store paths; everything
//! device-specific — shared-page layout, report synthesis, descriptors —
//! lives behind [`InputModel`]. The protocol version published by the
//! backend selects the model; unknown versions fail device enable rather
//! than falling back.

use std::sync::Arc;

use pvhid_bus::{EventChannels, GrantTable, Store, Transaction};

use crate::cache::ReadRequestCache;
use crate::error::{HidError, Result};
use crate::vkbd::Vkbd;

/// Outcome of a read-report attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A stale report was pending and has been delivered to the oldest
    /// cached request.
    Delivered,
    /// Nothing pending; the request stays cached until an event arrives.
    Pending,
}

pub trait InputModel: Send + Sync {
    /// Allocate the shared resources toward `remote_domain`: event page,
    /// grant, event channel. Fully undone on error.
    fn connect(&self, remote_domain: u16) -> Result<()>;

    /// Publish the model's channel configuration inside `txn`. The caller
    /// owns commit and retry.
    fn write_config(&self, txn: &Transaction) -> Result<()>;

    /// Release everything [`connect`](Self::connect) acquired, in reverse
    /// order, after quiescing deferred work.
    fn disconnect(&self);

    fn debug_dump(&self) -> String;

    fn device_attributes(&self, buf: &mut [u8]) -> Result<usize>;
    fn device_descriptor(&self, buf: &mut [u8]) -> Result<usize>;
    fn report_descriptor(&self, buf: &mut [u8]) -> Result<usize>;

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize>;
    fn set_feature(&self, data: &[u8]) -> Result<()>;
    fn write_report(&self, data: &[u8]) -> Result<()>;

    /// Deliver a pending report to the read-request cache, if any.
    fn read_report(&self) -> Result<ReadStatus>;
}

/// Everything a model needs from the surrounding device.
pub struct ModelServices {
    pub store: Arc<dyn Store>,
    pub grants: Arc<dyn GrantTable>,
    pub channels: Arc<dyn EventChannels>,
    pub cache: Arc<ReadRequestCache>,
    pub store_path: String,
}

/// Instantiate the model for a negotiated protocol version.
pub fn create(protocol_version: u32, services: ModelServices) -> Result<Arc<dyn InputModel>> {
    match protocol_version {
        0 => Ok(Vkbd::new(services)),
        version => Err(HidError::Unsupported(version)),
    }
}
