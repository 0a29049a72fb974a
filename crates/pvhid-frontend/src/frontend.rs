//! Channel negotiator.
//!
//! Drives the handshake with the backend through the configuration store:
//! close any previous incarnation, select a device model from the published
//! protocol version, allocate channel resources, publish them atomically
//! and walk the backend to the connected state. HID operations forward to
//! the model only while connected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pvhid_bus::{Commit, EventChannels, GrantTable, Store, StoreError};
use pvhid_protocol::state::BusState;
use tracing::{debug, info, warn};

use crate::cache::ReadRequestCache;
use crate::error::{HidError, Result};
use crate::model::{self, InputModel, ModelServices, ReadStatus};

/// How long a single backend state change may take before the handshake
/// gives up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

const WAIT_SLICE: Duration = Duration::from_millis(1);
const WAIT_SLICES: u32 = 1000;

pub struct Frontend {
    store: Arc<dyn Store>,
    grants: Arc<dyn GrantTable>,
    channels: Arc<dyn EventChannels>,
    cache: Arc<ReadRequestCache>,
    store_path: String,
    wait_timeout: Mutex<Duration>,
    connected: AtomicBool,
    state: Mutex<NegotiatorState>,
}

#[derive(Default)]
struct NegotiatorState {
    backend_path: Option<String>,
    backend_domain: u16,
    model: Option<Arc<dyn InputModel>>,
}

impl Frontend {
    pub fn new(
        store: Arc<dyn Store>,
        grants: Arc<dyn GrantTable>,
        channels: Arc<dyn EventChannels>,
        cache: Arc<ReadRequestCache>,
        store_path: &str,
    ) -> Self {
        Self {
            store,
            grants,
            channels,
            cache,
            store_path: store_path.to_string(),
            wait_timeout: Mutex::new(DEFAULT_WAIT_TIMEOUT),
            connected: AtomicBool::new(false),
            state: Mutex::new(NegotiatorState::default()),
        }
    }

    /// Shorten (or lengthen) the per-state-change wait bound.
    pub fn set_wait_timeout(&self, timeout: Duration) {
        *self.wait_timeout.lock().unwrap() = timeout;
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Bring the device up: close any stale incarnation, pick the device
    /// model for the published protocol version and run the connect
    /// handshake. Fully undone on error.
    pub fn enable(&self) -> Result<()> {
        self.close()?;

        let version = self.protocol_version()?;
        let model = model::create(
            version,
            ModelServices {
                store: self.store.clone(),
                grants: self.grants.clone(),
                channels: self.channels.clone(),
                cache: self.cache.clone(),
                store_path: self.store_path.clone(),
            },
        )?;

        self.connect(&model)?;

        self.state.lock().unwrap().model = Some(model);
        self.connected.store(true, Ordering::Release);
        info!(path = %self.store_path, version, "frontend connected");
        Ok(())
    }

    /// Tear the device down: release channel resources, then walk the
    /// backend to closed. Close failures are not propagated; the device is
    /// going away regardless.
    pub fn disable(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let model = self.state.lock().unwrap().model.take();
        if let Some(model) = model {
            model.disconnect();
        }
        if let Err(err) = self.close() {
            warn!(path = %self.store_path, %err, "close failed during disable");
        }
        info!(path = %self.store_path, "frontend disconnected");
    }

    pub fn device_attributes(&self, buf: &mut [u8]) -> Result<usize> {
        self.model()?.device_attributes(buf)
    }

    pub fn device_descriptor(&self, buf: &mut [u8]) -> Result<usize> {
        self.model()?.device_descriptor(buf)
    }

    pub fn report_descriptor(&self, buf: &mut [u8]) -> Result<usize> {
        self.model()?.report_descriptor(buf)
    }

    pub fn get_feature(&self, buf: &mut [u8]) -> Result<usize> {
        self.model()?.get_feature(buf)
    }

    pub fn set_feature(&self, data: &[u8]) -> Result<()> {
        self.model()?.set_feature(data)
    }

    pub fn write_report(&self, data: &[u8]) -> Result<()> {
        self.model()?.write_report(data)
    }

    pub fn read_report(&self) -> Result<ReadStatus> {
        self.model()?.read_report()
    }

    pub fn debug_dump(&self) -> String {
        match self.model() {
            Ok(model) => model.debug_dump(),
            Err(_) => "not connected".to_string(),
        }
    }

    fn model(&self) -> Result<Arc<dyn InputModel>> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(HidError::NotReady);
        }
        self.state
            .lock()
            .unwrap()
            .model
            .clone()
            .ok_or(HidError::NotReady)
    }

    fn protocol_version(&self) -> Result<u32> {
        match self.store.read(None, &self.store_path, "protocol") {
            Ok(value) => Ok(value.trim().parse().unwrap_or(0)),
            Err(StoreError::NotFound(_)) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-resolve the backend directory and domain from our own directory.
    fn update_paths(&self) -> Result<()> {
        let backend_path = self.store.read(None, &self.store_path, "backend")?;
        let backend_domain = self
            .store
            .read(None, &self.store_path, "backend-id")?
            .trim()
            .parse()
            .unwrap_or(0);

        let mut state = self.state.lock().unwrap();
        state.backend_path = Some(backend_path);
        state.backend_domain = backend_domain;
        Ok(())
    }

    fn backend_path(&self) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .backend_path
            .clone()
            .ok_or(HidError::NotReady)
    }

    fn set_state(&self, state: BusState) -> Result<()> {
        debug!(path = %self.store_path, %state, "frontend state");
        self.store
            .write(None, &self.store_path, "state", &state.to_wire())?;
        Ok(())
    }

    /// Walk the backend to closed: announce closing, wait for it to start
    /// shutting down, announce closed and wait for confirmation. A device
    /// whose backend directory was never published has nothing to close.
    fn close(&self) -> Result<()> {
        match self.update_paths() {
            Ok(()) => {}
            Err(HidError::Store(StoreError::NotFound(_))) => {
                debug!(path = %self.store_path, "no backend path, nothing to close");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
        let backend_path = self.backend_path()?;
        let mut state = BusState::Unknown;

        self.set_state(BusState::Closing)?;
        while !matches!(state, BusState::Closing | BusState::Closed) {
            self.wait_state(&backend_path, &mut state)?;
        }

        self.set_state(BusState::Closed)?;
        while state != BusState::Closed {
            self.wait_state(&backend_path, &mut state)?;
        }
        Ok(())
    }

    fn connect(&self, model: &Arc<dyn InputModel>) -> Result<()> {
        self.update_paths()?;
        let backend_path = self.backend_path()?;
        let backend_domain = self.state.lock().unwrap().backend_domain;

        model.connect(backend_domain)?;

        let handshake = self
            .publish_config(model)
            .and_then(|()| self.set_state(BusState::Connected))
            .and_then(|()| self.wait_connected(&backend_path));
        if let Err(err) = handshake {
            model.disconnect();
            return Err(err);
        }
        Ok(())
    }

    /// Publish the model's channel configuration in one transaction,
    /// re-running it for as long as commits keep losing races.
    fn publish_config(&self, model: &Arc<dyn InputModel>) -> Result<()> {
        loop {
            let txn = self.store.transaction_start()?;
            if let Err(err) = model.write_config(&txn) {
                let _ = self.store.transaction_end(txn, false);
                return Err(err);
            }
            match self.store.transaction_end(txn, true)? {
                Commit::Committed => return Ok(()),
                Commit::Retry => continue,
                Commit::Aborted => return Err(StoreError::BadTransaction.into()),
            }
        }
    }

    /// Wait for the backend to finish the handshake, sitting out the
    /// transient initialisation states. A terminal state other than
    /// connected, or a stall partway through, is a protocol failure; no
    /// reaction at all is a timeout.
    fn wait_connected(&self, backend_path: &str) -> Result<()> {
        let mut state = self.read_backend_state(backend_path)?;
        if state == BusState::Connected {
            return Ok(());
        }
        let mut progressed = false;
        loop {
            match self.wait_state(backend_path, &mut state) {
                Ok(()) => {}
                Err(HidError::Timeout) if progressed => {
                    return Err(HidError::InvalidProtocol(state));
                }
                Err(err) => return Err(err),
            }
            progressed = true;
            match state {
                BusState::Connected => return Ok(()),
                transient if transient.is_transient() => continue,
                terminal => return Err(HidError::InvalidProtocol(terminal)),
            }
        }
    }

    fn read_backend_state(&self, backend_path: &str) -> Result<BusState> {
        match self.store.read(None, backend_path, "state") {
            Ok(value) => Ok(BusState::from_wire(&value)),
            Err(StoreError::NotFound(_)) => Ok(BusState::Unknown),
            Err(err) => Err(err.into()),
        }
    }

    /// Block until the backend state differs from `*state`, leaving the new
    /// value in place. Watch delivery is not guaranteed at every context, so
    /// the wait interleaves short sleeps with store polls and re-reads the
    /// key each round.
    fn wait_state(&self, backend_path: &str, state: &mut BusState) -> Result<()> {
        let timeout = *self.wait_timeout.lock().unwrap();
        let watch = self.store.watch(backend_path, "state")?;
        let old = *state;
        let start = Instant::now();

        let outcome = loop {
            for _ in 0..WAIT_SLICES {
                if watch.wait_timeout(WAIT_SLICE) || start.elapsed() >= timeout {
                    break;
                }
                self.store.poll();
            }
            watch.clear();

            *state = match self.store.read(None, backend_path, "state") {
                Ok(value) => BusState::from_wire(&value),
                Err(StoreError::NotFound(_)) => BusState::Unknown,
                Err(err) => break Err(err.into()),
            };
            if *state != old {
                break Ok(());
            }
            if start.elapsed() >= timeout {
                break Err(HidError::Timeout);
            }
        };
        self.store.unwatch(watch);
        outcome
    }
}
