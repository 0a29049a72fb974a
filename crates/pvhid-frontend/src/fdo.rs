//! Device lifecycle controller.
//!
//! Owns the plug-and-play and power state machines and sequences them
//! against the channel negotiator: powering up registers the diagnostic
//! dump and suspend hooks and connects the frontend; powering down undoes
//! that in reverse. Requests the controller does not consume are forwarded
//! to the lower bus driver.

use std::sync::{Arc, Mutex, Weak};

use pvhid_bus::{
    DebugHandle, DebugRegistry, EventChannels, GrantTable, Store, SuspendHandle,
    SuspendNotifier,
};
use tracing::{debug, warn};

use crate::cache::ReadRequestCache;
use crate::error::Result;
use crate::frontend::Frontend;
use crate::request::{ReadHandle, ReadRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnpState {
    Added,
    Started,
    StopPending,
    Stopped,
    RemovePending,
    SurpriseRemovePending,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePower {
    D0,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPower {
    Working,
    Shutdown,
}

/// Plug-and-play request, as forwarded down the device stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnpRequest {
    Start,
    QueryStop,
    CancelStop,
    Stop,
    QueryRemove,
    CancelRemove,
    SurpriseRemoval,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRequest {
    Device(DevicePower),
    System(SystemPower),
}

/// The bus driver below us in the stack.
pub trait LowerBus: Send + Sync {
    fn forward_pnp(&self, request: PnpRequest) -> Result<()>;
    fn forward_power(&self, request: PowerRequest);
}

/// Lower bus that accepts everything.
#[derive(Default)]
pub struct NullBus;

impl LowerBus for NullBus {
    fn forward_pnp(&self, _request: PnpRequest) -> Result<()> {
        Ok(())
    }

    fn forward_power(&self, _request: PowerRequest) {}
}

/// Host interfaces a device binds at creation.
#[derive(Clone)]
pub struct DeviceServices {
    pub store: Arc<dyn Store>,
    pub grants: Arc<dyn GrantTable>,
    pub channels: Arc<dyn EventChannels>,
    pub debug: Arc<DebugRegistry>,
    pub suspend: Arc<SuspendNotifier>,
    pub lower: Arc<dyn LowerBus>,
}

/// HID control request with its caller-owned buffer.
pub enum ControlRequest<'a> {
    GetDeviceAttributes(&'a mut [u8]),
    GetDeviceDescriptor(&'a mut [u8]),
    GetReportDescriptor(&'a mut [u8]),
    GetFeature(&'a mut [u8]),
    SetFeature(&'a [u8]),
    WriteReport(&'a [u8]),
}

struct PnpPowerState {
    pnp: PnpState,
    previous_pnp: PnpState,
    device_power: DevicePower,
    system_power: SystemPower,
}

#[derive(Default)]
struct Hooks {
    debug: Option<DebugHandle>,
    suspend: Option<SuspendHandle>,
}

pub struct Fdo {
    frontend: Arc<Frontend>,
    cache: Arc<ReadRequestCache>,
    lower: Arc<dyn LowerBus>,
    debug: Arc<DebugRegistry>,
    suspend: Arc<SuspendNotifier>,
    state: Mutex<PnpPowerState>,
    hooks: Mutex<Hooks>,
    self_weak: Weak<Fdo>,
}

impl Fdo {
    pub fn create(services: DeviceServices, store_path: &str) -> Arc<Self> {
        let cache = Arc::new(ReadRequestCache::new());
        let frontend = Arc::new(Frontend::new(
            services.store,
            services.grants,
            services.channels,
            cache.clone(),
            store_path,
        ));
        Arc::new_cyclic(|weak| Self {
            frontend,
            cache,
            lower: services.lower,
            debug: services.debug,
            suspend: services.suspend,
            state: Mutex::new(PnpPowerState {
                pnp: PnpState::Added,
                previous_pnp: PnpState::Added,
                device_power: DevicePower::D3,
                system_power: SystemPower::Shutdown,
            }),
            hooks: Mutex::new(Hooks::default()),
            self_weak: weak.clone(),
        })
    }

    pub fn frontend(&self) -> &Arc<Frontend> {
        &self.frontend
    }

    pub fn pnp_state(&self) -> PnpState {
        self.state.lock().unwrap().pnp
    }

    pub fn device_power(&self) -> DevicePower {
        self.state.lock().unwrap().device_power
    }

    pub fn system_power(&self) -> SystemPower {
        self.state.lock().unwrap().system_power
    }

    /// Bring the device to started: forward the request down first, then
    /// power up and open the data path.
    pub fn start(&self) -> Result<()> {
        self.lower.forward_pnp(PnpRequest::Start)?;
        self.set_system_power(SystemPower::Working);

        if let Err(err) = self.d3_to_d0() {
            self.set_system_power(SystemPower::Shutdown);
            return Err(err);
        }

        self.cache.resume();
        self.set_pnp_state(PnpState::Started);
        Ok(())
    }

    pub fn query_stop(&self) -> Result<()> {
        self.set_pnp_state(PnpState::StopPending);
        self.lower.forward_pnp(PnpRequest::QueryStop)
    }

    pub fn cancel_stop(&self) -> Result<()> {
        self.restore_pnp_state(PnpState::StopPending);
        self.lower.forward_pnp(PnpRequest::CancelStop)
    }

    pub fn stop(&self) -> Result<()> {
        self.power_down();
        self.set_pnp_state(PnpState::Stopped);
        self.lower.forward_pnp(PnpRequest::Stop)
    }

    pub fn query_remove(&self) -> Result<()> {
        self.set_pnp_state(PnpState::RemovePending);
        self.lower.forward_pnp(PnpRequest::QueryRemove)
    }

    pub fn cancel_remove(&self) -> Result<()> {
        self.restore_pnp_state(PnpState::RemovePending);
        self.lower.forward_pnp(PnpRequest::CancelRemove)
    }

    pub fn surprise_removal(&self) -> Result<()> {
        self.power_down();
        self.set_pnp_state(PnpState::SurpriseRemovePending);
        self.lower.forward_pnp(PnpRequest::SurpriseRemoval)
    }

    pub fn remove(&self) -> Result<()> {
        self.power_down();
        self.set_pnp_state(PnpState::Deleted);
        self.lower.forward_pnp(PnpRequest::Remove)
    }

    /// Power request handling is decoupled from the lifecycle requests: the
    /// data path follows device power, and a system shutdown closes it
    /// regardless of device power. Idempotent.
    pub fn dispatch_power(&self, request: PowerRequest) {
        match request {
            PowerRequest::Device(DevicePower::D0) => self.cache.resume(),
            PowerRequest::Device(DevicePower::D3) => self.cache.pause(),
            PowerRequest::System(SystemPower::Shutdown) => self.cache.pause(),
            PowerRequest::System(SystemPower::Working) => {}
        }
        self.lower.forward_power(request);
    }

    pub fn dispatch_control(&self, request: ControlRequest<'_>) -> Result<usize> {
        match request {
            ControlRequest::GetDeviceAttributes(buf) => self.frontend.device_attributes(buf),
            ControlRequest::GetDeviceDescriptor(buf) => self.frontend.device_descriptor(buf),
            ControlRequest::GetReportDescriptor(buf) => self.frontend.report_descriptor(buf),
            ControlRequest::GetFeature(buf) => self.frontend.get_feature(buf),
            ControlRequest::SetFeature(data) => self.frontend.set_feature(data).map(|()| 0),
            ControlRequest::WriteReport(data) => self.frontend.write_report(data).map(|()| 0),
        }
    }

    /// Issue a read. The request is cached first so a report arriving while
    /// we look for a pending one cannot fall between the two; the returned
    /// handle resolves when a report (or a failure) reaches the request.
    pub fn read_report(&self, capacity: usize) -> ReadHandle {
        let (request, handle) = ReadRequest::new(capacity);
        if self.cache.enqueue(request).is_ok() {
            if let Err(err) = self.frontend.read_report() {
                debug!(%err, "pending report delivery failed");
            }
        }
        handle
    }

    fn d3_to_d0(&self) -> Result<()> {
        let dump_frontend = self.frontend.clone();
        let dump_cache = self.cache.clone();
        let debug_handle = self.debug.register(
            "pvhid",
            Box::new(move || {
                format!(
                    "{}\n{}\ncached requests: {}\n{}",
                    dump_frontend.store_path(),
                    if dump_cache.is_enabled() {
                        "WORKING"
                    } else {
                        "PAUSED"
                    },
                    dump_cache.len(),
                    dump_frontend.debug_dump()
                )
            }),
        );

        if let Err(err) = self.frontend.enable() {
            self.debug.deregister(debug_handle);
            return Err(err);
        }

        let weak = self.self_weak.clone();
        let suspend_handle = self.suspend.register(Box::new(move || {
            if let Some(fdo) = weak.upgrade() {
                fdo.resume_from_suspend();
            }
        }));

        let mut hooks = self.hooks.lock().unwrap();
        hooks.debug = Some(debug_handle);
        hooks.suspend = Some(suspend_handle);
        drop(hooks);

        self.state.lock().unwrap().device_power = DevicePower::D0;
        Ok(())
    }

    fn d0_to_d3(&self) {
        self.state.lock().unwrap().device_power = DevicePower::D3;

        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap());
        if let Some(handle) = hooks.suspend {
            self.suspend.deregister(handle);
        }
        self.frontend.disable();
        if let Some(handle) = hooks.debug {
            self.debug.deregister(handle);
        }
    }

    /// Host-side channel identity did not survive a suspend; tear the
    /// connection down and rebuild it.
    fn resume_from_suspend(&self) {
        self.d0_to_d3();
        if let Err(err) = self.d3_to_d0() {
            warn!(%err, "reconnect after resume failed, device stays down");
        }
    }

    fn power_down(&self) {
        if self.device_power() == DevicePower::D0 {
            self.cache.pause();
            self.d0_to_d3();
            self.set_system_power(SystemPower::Shutdown);
        }
    }

    fn set_pnp_state(&self, new: PnpState) {
        let mut state = self.state.lock().unwrap();
        // Deleted is absorbing.
        assert!(
            state.pnp != PnpState::Deleted || new == PnpState::Deleted,
            "pnp transition out of deleted"
        );
        state.previous_pnp = state.pnp;
        state.pnp = new;
    }

    /// Undo a pending transition, but only if no other transition has
    /// happened since.
    fn restore_pnp_state(&self, pending: PnpState) {
        let mut state = self.state.lock().unwrap();
        if state.pnp == pending {
            state.pnp = state.previous_pnp;
        }
    }

    fn set_system_power(&self, power: SystemPower) {
        self.state.lock().unwrap().system_power = power;
    }
}
