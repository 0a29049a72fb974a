//! Driver registration object: tracks the devices created on this driver's
//! behalf and tears them down at unload.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::fdo::{DeviceServices, Fdo, PnpState};

/// Store directory of the single keyboard/pointer device this protocol
/// defines.
pub const STORE_PATH: &str = "device/vkbd/0";

pub struct Driver {
    services: DeviceServices,
    devices: Mutex<Vec<Arc<Fdo>>>,
}

impl Driver {
    pub fn new(services: DeviceServices) -> Self {
        Self {
            services,
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Create a device bound to `store_path` and track it until removal.
    pub fn add_device(&self, store_path: &str) -> Arc<Fdo> {
        let fdo = Fdo::create(self.services.clone(), store_path);
        self.devices.lock().unwrap().push(fdo.clone());
        info!(path = store_path, "device added");
        fdo
    }

    /// Drop a deleted device from the tracking list.
    pub fn remove_device(&self, fdo: &Arc<Fdo>) {
        assert_eq!(fdo.pnp_state(), PnpState::Deleted);
        self.devices
            .lock()
            .unwrap()
            .retain(|device| !Arc::ptr_eq(device, fdo));
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// Unload path: remove every remaining device.
    pub fn unload(&self) {
        let devices: Vec<Arc<Fdo>> = self.devices.lock().unwrap().drain(..).collect();
        for fdo in devices {
            if fdo.pnp_state() != PnpState::Deleted {
                let _ = fdo.remove();
            }
        }
        info!("driver unloaded");
    }
}
