//! Paravirtual HID frontend driver.
//!
//! Presents a backend-driven keyboard and absolute pointer as a HID device:
//! the lifecycle controller ([`fdo`]) sequences plug-and-play and power,
//! the channel negotiator ([`frontend`]) handshakes with the backend over
//! the configuration store, and the device model ([`vkbd`]) consumes the
//! shared event ring and synthesizes deduplicated HID reports.

pub mod cache;
pub mod dpc;
pub mod driver;
pub mod error;
pub mod fdo;
pub mod frontend;
pub mod model;
pub mod request;
pub mod vkbd;

pub use cache::{ReadRequestCache, CACHE_SLOTS};
pub use driver::{Driver, STORE_PATH};
pub use error::{HidError, Result};
pub use fdo::{
    ControlRequest, DevicePower, DeviceServices, Fdo, LowerBus, NullBus, PnpRequest,
    PnpState, PowerRequest, SystemPower,
};
pub use frontend::{Frontend, DEFAULT_WAIT_TIMEOUT};
pub use model::{InputModel, ModelServices, ReadStatus};
pub use request::{ReadHandle, ReadRequest};
