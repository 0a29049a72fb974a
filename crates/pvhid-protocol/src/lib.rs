//! Wire-level types for the paravirtual keyboard/pointer frontend.
//!
//! Everything in this crate is pure data: the backend handshake state
//! encoding, the shared event-ring page layout, HID report layouts, the
//! keycode classification table and the static descriptors. The state
//! machines that move this data live in `pvhid-frontend`.

pub mod descriptor;
pub mod keymap;
pub mod report;
pub mod ring;
pub mod state;
