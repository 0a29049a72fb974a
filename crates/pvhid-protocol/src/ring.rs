//! Shared event-ring page.
//!
//! One 4 KiB page is shared between the backend (producer) and the frontend
//! (consumer). The page starts with the producer/consumer cursors; the
//! incoming event ring sits at a fixed offset and holds fixed-size records.
//!
//! Synchronization is cursor-only: the producer fills a record and then
//! Release-stores `in_prod`; the consumer Acquire-loads `in_prod` before
//! touching records and Release-stores `in_cons` only once it is done with
//! them. The payload cells themselves are relaxed atomics — the cursor
//! ordering is what makes a record's bytes visible before the record is,
//! and keeps a slot unreused until the consumer has advertised it free.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

pub const PAGE_SIZE: usize = 4096;
pub const EVENT_SIZE: usize = 40;
pub const IN_RING_OFFSET: usize = 1024;
pub const IN_RING_BYTES: usize = 2048;
pub const IN_RING_LEN: u32 = (IN_RING_BYTES / EVENT_SIZE) as u32;

pub const EVENT_TYPE_KEY: u8 = 2;
pub const EVENT_TYPE_POS: u8 = 3;

/// A raw input event as carried in one ring record.
///
/// Record layout (little-endian):
/// - byte 0: type
/// - key: byte 1 = pressed, bytes 4..8 = keycode
/// - position: bytes 4..8 = abs X, 8..12 = abs Y, 12..16 = relative Z
///
/// Unrecognized record types decode to [`InputEvent::Unknown`] and are
/// skipped by consumers rather than treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key { keycode: u32, pressed: bool },
    Position { abs_x: i32, abs_y: i32, rel_z: i32 },
    Unknown,
}

impl InputEvent {
    pub fn to_record(self) -> [u8; EVENT_SIZE] {
        let mut out = [0u8; EVENT_SIZE];
        match self {
            InputEvent::Key { keycode, pressed } => {
                out[0] = EVENT_TYPE_KEY;
                out[1] = pressed as u8;
                out[4..8].copy_from_slice(&keycode.to_le_bytes());
            }
            InputEvent::Position {
                abs_x,
                abs_y,
                rel_z,
            } => {
                out[0] = EVENT_TYPE_POS;
                out[4..8].copy_from_slice(&abs_x.to_le_bytes());
                out[8..12].copy_from_slice(&abs_y.to_le_bytes());
                out[12..16].copy_from_slice(&rel_z.to_le_bytes());
            }
            InputEvent::Unknown => {}
        }
        out
    }

    pub fn from_record(bytes: &[u8; EVENT_SIZE]) -> Self {
        match bytes[0] {
            EVENT_TYPE_KEY => InputEvent::Key {
                keycode: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
                pressed: bytes[1] != 0,
            },
            EVENT_TYPE_POS => InputEvent::Position {
                abs_x: i32::from_le_bytes(bytes[4..8].try_into().unwrap()),
                abs_y: i32::from_le_bytes(bytes[8..12].try_into().unwrap()),
                rel_z: i32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            },
            _ => InputEvent::Unknown,
        }
    }
}

/// The shared page. Allocated by the frontend on connect, granted to the
/// backend domain, and freed on disconnect.
pub struct EventPage {
    in_cons: AtomicU32,
    in_prod: AtomicU32,
    ring: [AtomicU8; IN_RING_BYTES],
}

impl EventPage {
    pub fn new() -> Self {
        Self {
            in_cons: AtomicU32::new(0),
            in_prod: AtomicU32::new(0),
            ring: std::array::from_fn(|_| AtomicU8::new(0)),
        }
    }

    /// Consumer-side snapshot of the producer cursor.
    pub fn load_in_prod(&self) -> u32 {
        self.in_prod.load(Ordering::Acquire)
    }

    pub fn load_in_cons(&self) -> u32 {
        self.in_cons.load(Ordering::Acquire)
    }

    /// Advertise consumed records. Must only be called after every record up
    /// to `cons` has been fully read out.
    pub fn store_in_cons(&self, cons: u32) {
        self.in_cons.store(cons, Ordering::Release);
    }

    /// Read the record at an absolute ring position (not yet wrapped).
    pub fn read_record(&self, pos: u32) -> InputEvent {
        let base = (pos % IN_RING_LEN) as usize * EVENT_SIZE;
        let mut bytes = [0u8; EVENT_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.ring[base + i].load(Ordering::Relaxed);
        }
        InputEvent::from_record(&bytes)
    }

    /// Producer side: append one event. Returns `false` (event dropped) if
    /// the ring is full, matching what a backend does when the frontend has
    /// stalled.
    pub fn produce(&self, event: InputEvent) -> bool {
        let prod = self.in_prod.load(Ordering::Relaxed);
        let cons = self.in_cons.load(Ordering::Acquire);
        if prod.wrapping_sub(cons) >= IN_RING_LEN {
            return false;
        }
        let base = (prod % IN_RING_LEN) as usize * EVENT_SIZE;
        for (i, b) in event.to_record().iter().enumerate() {
            self.ring[base + i].store(*b, Ordering::Relaxed);
        }
        self.in_prod.store(prod.wrapping_add(1), Ordering::Release);
        true
    }
}

impl Default for EventPage {
    fn default() -> Self {
        Self::new()
    }
}
