//! HID input report layouts and the state-folding rules that keep them
//! deduplicated.
//!
//! Both reports carry their report id as byte 0 so the two collections can
//! share one read pipe. All mutators return whether the report actually
//! changed; callers only deliver a report when something did.

pub const KEYBOARD_REPORT_ID: u8 = 1;
pub const POINTER_REPORT_ID: u8 = 2;

pub const KEYBOARD_REPORT_LEN: usize = 8;
pub const POINTER_REPORT_LEN: usize = 7;

pub const KEY_SLOTS: usize = 6;

pub const ABS_MAX: i32 = 32767;
pub const WHEEL_MIN: i32 = -127;
pub const WHEEL_MAX: i32 = 127;

/// 8-key-rollover keyboard report: modifier bitmask plus a dense 6-slot
/// array of USB usage codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub keys: [u8; KEY_SLOTS],
}

impl KeyboardReport {
    pub fn new() -> Self {
        Self {
            modifiers: 0,
            keys: [0; KEY_SLOTS],
        }
    }

    /// Toggle a modifier bit. Returns `false` when the bit already had the
    /// requested value.
    pub fn set_modifier(&mut self, bit: u8, pressed: bool) -> bool {
        update_bit(&mut self.modifiers, bit, pressed)
    }

    /// Fold a key press/release into the rollover array.
    ///
    /// Press: ignored if the usage is already present; otherwise it lands in
    /// the first empty slot, or overwrites the last slot when all six are
    /// occupied (the ghosting policy of a full-size keyboard). Release:
    /// removes the usage and compacts the array left, so the occupied prefix
    /// stays dense.
    pub fn set_key(&mut self, usage: u8, pressed: bool) -> bool {
        if pressed {
            for slot in self.keys.iter_mut() {
                if *slot == usage {
                    return false;
                }
                if *slot == 0 {
                    *slot = usage;
                    return true;
                }
            }
            self.keys[KEY_SLOTS - 1] = usage;
            true
        } else {
            let Some(index) = self.keys.iter().position(|&slot| slot == usage) else {
                return false;
            };
            self.keys.copy_within(index + 1.., index);
            self.keys[KEY_SLOTS - 1] = 0;
            true
        }
    }

    pub fn to_bytes(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        let mut out = [0u8; KEYBOARD_REPORT_LEN];
        out[0] = KEYBOARD_REPORT_ID;
        out[1] = self.modifiers;
        out[2..8].copy_from_slice(&self.keys);
        out
    }
}

impl Default for KeyboardReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute-pointer report: 5-button bitmask, 16-bit absolute X/Y and an
/// 8-bit signed wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerReport {
    pub buttons: u8,
    pub x: u16,
    pub y: u16,
    pub z: i8,
}

impl PointerReport {
    pub fn new() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            z: 0,
        }
    }

    pub fn set_button(&mut self, bit: u8, pressed: bool) -> bool {
        update_bit(&mut self.buttons, bit, pressed)
    }

    /// Fold an absolute position event in, clamping each axis to its
    /// descriptor range. Returns `false` when the clamped triple equals the
    /// current state.
    pub fn set_position(&mut self, abs_x: i32, abs_y: i32, rel_z: i32) -> bool {
        let x = abs_x.clamp(0, ABS_MAX) as u16;
        let y = abs_y.clamp(0, ABS_MAX) as u16;
        let z = rel_z.clamp(WHEEL_MIN, WHEEL_MAX) as i8;
        if x == self.x && y == self.y && z == self.z {
            return false;
        }
        self.x = x;
        self.y = y;
        self.z = z;
        true
    }

    pub fn to_bytes(&self) -> [u8; POINTER_REPORT_LEN] {
        let mut out = [0u8; POINTER_REPORT_LEN];
        out[0] = POINTER_REPORT_ID;
        out[1] = self.buttons;
        out[2..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..6].copy_from_slice(&self.y.to_le_bytes());
        out[6] = self.z as u8;
        out
    }
}

impl Default for PointerReport {
    fn default() -> Self {
        Self::new()
    }
}

fn update_bit(bits: &mut u8, bit: u8, pressed: bool) -> bool {
    if pressed {
        if *bits & bit != 0 {
            return false;
        }
        *bits |= bit;
    } else {
        if *bits & bit == 0 {
            return false;
        }
        *bits &= !bit;
    }
    true
}
