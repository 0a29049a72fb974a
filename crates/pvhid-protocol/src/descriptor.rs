//! Static HID descriptors for the combined keyboard + absolute-pointer
//! device.

use crate::report::{KEYBOARD_REPORT_ID, POINTER_REPORT_ID};

pub const VENDOR_ID: u16 = 0xbeef;
pub const PRODUCT_ID: u16 = 0xfeed;
pub const VERSION: u16 = 0x0101;

/// Report descriptor: one keyboard application collection (8-bit modifier
/// field, reserved byte, 6-byte key array) and one mouse application
/// collection (5 buttons, 16-bit absolute X/Y, 8-bit relative wheel).
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: [u8; 113] = [
    0x05, 0x01,                     // Usage Page (Generic Desktop)
    0x09, 0x06,                     // Usage (Keyboard)
    0xa1, 0x01,                     // Collection (Application)
    0x85, KEYBOARD_REPORT_ID,       //   Report ID (1)
    0x05, 0x07,                     //   Usage Page (Keyboard)
    0x19, 0xe0,                     //   Usage Minimum (LeftControl)
    0x29, 0xe7,                     //   Usage Maximum (Right GUI)
    0x15, 0x00,                     //   Logical Minimum (0)
    0x25, 0x01,                     //   Logical Maximum (1)
    0x75, 0x01,                     //   Report Size (1)
    0x95, 0x08,                     //   Report Count (8)
    0x81, 0x02,                     //   Input (Data,Var,Abs)
    0x95, 0x01,                     //   Report Count (1)
    0x75, 0x08,                     //   Report Size (8)
    0x81, 0x03,                     //   Input (Cnst,Var,Abs)
    0x95, 0x06,                     //   Report Count (6)
    0x75, 0x08,                     //   Report Size (8)
    0x15, 0x00,                     //   Logical Minimum (0)
    0x25, 0x65,                     //   Logical Maximum (101)
    0x05, 0x07,                     //   Usage Page (Keyboard)
    0x19, 0x00,                     //   Usage Minimum (0)
    0x29, 0x65,                     //   Usage Maximum (101)
    0x81, 0x00,                     //   Input (Data,Ary,Abs)
    0xc0,                           // End Collection
    0x05, 0x01,                     // Usage Page (Generic Desktop)
    0x09, 0x02,                     // Usage (Mouse)
    0xa1, 0x01,                     // Collection (Application)
    0x85, POINTER_REPORT_ID,        //   Report ID (2)
    0x09, 0x01,                     //   Usage (Pointer)
    0xa1, 0x00,                     //   Collection (Physical)
    0x05, 0x09,                     //     Usage Page (Button)
    0x19, 0x01,                     //     Usage Minimum (Button 1)
    0x29, 0x05,                     //     Usage Maximum (Button 5)
    0x15, 0x00,                     //     Logical Minimum (0)
    0x25, 0x01,                     //     Logical Maximum (1)
    0x95, 0x05,                     //     Report Count (5)
    0x75, 0x01,                     //     Report Size (1)
    0x81, 0x02,                     //     Input (Data,Var,Abs)
    0x95, 0x01,                     //     Report Count (1)
    0x75, 0x03,                     //     Report Size (3)
    0x81, 0x03,                     //     Input (Cnst,Var,Abs)
    0x05, 0x01,                     //     Usage Page (Generic Desktop)
    0x09, 0x30,                     //     Usage (X)
    0x09, 0x31,                     //     Usage (Y)
    0x16, 0x00, 0x00,               //     Logical Minimum (0)
    0x26, 0xff, 0x7f,               //     Logical Maximum (32767)
    0x75, 0x10,                     //     Report Size (16)
    0x95, 0x02,                     //     Report Count (2)
    0x81, 0x02,                     //     Input (Data,Var,Abs)
    0x09, 0x38,                     //     Usage (Wheel)
    0x15, 0x81,                     //     Logical Minimum (-127)
    0x25, 0x7f,                     //     Logical Maximum (127)
    0x75, 0x08,                     //     Report Size (8)
    0x95, 0x01,                     //     Report Count (1)
    0x81, 0x06,                     //     Input (Data,Var,Rel)
    0xc0,                           //   End Collection
    0xc0,                           // End Collection
];

pub const DEVICE_ATTRIBUTES_LEN: usize = 8;
pub const DEVICE_DESCRIPTOR_LEN: usize = 9;

/// 8-byte device-attributes structure: structure size, vendor id, product
/// id, version, each a little-endian u16.
pub fn device_attributes() -> [u8; DEVICE_ATTRIBUTES_LEN] {
    let mut out = [0u8; DEVICE_ATTRIBUTES_LEN];
    out[0..2].copy_from_slice(&(DEVICE_ATTRIBUTES_LEN as u16).to_le_bytes());
    out[2..4].copy_from_slice(&VENDOR_ID.to_le_bytes());
    out[4..6].copy_from_slice(&PRODUCT_ID.to_le_bytes());
    out[6..8].copy_from_slice(&VERSION.to_le_bytes());
    out
}

/// Class device descriptor referencing the report descriptor by length.
pub fn device_descriptor() -> [u8; DEVICE_DESCRIPTOR_LEN] {
    let report_len = REPORT_DESCRIPTOR.len() as u16;
    let mut out = [0u8; DEVICE_DESCRIPTOR_LEN];
    out[0] = DEVICE_DESCRIPTOR_LEN as u8;
    out[1] = 0x21; // HID class descriptor
    out[2..4].copy_from_slice(&VERSION.to_le_bytes());
    out[4] = 0x00; // country code
    out[5] = 0x01; // one class descriptor follows
    out[6] = 0x22; // report descriptor
    out[7..9].copy_from_slice(&report_len.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lengths_are_consistent() {
        let desc = device_descriptor();
        assert_eq!(desc[0] as usize, desc.len());
        let report_len = u16::from_le_bytes([desc[7], desc[8]]);
        assert_eq!(report_len as usize, REPORT_DESCRIPTOR.len());
    }

    #[test]
    fn attributes_layout() {
        let attrs = device_attributes();
        assert_eq!(u16::from_le_bytes([attrs[0], attrs[1]]), 8);
        assert_eq!(u16::from_le_bytes([attrs[2], attrs[3]]), VENDOR_ID);
        assert_eq!(u16::from_le_bytes([attrs[4], attrs[5]]), PRODUCT_ID);
        assert_eq!(u16::from_le_bytes([attrs[6], attrs[7]]), VERSION);
    }
}
