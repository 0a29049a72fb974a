//! Classification of raw backend keycodes into HID usages.
//!
//! Keycodes follow the Linux input ABI. A code maps to exactly one of three
//! HID destinations: a pointer button bit, a keyboard modifier bit, or a
//! keyboard usage code for the rollover array. Codes with no entry are
//! dropped by the consumer.

/// Where a keycode lands in the synthesized reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Pointer report button bitmask bit.
    Button(u8),
    /// Keyboard report modifier bitmask bit.
    Modifier(u8),
    /// Keyboard usage code for the 6-slot array.
    Key(u8),
}

pub fn classify(keycode: u32) -> Option<Usage> {
    use Usage::*;

    let usage = match keycode {
        1 => Key(0x29),   // Esc
        2 => Key(0x1e),   // 1
        3 => Key(0x1f),   // 2
        4 => Key(0x20),   // 3
        5 => Key(0x21),   // 4
        6 => Key(0x22),   // 5
        7 => Key(0x23),   // 6
        8 => Key(0x24),   // 7
        9 => Key(0x25),   // 8
        10 => Key(0x26),  // 9
        11 => Key(0x27),  // 0
        12 => Key(0x2d),  // -
        13 => Key(0x2e),  // =
        14 => Key(0x2a),  // Backspace
        15 => Key(0x2b),  // Tab
        16 => Key(0x14),  // Q
        17 => Key(0x1a),  // W
        18 => Key(0x08),  // E
        19 => Key(0x15),  // R
        20 => Key(0x17),  // T
        21 => Key(0x1c),  // Y
        22 => Key(0x18),  // U
        23 => Key(0x0c),  // I
        24 => Key(0x12),  // O
        25 => Key(0x13),  // P
        26 => Key(0x2f),  // [
        27 => Key(0x30),  // ]
        28 => Key(0x28),  // Enter
        29 => Key(0xe0),  // LeftCtrl (as array usage)
        30 => Key(0x04),  // A
        31 => Key(0x16),  // S
        32 => Key(0x07),  // D
        33 => Key(0x09),  // F
        34 => Key(0x0a),  // G
        35 => Key(0x0b),  // H
        36 => Key(0x0d),  // J
        37 => Key(0x0e),  // K
        38 => Key(0x0f),  // L
        39 => Key(0x33),  // ;
        40 => Key(0x34),  // '
        41 => Key(0x35),  // `
        42 => Key(0xe1),  // LeftShift (as array usage)
        43 => Key(0x31),  // backslash
        44 => Key(0x1d),  // Z
        45 => Key(0x1b),  // X
        46 => Key(0x06),  // C
        47 => Key(0x19),  // V
        48 => Key(0x05),  // B
        49 => Key(0x11),  // N
        50 => Key(0x10),  // M
        51 => Key(0x36),  // ,
        52 => Key(0x37),  // .
        53 => Key(0x38),  // /
        54 => Key(0xe5),  // RightShift (as array usage)
        55 => Key(0x55),  // KP *
        56 => Key(0xe2),  // LeftAlt (as array usage)
        57 => Key(0x2c),  // Space
        58 => Key(0x39),  // CapsLock
        59 => Key(0x3a),  // F1
        60 => Key(0x3b),  // F2
        61 => Key(0x3c),  // F3
        62 => Key(0x3d),  // F4
        63 => Key(0x3e),  // F5
        64 => Key(0x3f),  // F6
        65 => Key(0x40),  // F7
        66 => Key(0x41),  // F8
        67 => Key(0x42),  // F9
        68 => Key(0x43),  // F10
        69 => Key(0x53),  // NumLock
        70 => Key(0x47),  // ScrollLock
        71 => Key(0x5f),  // KP 7
        72 => Key(0x60),  // KP 8
        73 => Key(0x61),  // KP 9
        74 => Key(0x56),  // KP -
        75 => Key(0x5c),  // KP 4
        76 => Key(0x5d),  // KP 5
        77 => Key(0x5e),  // KP 6
        78 => Key(0x57),  // KP +
        79 => Key(0x59),  // KP 1
        80 => Key(0x5a),  // KP 2
        81 => Key(0x5b),  // KP 3
        82 => Key(0x62),  // KP 0
        83 => Key(0x63),  // KP .
        85 => Key(0x87),  // International1
        86 => Key(0x32),  // 102nd
        87 => Key(0x44),  // F11
        88 => Key(0x45),  // F12
        89 => Key(0x88),  // International2
        90 => Key(0x89),  // International3
        91 => Key(0x8a),  // International4
        92 => Key(0x8b),  // International5
        93 => Key(0x8c),  // International6
        94 => Key(0x8d),  // International7
        96 => Key(0x58),  // KP Enter
        97 => Key(0xe4),  // RightCtrl (as array usage)
        98 => Key(0x54),  // KP /
        99 => Key(0x46),  // SysRq
        100 => Key(0xe6), // RightAlt (as array usage)
        102 => Key(0x4a), // Home
        103 => Key(0x52), // Up
        104 => Key(0x4b), // PageUp
        105 => Key(0x50), // Left
        106 => Key(0x4f), // Right
        107 => Key(0x4d), // End
        108 => Key(0x51), // Down
        109 => Key(0x4e), // PageDown
        110 => Key(0x49), // Insert
        111 => Key(0x4c), // Delete
        113 => Key(0x7f), // Mute
        114 => Key(0x81), // VolumeDown
        115 => Key(0x80), // VolumeUp
        116 => Key(0x66), // Power
        117 => Key(0x86), // KP =
        118 => Key(0xd7), // KP +/-
        119 => Key(0x48), // Pause
        121 => Key(0x85), // KP ,
        122 => Key(0x8e), // Hangeul
        123 => Key(0x8f), // Hanja
        124 => Key(0x90), // Yen
        125 => Key(0xe3), // LeftMeta (as array usage)
        126 => Key(0xe7), // RightMeta (as array usage)
        127 => Key(0x65), // Compose
        131 => Key(0x7a), // Undo
        133 => Key(0x7c), // Copy
        135 => Key(0x7d), // Paste
        137 => Key(0x7b), // Cut
        138 => Key(0x75), // Help
        139 => Key(0x76), // Menu
        179 => Key(0xb6), // KP (
        180 => Key(0xb7), // KP )
        182 => Key(0x79), // Again
        183 => Key(0x68), // F13
        184 => Key(0x69), // F14
        185 => Key(0x6a), // F15
        186 => Key(0x6b), // F16
        187 => Key(0x6c), // F17
        188 => Key(0x6d), // F18
        189 => Key(0x6e), // F19
        190 => Key(0x6f), // F20
        191 => Key(0x70), // F21
        192 => Key(0x71), // F22
        193 => Key(0x72), // F23
        194 => Key(0x73), // F24

        // Modifier bitmask bits, LeftCtrl..RightGUI.
        0xe0 => Modifier(0x01),
        0xe1 => Modifier(0x02),
        0xe2 => Modifier(0x04),
        0xe3 => Modifier(0x08),
        0xe4 => Modifier(0x10),
        0xe5 => Modifier(0x20),
        0xe6 => Modifier(0x40),
        0xe7 => Modifier(0x80),

        // Pointer buttons, BTN_LEFT..BTN_EXTRA.
        0x110 => Button(0x01),
        0x111 => Button(0x02),
        0x112 => Button(0x04),
        0x113 => Button(0x08),
        0x114 => Button(0x10),

        _ => return None,
    };
    Some(usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representative_entries() {
        assert_eq!(classify(30), Some(Usage::Key(0x04)));
        assert_eq!(classify(0xe0), Some(Usage::Modifier(0x01)));
        assert_eq!(classify(0x110), Some(Usage::Button(0x01)));
    }

    #[test]
    fn unmapped_codes() {
        assert_eq!(classify(0), None);
        assert_eq!(classify(84), None);
        assert_eq!(classify(0x115), None);
        assert_eq!(classify(0xffff), None);
    }
}
