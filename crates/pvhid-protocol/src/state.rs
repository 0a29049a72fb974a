use std::fmt;

/// Backend/frontend handshake state as mirrored through the configuration
/// store's per-device `state` key.
///
/// The wire encoding is the decimal string of the discriminant; anything
/// unparseable or out of range decodes to [`BusState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BusState {
    Unknown = 0,
    Initialising = 1,
    InitWait = 2,
    Initialised = 3,
    Connected = 4,
    Closing = 5,
    Closed = 6,
    Reconfiguring = 7,
    Reconfigured = 8,
}

impl BusState {
    pub fn from_wire(value: &str) -> Self {
        match value.trim().parse::<u32>() {
            Ok(1) => BusState::Initialising,
            Ok(2) => BusState::InitWait,
            Ok(3) => BusState::Initialised,
            Ok(4) => BusState::Connected,
            Ok(5) => BusState::Closing,
            Ok(6) => BusState::Closed,
            Ok(7) => BusState::Reconfiguring,
            Ok(8) => BusState::Reconfigured,
            _ => BusState::Unknown,
        }
    }

    pub fn to_wire(self) -> String {
        (self as u32).to_string()
    }

    /// States a backend passes through while bringing a session up. The
    /// connect wait keeps waiting across these; only terminal states decide
    /// the handshake.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            BusState::Initialising
                | BusState::InitWait
                | BusState::Initialised
                | BusState::Reconfiguring
                | BusState::Reconfigured
        )
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusState::Unknown => "Unknown",
            BusState::Initialising => "Initialising",
            BusState::InitWait => "InitWait",
            BusState::Initialised => "Initialised",
            BusState::Connected => "Connected",
            BusState::Closing => "Closing",
            BusState::Closed => "Closed",
            BusState::Reconfiguring => "Reconfiguring",
            BusState::Reconfigured => "Reconfigured",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for state in [
            BusState::Unknown,
            BusState::Initialising,
            BusState::InitWait,
            BusState::Initialised,
            BusState::Connected,
            BusState::Closing,
            BusState::Closed,
            BusState::Reconfiguring,
            BusState::Reconfigured,
        ] {
            assert_eq!(BusState::from_wire(&state.to_wire()), state);
        }
    }

    #[test]
    fn garbage_decodes_to_unknown() {
        assert_eq!(BusState::from_wire(""), BusState::Unknown);
        assert_eq!(BusState::from_wire("99"), BusState::Unknown);
        assert_eq!(BusState::from_wire("closed"), BusState::Unknown);
    }
}
