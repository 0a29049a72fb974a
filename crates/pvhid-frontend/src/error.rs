use pvhid_bus::{ChannelError, GrantError, StoreError};
use pvhid_protocol::state::BusState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HidError {
    /// The device is not connected, or the read-request cache is paused.
    #[error("device not ready")]
    NotReady,

    /// A fixed-capacity resource (the read-request cache) is full.
    #[error("no free request slot")]
    Exhausted,

    /// The backend settled in a state other than connected during the
    /// handshake.
    #[error("backend refused handshake, settled in state {0}")]
    InvalidProtocol(BusState),

    /// The backend made no state change within the handshake wait bound.
    #[error("timed out waiting for backend state change")]
    Timeout,

    /// The negotiated protocol version has no device model.
    #[error("unsupported protocol version {0}")]
    Unsupported(u32),

    /// The device model does not implement this operation.
    #[error("operation not supported")]
    NotSupported,

    /// A caller-supplied buffer cannot hold the payload.
    #[error("buffer too small: need {needed} bytes, got {provided}")]
    BufferTooSmall { needed: usize, provided: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, HidError>;
