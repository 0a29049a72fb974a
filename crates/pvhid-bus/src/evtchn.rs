//! Inter-domain event channels.
//!
//! A channel is a level-less doorbell: `notify` wakes the handler bound at
//! `open_unbound` with no payload. Handlers run in interrupt context — they
//! must not block and should do nothing beyond counting and scheduling
//! deferred work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub type Port = u32;

pub type InterruptHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no free event-channel port")]
    Exhausted,

    #[error("unknown port {0}")]
    BadPort(Port),
}

pub trait EventChannels: Send + Sync {
    /// Open an unbound channel toward `remote_domain` and bind `handler` as
    /// its interrupt handler. The returned port is what the backend uses to
    /// signal us, published through the configuration store.
    fn open_unbound(
        &self,
        remote_domain: u16,
        handler: InterruptHandler,
    ) -> Result<Port, ChannelError>;

    fn close(&self, port: Port);

    /// Backend side: ring the doorbell. Unknown ports are ignored (the
    /// frontend may already have closed).
    fn notify(&self, port: Port);
}

/// In-process implementation: `notify` invokes the bound handler inline on
/// the caller's thread, which therefore plays the role of the interrupt
/// context.
#[derive(Default)]
pub struct InProcEventChannels {
    inner: Mutex<ChannelsInner>,
}

#[derive(Default)]
struct ChannelsInner {
    next_port: Port,
    bound: HashMap<Port, Arc<InterruptHandler>>,
}

impl InProcEventChannels {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventChannels for InProcEventChannels {
    fn open_unbound(
        &self,
        _remote_domain: u16,
        handler: InterruptHandler,
    ) -> Result<Port, ChannelError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_port += 1;
        let port = inner.next_port;
        inner.bound.insert(port, Arc::new(handler));
        Ok(port)
    }

    fn close(&self, port: Port) {
        self.inner.lock().unwrap().bound.remove(&port);
    }

    fn notify(&self, port: Port) {
        // Snapshot the handler outside the lock so a handler is never run
        // while the port table is held.
        let handler = self.inner.lock().unwrap().bound.get(&port).cloned();
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// Owned binding of an open channel; closes the port on drop.
pub struct BoundChannel {
    channels: Arc<dyn EventChannels>,
    port: Port,
}

impl BoundChannel {
    pub fn open(
        channels: Arc<dyn EventChannels>,
        remote_domain: u16,
        handler: InterruptHandler,
    ) -> Result<Self, ChannelError> {
        let port = channels.open_unbound(remote_domain, handler)?;
        Ok(Self { channels, port })
    }

    pub fn port(&self) -> Port {
        self.port
    }
}

impl Drop for BoundChannel {
    fn drop(&mut self) {
        self.channels.close(self.port);
    }
}
