//! Host/hypervisor service interfaces the frontend drives.
//!
//! Each module defines the trait the frontend programs against plus a
//! complete in-process implementation. The in-process variants back the
//! integration tests and any user-space re-hosting of the device: the
//! "interrupt" delivered by [`evtchn::EventChannels::notify`] is an inline
//! call into the registered handler, which must behave like a real top
//! half (non-blocking, signal-only).

pub mod debug;
pub mod evtchn;
pub mod gnttab;
pub mod store;
pub mod suspend;

pub use debug::{DebugHandle, DebugRegistry};
pub use evtchn::{BoundChannel, ChannelError, EventChannels, InProcEventChannels, Port};
pub use gnttab::{GrantError, GrantRef, GrantTable, GrantedPage, MemoryGrantTable};
pub use store::{Commit, MemoryStore, Store, StoreError, Transaction, Watch};
pub use suspend::{SuspendHandle, SuspendNotifier};
