//! Virtual keyboard/pointer device model.
//!
//! Consumes the shared event ring and folds raw events into two
//! deduplicated HID reports. Delivery is change-driven: a report is handed
//! to the read-request cache only when an event actually changed it, and a
//! delivery that finds no cached request marks the report pending so the
//! next read picks up the latest state.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use pvhid_bus::{BoundChannel, GrantedPage, Transaction};
use pvhid_protocol::descriptor::{
    device_attributes, device_descriptor, REPORT_DESCRIPTOR,
};
use pvhid_protocol::keymap::{classify, Usage};
use pvhid_protocol::report::{KeyboardReport, PointerReport};
use pvhid_protocol::ring::{EventPage, InputEvent};
use tracing::trace;

use crate::dpc::DpcQueue;
use crate::error::{HidError, Result};
use crate::model::{InputModel, ModelServices, ReadStatus};

pub struct Vkbd {
    shared: Arc<VkbdShared>,
    dpc: Arc<DpcQueue>,
    services: ModelServices,
}

struct VkbdShared {
    cache: Arc<crate::cache::ReadRequestCache>,
    conn: Mutex<Option<Connection>>,
    reports: Mutex<ReportState>,
    interrupts: AtomicU32,
    schedules: AtomicU32,
}

/// Channel resources of one connect. Field order matches release order:
/// close the channel, then revoke and free the granted page.
struct Connection {
    channel: BoundChannel,
    grant: GrantedPage,
}

#[derive(Default)]
struct ReportState {
    keyboard: KeyboardReport,
    pointer: PointerReport,
    keyboard_pending: bool,
    pointer_pending: bool,
}

impl Vkbd {
    pub fn new(services: ModelServices) -> Arc<Self> {
        let shared = Arc::new(VkbdShared {
            cache: services.cache.clone(),
            conn: Mutex::new(None),
            reports: Mutex::new(ReportState::default()),
            interrupts: AtomicU32::new(0),
            schedules: AtomicU32::new(0),
        });
        let poll_shared = shared.clone();
        let dpc = Arc::new(DpcQueue::new(move || poll_shared.poll()));
        Arc::new(Self {
            shared,
            dpc,
            services,
        })
    }
}

impl VkbdShared {
    /// Drain the ring. Re-checks the producer cursor after advertising
    /// consumption so events landing mid-drain are not stranded until the
    /// next interrupt.
    fn poll(&self) {
        let page: Option<Arc<EventPage>> = self
            .conn
            .lock()
            .unwrap()
            .as_ref()
            .map(|conn| conn.grant.page().clone());
        let Some(page) = page else {
            return;
        };

        loop {
            let cons = page.load_in_cons();
            let prod = page.load_in_prod();
            if cons == prod {
                break;
            }

            let mut pos = cons;
            while pos != prod {
                let event = page.read_record(pos);
                pos = pos.wrapping_add(1);
                self.handle_event(event);
            }
            page.store_in_cons(pos);
        }
    }

    fn handle_event(&self, event: InputEvent) {
        match event {
            InputEvent::Key { keycode, pressed } => {
                let Some(usage) = classify(keycode) else {
                    trace!(keycode, "dropping unmapped keycode");
                    return;
                };
                let mut reports = self.reports.lock().unwrap();
                match usage {
                    Usage::Button(bit) => {
                        if reports.pointer.set_button(bit, pressed) {
                            self.deliver_pointer(&mut reports);
                        }
                    }
                    Usage::Modifier(bit) => {
                        if reports.keyboard.set_modifier(bit, pressed) {
                            self.deliver_keyboard(&mut reports);
                        }
                    }
                    Usage::Key(usage) => {
                        if reports.keyboard.set_key(usage, pressed) {
                            self.deliver_keyboard(&mut reports);
                        }
                    }
                }
            }
            InputEvent::Position {
                abs_x,
                abs_y,
                rel_z,
            } => {
                let mut reports = self.reports.lock().unwrap();
                if reports.pointer.set_position(abs_x, abs_y, rel_z) {
                    self.deliver_pointer(&mut reports);
                }
            }
            InputEvent::Unknown => {}
        }
    }

    fn deliver_keyboard(&self, reports: &mut ReportState) {
        if self.cache.complete(&reports.keyboard.to_bytes()).is_err() {
            reports.keyboard_pending = true;
        }
    }

    fn deliver_pointer(&self, reports: &mut ReportState) {
        if self.cache.complete(&reports.pointer.to_bytes()).is_err() {
            reports.pointer_pending = true;
        }
    }
}

impl InputModel for Vkbd {
    fn connect(&self, remote_domain: u16) -> Result<()> {
        let page = Arc::new(EventPage::new());
        let grant = GrantedPage::grant(self.services.grants.clone(), remote_domain, page)?;

        let interrupt_shared = self.shared.clone();
        let dpc = self.dpc.clone();
        let channel = BoundChannel::open(
            self.services.channels.clone(),
            remote_domain,
            Box::new(move || {
                interrupt_shared.interrupts.fetch_add(1, Ordering::Relaxed);
                if dpc.schedule() {
                    interrupt_shared.schedules.fetch_add(1, Ordering::Relaxed);
                }
            }),
        )?;

        *self.shared.conn.lock().unwrap() = Some(Connection { channel, grant });
        Ok(())
    }

    fn write_config(&self, txn: &Transaction) -> Result<()> {
        let conn = self.shared.conn.lock().unwrap();
        let conn = conn.as_ref().ok_or(HidError::NotReady)?;
        let path = &self.services.store_path;
        self.services.store.write(
            Some(txn),
            path,
            "evtchn",
            &conn.channel.port().to_string(),
        )?;
        self.services.store.write(
            Some(txn),
            path,
            "gnttab",
            &conn.grant.reference().to_string(),
        )?;
        Ok(())
    }

    fn disconnect(&self) {
        // Quiesce deferred work before tearing the channel down so no drain
        // races the release.
        self.dpc.flush();
        let conn = self.shared.conn.lock().unwrap().take();
        drop(conn);
    }

    fn debug_dump(&self) -> String {
        let mut out = String::new();
        let conn = self.shared.conn.lock().unwrap();
        match conn.as_ref() {
            Some(conn) => {
                let _ = writeln!(
                    out,
                    "evtchn port: {}, grant ref: {}",
                    conn.channel.port(),
                    conn.grant.reference()
                );
            }
            None => {
                let _ = writeln!(out, "not connected");
            }
        }
        drop(conn);
        let reports = self.shared.reports.lock().unwrap();
        let _ = writeln!(
            out,
            "interrupts: {}, schedules: {}",
            self.shared.interrupts.load(Ordering::Relaxed),
            self.shared.schedules.load(Ordering::Relaxed)
        );
        let _ = write!(
            out,
            "keyboard pending: {}, pointer pending: {}",
            reports.keyboard_pending, reports.pointer_pending
        );
        out
    }

    fn device_attributes(&self, buf: &mut [u8]) -> Result<usize> {
        copy_payload(buf, &device_attributes())
    }

    fn device_descriptor(&self, buf: &mut [u8]) -> Result<usize> {
        copy_payload(buf, &device_descriptor())
    }

    fn report_descriptor(&self, buf: &mut [u8]) -> Result<usize> {
        copy_payload(buf, &REPORT_DESCRIPTOR)
    }

    fn get_feature(&self, _buf: &mut [u8]) -> Result<usize> {
        Err(HidError::NotSupported)
    }

    fn set_feature(&self, _data: &[u8]) -> Result<()> {
        Err(HidError::NotSupported)
    }

    fn write_report(&self, _data: &[u8]) -> Result<()> {
        Err(HidError::NotSupported)
    }

    /// Keyboard state takes priority over pointer state, so a read racing
    /// both pending reports observes key changes first.
    fn read_report(&self) -> Result<ReadStatus> {
        let mut reports = self.shared.reports.lock().unwrap();
        if reports.keyboard_pending {
            self.shared.cache.complete(&reports.keyboard.to_bytes())?;
            reports.keyboard_pending = false;
            return Ok(ReadStatus::Delivered);
        }
        if reports.pointer_pending {
            self.shared.cache.complete(&reports.pointer.to_bytes())?;
            reports.pointer_pending = false;
            return Ok(ReadStatus::Delivered);
        }
        Ok(ReadStatus::Pending)
    }
}

fn copy_payload(buf: &mut [u8], payload: &[u8]) -> Result<usize> {
    if buf.len() < payload.len() {
        return Err(HidError::BufferTooSmall {
            needed: payload.len(),
            provided: buf.len(),
        });
    }
    buf[..payload.len()].copy_from_slice(payload);
    Ok(payload.len())
}
