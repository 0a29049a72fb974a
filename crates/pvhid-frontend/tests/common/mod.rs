#![allow(dead_code)]

//! Scripted backend for integration tests: a thread that plays the other
//! side of the store handshake and exposes the mapped event ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pvhid_bus::{
    DebugRegistry, EventChannels, InProcEventChannels, MemoryGrantTable, MemoryStore, Store,
    SuspendNotifier,
};
use pvhid_frontend::{DeviceServices, NullBus};
use pvhid_protocol::ring::{EventPage, InputEvent};
use pvhid_protocol::state::BusState;

pub const FRONTEND_PATH: &str = "device/vkbd/0";
pub const BACKEND_PATH: &str = "backend/vkbd/0";

/// How the backend reacts once the frontend announces connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Map the ring, walk through initialised to connected.
    Normal,
    /// Never react to the connect announcement.
    IgnoreConnect,
    /// Start initialising and stall there.
    StallInitialising,
    /// Start initialising, then bail out to closing.
    RefuseConnect,
}

pub struct TestBackend {
    pub store: Arc<MemoryStore>,
    pub grants: Arc<MemoryGrantTable>,
    pub channels: Arc<InProcEventChannels>,
    pub debug: Arc<DebugRegistry>,
    pub suspend: Arc<SuspendNotifier>,
    mapping: Arc<Mutex<Option<(u32, Arc<EventPage>)>>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TestBackend {
    pub fn new(mode: BackendMode) -> Self {
        let store = Arc::new(MemoryStore::new());
        let grants = Arc::new(MemoryGrantTable::new());

        store
            .write(None, FRONTEND_PATH, "backend", BACKEND_PATH)
            .unwrap();
        store.write(None, FRONTEND_PATH, "backend-id", "0").unwrap();
        store
            .write(None, BACKEND_PATH, "state", &BusState::InitWait.to_wire())
            .unwrap();

        let mapping = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let store = store.clone();
            let grants = grants.clone();
            let mapping = mapping.clone();
            let stop = stop.clone();
            thread::spawn(move || run_backend(&store, &grants, &mapping, &stop, mode))
        };

        Self {
            store,
            grants,
            channels: Arc::new(InProcEventChannels::new()),
            debug: Arc::new(DebugRegistry::new()),
            suspend: Arc::new(SuspendNotifier::new()),
            mapping,
            stop,
            worker: Some(worker),
        }
    }

    pub fn services(&self) -> DeviceServices {
        DeviceServices {
            store: self.store.clone(),
            grants: self.grants.clone(),
            channels: self.channels.clone(),
            debug: self.debug.clone(),
            suspend: self.suspend.clone(),
            lower: Arc::new(NullBus),
        }
    }

    /// Produce an event on the currently mapped ring and ring the doorbell.
    pub fn inject(&self, event: InputEvent) {
        let (port, page) = self
            .mapping
            .lock()
            .unwrap()
            .clone()
            .expect("backend has no mapped ring");
        assert!(page.produce(event), "event ring full");
        self.channels.notify(port);
    }

    /// Block until the frontend has consumed every produced event.
    pub fn wait_drained(&self) {
        let (_, page) = self
            .mapping
            .lock()
            .unwrap()
            .clone()
            .expect("backend has no mapped ring");
        let deadline = Instant::now() + Duration::from_secs(5);
        while page.load_in_cons() != page.load_in_prod() {
            assert!(Instant::now() < deadline, "ring was not drained");
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn current_port(&self) -> Option<u32> {
        self.mapping.lock().unwrap().as_ref().map(|(port, _)| *port)
    }

    pub fn backend_state(&self) -> Option<String> {
        self.store.get(BACKEND_PATH, "state")
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_backend(
    store: &MemoryStore,
    grants: &MemoryGrantTable,
    mapping: &Mutex<Option<(u32, Arc<EventPage>)>>,
    stop: &AtomicBool,
    mode: BackendMode,
) {
    let mut last = String::new();
    while !stop.load(Ordering::Relaxed) {
        let Some(state) = store.get(FRONTEND_PATH, "state") else {
            thread::sleep(Duration::from_millis(1));
            continue;
        };
        if state != last {
            last = state.clone();
            react(store, grants, mapping, mode, BusState::from_wire(&state));
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn react(
    store: &MemoryStore,
    grants: &MemoryGrantTable,
    mapping: &Mutex<Option<(u32, Arc<EventPage>)>>,
    mode: BackendMode,
    frontend_state: BusState,
) {
    match frontend_state {
        BusState::Closing => {
            set_backend_state(store, BusState::Closing);
            set_backend_state(store, BusState::Closed);
        }
        BusState::Closed => {
            set_backend_state(store, BusState::Closed);
        }
        BusState::Connected => match mode {
            BackendMode::Normal => {
                let port: u32 = store
                    .get(FRONTEND_PATH, "evtchn")
                    .expect("evtchn not published")
                    .parse()
                    .unwrap();
                let gref: u32 = store
                    .get(FRONTEND_PATH, "gnttab")
                    .expect("gnttab not published")
                    .parse()
                    .unwrap();
                let page = grants.foreign_page(gref).expect("grant not mapped");
                *mapping.lock().unwrap() = Some((port, page));
                set_backend_state(store, BusState::Initialised);
                set_backend_state(store, BusState::Connected);
            }
            BackendMode::IgnoreConnect => {}
            BackendMode::StallInitialising => {
                // Give the frontend time to sample the pre-handshake state
                // so the stall is observed as progress, not as silence.
                thread::sleep(Duration::from_millis(20));
                set_backend_state(store, BusState::Initialising);
            }
            BackendMode::RefuseConnect => {
                thread::sleep(Duration::from_millis(20));
                set_backend_state(store, BusState::Initialising);
                thread::sleep(Duration::from_millis(20));
                set_backend_state(store, BusState::Closing);
            }
        },
        _ => {}
    }
}

fn set_backend_state(store: &MemoryStore, state: BusState) {
    store
        .write(None, BACKEND_PATH, "state", &state.to_wire())
        .unwrap();
}
