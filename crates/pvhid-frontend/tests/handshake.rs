//! Store handshake scenarios against a scripted backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BackendMode, TestBackend, FRONTEND_PATH};
use pvhid_bus::{MemoryStore, Store, StoreError};
use pvhid_frontend::{Frontend, HidError, ReadRequestCache};
use pvhid_protocol::descriptor::DEVICE_ATTRIBUTES_LEN;
use pvhid_protocol::state::BusState;

fn frontend(backend: &TestBackend) -> Frontend {
    let frontend = Frontend::new(
        backend.store.clone(),
        backend.grants.clone(),
        backend.channels.clone(),
        Arc::new(ReadRequestCache::new()),
        FRONTEND_PATH,
    );
    frontend.set_wait_timeout(Duration::from_secs(5));
    frontend
}

#[test]
fn enable_walks_backend_to_connected() {
    let backend = TestBackend::new(BackendMode::Normal);
    let frontend = frontend(&backend);

    frontend.enable().unwrap();
    assert!(frontend.is_connected());
    assert_eq!(
        backend.store.get(FRONTEND_PATH, "state").unwrap(),
        BusState::Connected.to_wire()
    );
    assert_eq!(
        backend.backend_state().unwrap(),
        BusState::Connected.to_wire()
    );
    assert!(backend.store.get(FRONTEND_PATH, "evtchn").is_some());
    assert!(backend.store.get(FRONTEND_PATH, "gnttab").is_some());

    let mut buf = [0u8; DEVICE_ATTRIBUTES_LEN];
    assert_eq!(
        frontend.device_attributes(&mut buf).unwrap(),
        DEVICE_ATTRIBUTES_LEN
    );
}

#[test]
fn disable_walks_backend_to_closed() {
    let backend = TestBackend::new(BackendMode::Normal);
    let frontend = frontend(&backend);

    frontend.enable().unwrap();
    frontend.disable();

    assert!(!frontend.is_connected());
    assert_eq!(
        backend.store.get(FRONTEND_PATH, "state").unwrap(),
        BusState::Closed.to_wire()
    );
    assert_eq!(backend.backend_state().unwrap(), BusState::Closed.to_wire());

    let mut buf = [0u8; DEVICE_ATTRIBUTES_LEN];
    assert!(matches!(
        frontend.device_attributes(&mut buf),
        Err(HidError::NotReady)
    ));
}

#[test]
fn config_publication_survives_commit_races() {
    let backend = TestBackend::new(BackendMode::Normal);
    let frontend = frontend(&backend);

    // The first two commits lose their race; the handshake must re-run the
    // transaction rather than publish half the configuration.
    backend.store.force_retries(2);
    frontend.enable().unwrap();

    assert!(backend.store.get(FRONTEND_PATH, "evtchn").is_some());
    assert!(backend.store.get(FRONTEND_PATH, "gnttab").is_some());
}

#[test]
fn silent_backend_times_out() {
    let backend = TestBackend::new(BackendMode::IgnoreConnect);
    let frontend = frontend(&backend);
    frontend.set_wait_timeout(Duration::from_millis(200));

    assert!(matches!(frontend.enable(), Err(HidError::Timeout)));
    assert!(!frontend.is_connected());
}

#[test]
fn stall_in_transient_state_is_protocol_error() {
    let backend = TestBackend::new(BackendMode::StallInitialising);
    let frontend = frontend(&backend);
    frontend.set_wait_timeout(Duration::from_millis(300));

    assert!(matches!(
        frontend.enable(),
        Err(HidError::InvalidProtocol(BusState::Initialising))
    ));
}

#[test]
fn backend_refusal_is_protocol_error() {
    let backend = TestBackend::new(BackendMode::RefuseConnect);
    let frontend = frontend(&backend);

    assert!(matches!(
        frontend.enable(),
        Err(HidError::InvalidProtocol(BusState::Closing))
    ));
}

#[test]
fn unknown_protocol_version_is_rejected() {
    let backend = TestBackend::new(BackendMode::Normal);
    backend
        .store
        .write(None, FRONTEND_PATH, "protocol", "3")
        .unwrap();
    let frontend = frontend(&backend);

    assert!(matches!(frontend.enable(), Err(HidError::Unsupported(3))));
    assert!(!frontend.is_connected());
}

#[test]
fn missing_backend_path_skips_the_close_handshake() {
    // No backend directory at all: close has nothing to talk to and must
    // not publish any state, and connect then fails on path resolution.
    let store = Arc::new(MemoryStore::new());
    let backend = TestBackend::new(BackendMode::Normal);
    let frontend = Frontend::new(
        store.clone(),
        backend.grants.clone(),
        backend.channels.clone(),
        Arc::new(ReadRequestCache::new()),
        FRONTEND_PATH,
    );
    frontend.set_wait_timeout(Duration::from_millis(200));

    assert!(matches!(
        frontend.enable(),
        Err(HidError::Store(StoreError::NotFound(_)))
    ));
    assert!(store.get(FRONTEND_PATH, "state").is_none());
}
