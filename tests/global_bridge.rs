mod util;
use util::{listener_bound, register_listener, LISTENER_CLASS};

use assert_matches::assert_matches;
use peer_bridge::{errors::Error, refs::ObjectHandle, Bridge, Value};
use rusty_fork::rusty_fork_test;

// Each test runs in its own process so that it sees a pristine global bridge.
rusty_fork_test! {
#[test]
fn global_bridge_is_shared() {
    assert!(std::ptr::eq(Bridge::global(), Bridge::global()));
    assert!(Bridge::global().registry().is_empty());

    register_listener(Bridge::global());
    assert!(Bridge::global().registry().is_registered(&listener_bound()));

    let instance = std::thread::spawn(|| {
        let bridge = Bridge::global();
        let instance = bridge.construct(LISTENER_CLASS);
        bridge
            .activate(&instance, &listener_bound(), "", &[])
            .unwrap();
        instance
    })
    .join()
    .unwrap();

    assert_eq!(
        Bridge::global().dispatch(
            &instance,
            "n_onRemoved",
            "(Ljava/lang/String;)V",
            &[ObjectHandle::string("k").into()]
        ),
        Ok(Value::Void)
    );
    assert!(Bridge::global().instance(instance.id()).is_some());
}

#[test]
fn global_registration_is_idempotent() {
    register_listener(Bridge::global());
    // a managed type is registered once; a repeated method table is a no-op
    assert_matches!(
        Bridge::global().register_type(peer_bridge::ManagedType::new(
            listener_bound().managed().clone()
        )),
        Err(Error::DuplicateRegistration { .. })
    );
    let entry = Bridge::global()
        .register_table(util::LISTENER_TYPE, LISTENER_CLASS, util::LISTENER_METHODS)
        .unwrap();
    assert_eq!(entry.len(), 2);
    assert_eq!(Bridge::global().registry().len(), 1);
}
}
