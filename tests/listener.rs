mod util;
use util::{activated_listener, bridge, listener_bound, Listener, LISTENER_CLASS};

use assert_matches::assert_matches;
use peer_bridge::{
    errors::{Error, ReportAndDefault},
    refs::ObjectHandle,
    InstanceState, Value,
};

#[test]
fn events_reach_their_own_peer() {
    let (bridge, sink) = bridge();
    let i1 = activated_listener(&bridge);
    let i2 = activated_listener(&bridge);

    bridge
        .dispatch(
            &i1,
            "n_onReceived",
            "(Ljava/lang/Object;)V",
            &[ObjectHandle::string("Obj").into()],
        )
        .unwrap();
    bridge
        .dispatch(
            &i2,
            "n_onRemoved",
            "(Ljava/lang/String;)V",
            &[ObjectHandle::string("k").into()],
        )
        .unwrap();

    let p1 = bridge.lookup_peer(&i1).unwrap();
    let p2 = bridge.lookup_peer(&i2).unwrap();
    assert!(!p1.same_peer(&p2));

    let l1 = p1.downcast_ref::<Listener>().unwrap();
    let l2 = p2.downcast_ref::<Listener>().unwrap();
    assert_eq!(l1.received(), vec![Some("Obj".to_owned())]);
    assert!(l1.removed().is_empty());
    assert!(l2.received().is_empty());
    assert_eq!(l2.removed(), vec!["k".to_owned()]);
    assert!(sink.is_empty());
}

#[test]
fn dispatch_needs_an_activated_peer() {
    let (bridge, _sink) = bridge();
    let instance = bridge.construct(LISTENER_CLASS);
    let args: [Value; 1] = [ObjectHandle::string("k").into()];

    assert_matches!(
        bridge.dispatch(&instance, "n_onRemoved", "(Ljava/lang/String;)V", &args),
        Err(Error::NoPeer { .. })
    );

    bridge
        .activate(&instance, &listener_bound(), "", &[])
        .unwrap();
    assert_eq!(
        bridge.dispatch(&instance, "n_onRemoved", "(Ljava/lang/String;)V", &args),
        Ok(Value::Void)
    );
}

#[test]
fn finalize_releases_retained_references() {
    let (bridge, sink) = bridge();
    let instance = activated_listener(&bridge);

    let (a, b) = (ObjectHandle::string("a"), ObjectHandle::string("b"));
    let (weak_a, weak_b) = (a.downgrade(), b.downgrade());
    for obj in [a, b] {
        bridge
            .dispatch(&instance, "n_onReceived", "(Ljava/lang/Object;)V", &[obj.into()])
            .unwrap();
    }
    assert_eq!(bridge.retained(&instance).len(), 2);
    assert!(weak_a.is_alive() && weak_b.is_alive());

    assert!(bridge.finalize(&instance));
    assert!(!weak_a.is_alive());
    assert!(!weak_b.is_alive());
    assert_eq!(instance.state(), InstanceState::TornDown);
    assert_eq!(bridge.live_instances(), 0);

    assert_matches!(
        bridge.dispatch(
            &instance,
            "n_onReceived",
            "(Ljava/lang/Object;)V",
            &[Value::NULL]
        ),
        Err(Error::NoPeer { .. })
    );

    // the native side only sees the default value, the failure goes to the sink
    assert_eq!(
        bridge.trampoline::<ReportAndDefault>(
            &instance,
            "n_onReceived",
            "(Ljava/lang/Object;)V",
            &[Value::NULL]
        ),
        Value::Void
    );
    let failures = sink.drain();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].instance, instance.id());
    assert_matches!(failures[0].error, Error::NoPeer { .. });
}

#[test]
fn managed_exceptions_reach_the_sink_for_void_methods() {
    let (bridge, sink) = bridge();
    let instance = activated_listener(&bridge);

    let ret = bridge.trampoline::<ReportAndDefault>(
        &instance,
        "n_onRemoved",
        "(Ljava/lang/String;)V",
        &[Value::NULL],
    );
    assert_eq!(ret, Value::Void);

    let failures = sink.drain();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].method, "n_onRemoved");
    assert_matches!(
        &failures[0].error,
        Error::ManagedException(t) if t.class == "java/lang/NullPointerException"
    );
}

#[test]
fn unknown_methods_are_rejected() {
    let (bridge, _sink) = bridge();
    let instance = activated_listener(&bridge);
    assert_matches!(
        bridge.dispatch(&instance, "n_onReceived", "(Ljava/lang/String;)V", &[Value::NULL]),
        Err(Error::UnknownSignature { .. })
    );
    assert_matches!(
        bridge.dispatch(&instance, "n_onChanged", "()V", &[]),
        Err(Error::UnknownSignature { .. })
    );
}
