mod util;
use util::{activated_listener, bridge};

use std::{
    sync::{Arc, Barrier},
    thread::spawn,
};

use assert_matches::assert_matches;
use peer_bridge::{errors::Error, refs::ObjectHandle};

#[test]
fn clear_all_releases_everything_once() {
    let (bridge, _sink) = bridge();
    let instance = activated_listener(&bridge);

    let obj = ObjectHandle::string("payload");
    let weak = obj.downgrade();
    bridge.retain(&instance, obj.clone()).unwrap();
    bridge.retain(&instance, obj.clone()).unwrap();
    bridge.retain(&instance, ObjectHandle::string("other")).unwrap();
    drop(obj);

    let retained = bridge.retained(&instance);
    assert_eq!(retained.len(), 3);
    assert!(retained[0].same_object(&retained[1]));
    drop(retained);

    assert_eq!(bridge.clear_all(&instance), 3);
    assert!(!weak.is_alive());
    assert_eq!(bridge.clear_all(&instance), 0);
    assert!(instance.retained().is_empty());

    // the set is usable again until the instance is finalized
    bridge.retain(&instance, ObjectHandle::string("late")).unwrap();
    assert!(bridge.finalize(&instance));
    assert_matches!(
        bridge.retain(&instance, ObjectHandle::string("too late")),
        Err(Error::TornDown { .. })
    );
    assert!(instance.retained().is_empty());
}

#[test]
fn clear_all_never_loses_a_concurrent_retain() {
    const THREAD_NUM: usize = 4;
    const RETAINS: usize = 500;

    let (bridge, _sink) = bridge();
    let bridge = Arc::new(bridge);
    let instance = activated_listener(&bridge);
    let barrier = Arc::new(Barrier::new(THREAD_NUM + 1));

    let retainers: Vec<_> = (0..THREAD_NUM)
        .map(|_| {
            let (bridge, instance, barrier) = (bridge.clone(), instance.clone(), barrier.clone());
            spawn(move || {
                barrier.wait();
                for _ in 0..RETAINS {
                    bridge
                        .retain(&instance, ObjectHandle::string("x"))
                        .unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    let mut released = 0;
    for _ in 0..50 {
        released += bridge.clear_all(&instance);
    }
    for t in retainers {
        t.join().unwrap();
    }
    released += bridge.clear_all(&instance);

    // every retain is released exactly once
    assert_eq!(released, THREAD_NUM * RETAINS);
    assert!(instance.retained().is_empty());
}
