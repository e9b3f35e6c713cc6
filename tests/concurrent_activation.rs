mod util;
use util::{bridge, listener_bound, register_listener, LISTENER_CLASS};

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread::spawn,
    time::Duration,
};

use peer_bridge::{BridgeBuilder, InstanceState, ManagedType, PeerObject, TypeIdentity};

const THREAD_NUM: usize = 8;

#[test]
fn concurrent_activation_yields_one_peer() {
    let (bridge, _sink) = bridge();
    let bridge = Arc::new(bridge);
    let instance = bridge.construct(LISTENER_CLASS);
    let barrier = Arc::new(Barrier::new(THREAD_NUM));

    let threads: Vec<_> = (0..THREAD_NUM)
        .map(|_| {
            let bridge = bridge.clone();
            let instance = instance.clone();
            let barrier = barrier.clone();
            spawn(move || {
                barrier.wait();
                bridge
                    .activate(&instance, &listener_bound(), "", &[])
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    let peers: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    for peer in &peers[1..] {
        assert!(peer.same_peer(&peers[0]));
    }
    assert!(bridge
        .lookup_peer(&instance)
        .unwrap()
        .same_peer(&peers[0]));
    assert_eq!(instance.state(), InstanceState::Activated);
}

#[test]
fn losers_wait_for_a_slow_constructor() {
    let bridge = Arc::new(BridgeBuilder::new().build().unwrap());
    let constructed = Arc::new(AtomicUsize::new(0));
    let slow = TypeIdentity::new("Example.SlowListener", "Example");

    let counter = constructed.clone();
    bridge
        .register_type(ManagedType::new(slow.clone()).constructor(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Arc::new(()) as PeerObject)
        }))
        .unwrap();
    let bound = peer_bridge::BoundType::new("mono/example/SlowListener", slow);
    bridge.register(&bound, vec![]).unwrap();

    let instance = bridge.construct("mono/example/SlowListener");
    let barrier = Arc::new(Barrier::new(THREAD_NUM));
    let threads: Vec<_> = (0..THREAD_NUM)
        .map(|_| {
            let (bridge, instance, barrier, bound) =
                (bridge.clone(), instance.clone(), barrier.clone(), bound.clone());
            spawn(move || {
                barrier.wait();
                bridge.activate(&instance, &bound, "", &[]).unwrap().unwrap()
            })
        })
        .collect();
    let peers: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(peers.iter().all(|p| p.same_peer(&peers[0])));
}

#[test]
fn concurrent_dispatch_to_different_instances() {
    let bridge = Arc::new(BridgeBuilder::new().build().unwrap());
    register_listener(&bridge);

    let threads: Vec<_> = (0..THREAD_NUM)
        .map(|i| {
            let bridge = bridge.clone();
            spawn(move || {
                let instance = util::activated_listener(&bridge);
                for n in 0..100 {
                    let key = peer_bridge::refs::ObjectHandle::string(format!("{i}-{n}"));
                    bridge
                        .dispatch(&instance, "n_onRemoved", "(Ljava/lang/String;)V", &[key.into()])
                        .unwrap();
                }
                let peer = bridge.lookup_peer(&instance).unwrap();
                peer.downcast_ref::<util::Listener>().unwrap().removed().len()
            })
        })
        .collect();

    for t in threads {
        assert_eq!(t.join().unwrap(), 100);
    }
    assert_eq!(bridge.live_instances(), THREAD_NUM);
}
