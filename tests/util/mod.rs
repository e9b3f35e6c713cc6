#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use peer_bridge::{
    errors::{DeadLetterQueue, Throwable},
    BoundType, Bridge, BridgeBuilder, Instance, ManagedType, PeerObject, TypeIdentity, Value,
};

pub const LISTENER_CLASS: &str = "mono/example/OnEventListenerImplementor";
pub const LISTENER_TYPE: &str = "Example.OnEventListenerImplementor, Example";
pub const INVOKER_TYPE: &str = "Example.IOnEventListenerInvoker, Example, Version=1.0.0.0";

pub const LISTENER_METHODS: &str = "\
n_onReceived:(Ljava/lang/Object;)V:GetOnReceived_Ljava_lang_Object_Handler:Example.IOnEventListenerInvoker, Example
n_onRemoved:(Ljava/lang/String;)V:GetOnRemoved_Ljava_lang_String_Handler:Example.IOnEventListenerInvoker, Example
";

/// Managed peer of the listener: records what it was told.
#[derive(Default)]
pub struct Listener {
    received: Mutex<Vec<Option<String>>>,
    removed: Mutex<Vec<String>>,
}

impl Listener {
    pub fn received(&self) -> Vec<Option<String>> {
        self.received.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

pub fn listener_bound() -> BoundType {
    BoundType::new(LISTENER_CLASS, TypeIdentity::from_str(LISTENER_TYPE).unwrap())
}

/// Makes the listener known to `bridge`: the implementor type with its
/// constructor, the invoker type with its connectors, and the method table.
pub fn register_listener(bridge: &Bridge) {
    bridge
        .register_type(
            ManagedType::new(TypeIdentity::from_str(LISTENER_TYPE).unwrap())
                .constructor(|_cx, _args| Ok(Arc::new(Listener::default()) as PeerObject)),
        )
        .unwrap();
    bridge
        .register_type(
            ManagedType::new(TypeIdentity::from_str(INVOKER_TYPE).unwrap())
                .connector("GetOnReceived_Ljava_lang_Object_Handler", |cx, args| {
                    let this = cx
                        .this::<Listener>()
                        .ok_or_else(|| Throwable::runtime("peer is not a Listener"))?;
                    let obj = args[0].l().map_err(|e| e.to_throwable())?;
                    this.received
                        .lock()
                        .unwrap()
                        .push(obj.and_then(|o| o.as_str()).map(str::to_owned));
                    // keep the event payload alive as long as the listener
                    if let Some(obj) = obj {
                        cx.retain(obj.clone()).map_err(|e| e.to_throwable())?;
                    }
                    Ok(Value::Void)
                })
                .connector("GetOnRemoved_Ljava_lang_String_Handler", |cx, args| {
                    let this = cx
                        .this::<Listener>()
                        .ok_or_else(|| Throwable::runtime("peer is not a Listener"))?;
                    let key = args[0]
                        .l()
                        .map_err(|e| e.to_throwable())?
                        .and_then(|o| o.as_str())
                        .ok_or_else(|| {
                            Throwable::new("java/lang/NullPointerException", "key is null")
                        })?;
                    this.removed.lock().unwrap().push(key.to_owned());
                    Ok(Value::Void)
                }),
        )
        .unwrap();
    bridge
        .register_table(LISTENER_TYPE, LISTENER_CLASS, LISTENER_METHODS)
        .unwrap();
}

/// A fresh bridge with the listener registered, reporting unhandled failures
/// to the returned queue.
pub fn bridge() -> (Bridge, Arc<DeadLetterQueue>) {
    let sink = Arc::new(DeadLetterQueue::new());
    let bridge = BridgeBuilder::new()
        .error_sink(sink.clone())
        .build()
        .unwrap_or_else(|e| panic!("{:#?}", e));
    register_listener(&bridge);
    (bridge, sink)
}

/// Constructs and activates a listener instance.
pub fn activated_listener(bridge: &Bridge) -> Instance {
    let instance = bridge.construct(LISTENER_CLASS);
    bridge
        .activate(&instance, &listener_bound(), "", &[])
        .unwrap()
        .expect("listener instance was not activated");
    instance
}
