//! # Overview
//!
//! `peer-bridge` lets objects of a native runtime implement their methods
//! with managed code. Each native class that is implemented this way is
//! paired with a managed type (a *bound type*), and each native instance of
//! it gets exactly one managed *peer*. Native method bodies are reduced to a
//! single call into the bridge (the *trampoline*), which finds the managed
//! handler registered for the method and runs it on the peer.
//!
//! The pieces, in the order they are used:
//!
//! 1. Managed types are made known with [`Bridge::register_type`]. A
//!    [`ManagedType`] has a constructor and a set of named *connectors*, each
//!    of which implements one native method.
//! 2. Native classes register their methods with [`Bridge::register`] or, in
//!    the textual form emitted by binding generators, with
//!    [`Bridge::register_table`].
//! 3. The native runtime reports new objects with [`Bridge::construct`] and
//!    activates them with [`Bridge::activate`].
//! 4. Native method bodies call [`Bridge::trampoline`] (or
//!    [`Bridge::dispatch`] to see the error).
//! 5. Managed code keeps foreign objects alive for the lifetime of an
//!    instance with [`Bridge::retain`], and releases them with
//!    [`Bridge::clear_all`].
//! 6. The native runtime finalizes objects with [`Bridge::finalize`].
//!
//! ```
//! use std::sync::Arc;
//! use peer_bridge::{
//!     errors::ReportAndDefault, BoundType, BridgeBuilder, ManagedType, PeerObject, TypeIdentity,
//!     Value,
//! };
//!
//! struct Greeter;
//!
//! let bridge = BridgeBuilder::new().build().unwrap();
//! let bound = BoundType::new(
//!     "com/example/Greeter",
//!     TypeIdentity::new("Example.Greeter", "Example"),
//! );
//! bridge
//!     .register_type(
//!         ManagedType::new(bound.managed().clone())
//!             .constructor(|_cx, _args| Ok(Arc::new(Greeter) as PeerObject))
//!             .connector("GetGreetHandler", |_cx, args| Ok(Value::Int(args[0].i().unwrap() + 1))),
//!     )
//!     .unwrap();
//! bridge
//!     .register_table(
//!         "Example.Greeter, Example",
//!         "com/example/Greeter",
//!         "n_greet:(I)I:GetGreetHandler",
//!     )
//!     .unwrap();
//!
//! let instance = bridge.construct("com/example/Greeter");
//! bridge.activate(&instance, &bound, "", &[]).unwrap();
//! let ret = bridge.trampoline::<ReportAndDefault>(&instance, "n_greet", "(I)I", &[Value::Int(41)]);
//! assert_eq!(ret, Value::Int(42));
//! ```
//!
//! # Threads
//!
//! Everything is synchronous and may be called from any thread. Dispatch on
//! an activated instance takes no process-wide lock: the peer keeps the
//! published method set of its bound type.
//!
//! # Logging
//!
//! The bridge logs through the [`log`] facade. See [`BridgeBuilder`] for the
//! options that make it more verbose.
#![warn(missing_docs)]

// errors, and what native call sites see of them
pub mod errors;

// parser for method signatures
pub mod signature;

// values crossing the bridge
mod value;
pub use value::*;

// handles to foreign objects, and keeping them alive
pub mod refs;

// bound types, type identities and method descriptors
pub mod descriptors;
pub use descriptors::{BoundType, HandlerId, MethodDescriptor, TypeIdentity};

// managed types and the handlers they expose
mod managed;
pub use managed::*;

mod registry;
pub use registry::*;

mod instance;
pub use instance::*;

// Actual communication with the native runtime
mod activator;
mod bridge;
mod trampoline;
pub use bridge::*;
