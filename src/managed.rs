//! The managed side of the bridge: types that implement native callbacks,
//! their constructors, and the handlers they expose.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use log::debug;

use crate::{
    descriptors::{BoundType, HandlerId, TypeIdentity},
    errors::{fatal, Error, Result, Throwable},
    instance::{Instance, Peer},
    refs::ObjectHandle,
    value::Value,
    Bridge,
};

/// The managed object attached to a native instance.
pub type PeerObject = Arc<dyn Any + Send + Sync>;

/// Managed code run in place of a native method body.
pub type Handler =
    Arc<dyn Fn(&CallContext<'_>, &[Value]) -> std::result::Result<Value, Throwable> + Send + Sync>;

/// Creates the managed peer for a native instance.
pub type Constructor = Arc<
    dyn Fn(&ActivationContext<'_>, &[Value]) -> std::result::Result<PeerObject, Throwable>
        + Send
        + Sync,
>;

/// What a handler sees while it runs.
pub struct CallContext<'a> {
    pub(crate) bridge: &'a Bridge,
    pub(crate) instance: &'a Instance,
    pub(crate) peer: &'a Peer,
}

impl<'a> CallContext<'a> {
    /// The bridge delivering the call.
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// The native instance the call was made on.
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    /// The instance's managed peer.
    pub fn peer(&self) -> &'a Peer {
        self.peer
    }

    /// Borrows the peer object as a `T`.
    pub fn this<T: Any>(&self) -> Option<&'a T> {
        self.peer.downcast_ref()
    }

    /// Keeps `obj` alive for as long as the instance is.
    pub fn retain(&self, obj: ObjectHandle) -> Result<()> {
        self.bridge.retain(self.instance, obj)
    }
}

/// What a constructor sees while it runs.
pub struct ActivationContext<'a> {
    pub(crate) bridge: &'a Bridge,
    pub(crate) instance: &'a Instance,
    pub(crate) bound: &'a BoundType,
}

impl<'a> ActivationContext<'a> {
    /// The bridge performing the activation.
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// The native instance that is being given a peer.
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    /// The bound type the instance is being activated as.
    pub fn bound_type(&self) -> &'a BoundType {
        self.bound
    }
}

/// A managed type known to the bridge: how to construct it and which
/// handlers (connectors) it exposes.
pub struct ManagedType {
    identity: TypeIdentity,
    constructor: Option<Constructor>,
    connectors: HashMap<String, Handler>,
}

impl ManagedType {
    /// Starts describing the managed type `identity`.
    pub fn new(identity: TypeIdentity) -> Self {
        Self {
            identity,
            constructor: None,
            connectors: HashMap::new(),
        }
    }

    /// Sets the constructor used for activation.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActivationContext<'_>, &[Value]) -> std::result::Result<PeerObject, Throwable>
            + Send
            + Sync
            + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    /// Exposes `f` under the connector name `name`.
    pub fn connector<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&CallContext<'_>, &[Value]) -> std::result::Result<Value, Throwable>
            + Send
            + Sync
            + 'static,
    {
        self.connectors.insert(name.into(), Arc::new(f));
        self
    }

    /// Identity of the type.
    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    /// The constructor, if the type can be activated.
    pub fn get_constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Looks up a connector by name.
    pub fn get_connector(&self, id: &HandlerId) -> Option<&Handler> {
        self.connectors.get(id.as_str())
    }
}

impl fmt::Debug for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut connectors: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        connectors.sort_unstable();
        f.debug_struct("ManagedType")
            .field("identity", &self.identity.to_string())
            .field("constructor", &self.constructor.is_some())
            .field("connectors", &connectors)
            .finish()
    }
}

/// Process-wide table of managed types, keyed by type name.
///
/// Type identities are opaque keys: the bridge never locates managed code
/// by any other means than a lookup in this table.
#[derive(Default)]
pub struct TypeManager {
    types: RwLock<HashMap<String, Vec<Arc<ManagedType>>>>,
}

impl TypeManager {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a managed type available to the bridge.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if a type with exactly the
    /// same identity is already present.
    pub fn register_type(&self, ty: ManagedType) -> Result<Arc<ManagedType>> {
        let mut types = self
            .types
            .write()
            .unwrap_or_else(|_| fatal("managed type table lock poisoned"));
        let same_name = types.entry(ty.identity.name().to_owned()).or_default();
        if same_name.iter().any(|t| t.identity == ty.identity) {
            return Err(Error::DuplicateRegistration {
                key: ty.identity.to_string(),
                reason: "managed type is already registered".to_owned(),
            });
        }
        debug!("registered managed type {:?}", ty);
        let ty = Arc::new(ty);
        same_name.push(ty.clone());
        Ok(ty)
    }

    /// Finds the type `identity` refers to.
    ///
    /// An exact identity match wins; otherwise the first registered type
    /// that [`TypeIdentity::matches`] is returned.
    pub fn find(&self, identity: &TypeIdentity) -> Option<Arc<ManagedType>> {
        let types = self
            .types
            .read()
            .unwrap_or_else(|_| fatal("managed type table lock poisoned"));
        let candidates = types.get(identity.name())?;
        candidates
            .iter()
            .find(|t| t.identity == *identity)
            .or_else(|| candidates.iter().find(|t| identity.matches(&t.identity)))
            .cloned()
    }

    /// Resolves a connector on the type `identity` refers to.
    pub fn connector(&self, identity: &TypeIdentity, id: &HandlerId) -> Result<Handler> {
        self.find(identity)
            .and_then(|ty| ty.get_connector(id).cloned())
            .ok_or_else(|| Error::HandlerNotFound {
                managed: identity.clone(),
                handler: id.to_string(),
            })
    }
}

impl fmt::Debug for TypeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .types
            .read()
            .map(|types| types.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("TypeManager").field("types", &count).finish()
    }
}
