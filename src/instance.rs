//! Native instances, their lifecycle, and the managed peers attached to them.

use std::{
    any::Any,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, Weak},
    thread::{self, ThreadId},
};

use crate::{
    descriptors::BoundType, errors::fatal, managed::PeerObject, refs::RetainedReferenceSet,
    registry::TypeEntry,
};

/// Where an instance is in its lifecycle.
///
/// `Constructed → Activated → TornDown`, where a failed activation falls back
/// to `Constructed` and `TornDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Constructed by the native runtime, no peer attached.
    Constructed,
    /// A peer is being constructed.
    Activating,
    /// A peer is attached.
    Activated,
    /// Finalized by the native runtime.
    TornDown,
}

enum Lifecycle {
    Constructed,
    Activating(ThreadId),
    Activated(Peer),
    TornDown,
}

pub(crate) struct InstanceInner {
    id: u64,
    class: String,
    state: Mutex<Lifecycle>,
    settled: Condvar,
    refs: RetainedReferenceSet,
}

/// A native object known to the bridge.
///
/// Cloning an `Instance` yields another handle to the same native object.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

/// Outcome of trying to claim an instance for activation.
pub(crate) enum Claim {
    /// The caller now owns the activation and must settle it.
    Claimed,
    /// A peer is already attached.
    Attached(Peer),
}

impl Instance {
    pub(crate) fn new(id: u64, class: &str) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                id,
                class: class.replace('.', "/"),
                state: Mutex::new(Lifecycle::Constructed),
                settled: Condvar::new(),
                refs: RetainedReferenceSet::new(),
            }),
        }
    }

    /// Process-unique id of the instance.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Runtime class of the instance, in internal form.
    pub fn class(&self) -> &str {
        &self.inner.class
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        match *self.lock_state() {
            Lifecycle::Constructed => InstanceState::Constructed,
            Lifecycle::Activating(_) => InstanceState::Activating,
            Lifecycle::Activated(_) => InstanceState::Activated,
            Lifecycle::TornDown => InstanceState::TornDown,
        }
    }

    /// The attached peer, if any.
    pub fn peer(&self) -> Option<Peer> {
        match &*self.lock_state() {
            Lifecycle::Activated(peer) => Some(peer.clone()),
            _ => None,
        }
    }

    /// The objects this instance keeps alive.
    pub fn retained(&self) -> &RetainedReferenceSet {
        &self.inner.refs
    }

    /// Whether both handles refer to the same native object.
    pub fn same_instance(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|_| fatal("instance state lock poisoned"))
    }

    /// Claims the instance for activation by the current thread.
    ///
    /// Blocks while another thread is activating it, then reports that
    /// thread's peer (or claims the instance if that activation failed).
    pub(crate) fn claim(&self) -> Result<Claim, &'static str> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        loop {
            match &*state {
                Lifecycle::Constructed => {
                    *state = Lifecycle::Activating(me);
                    return Ok(Claim::Claimed);
                }
                Lifecycle::Activated(peer) => return Ok(Claim::Attached(peer.clone())),
                Lifecycle::TornDown => return Err("instance has been torn down"),
                Lifecycle::Activating(owner) if *owner == me => {
                    return Err("re-entrant activation from the peer's own constructor")
                }
                Lifecycle::Activating(_) => {
                    state = self
                        .inner
                        .settled
                        .wait(state)
                        .unwrap_or_else(|_| fatal("instance state lock poisoned"));
                }
            }
        }
    }

    /// Settles an activation claimed with [`Instance::claim`].
    ///
    /// `Some(peer)` attaches the peer; `None` returns the instance to
    /// `Constructed` so activation can be retried. Fails if the instance was
    /// torn down while the peer was being constructed.
    pub(crate) fn settle(&self, peer: Option<Peer>) -> Result<Option<Peer>, &'static str> {
        let mut state = self.lock_state();
        let outcome = match *state {
            Lifecycle::TornDown => Err("instance was torn down during activation"),
            _ => {
                *state = match &peer {
                    Some(peer) => Lifecycle::Activated(peer.clone()),
                    None => Lifecycle::Constructed,
                };
                Ok(peer)
            }
        };
        drop(state);
        self.inner.settled.notify_all();
        outcome
    }

    /// Detaches the peer, returning the instance to `Constructed`.
    pub(crate) fn detach(&self) -> Option<Peer> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, Lifecycle::Constructed) {
            Lifecycle::Activated(peer) => Some(peer),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Moves the instance to `TornDown`, releasing its peer and every retained
    /// reference. Returns `None` if it was already torn down, otherwise the
    /// detached peer (if any) and the number of released references.
    pub(crate) fn tear_down(&self) -> Option<(Option<Peer>, usize)> {
        let peer = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, Lifecycle::TornDown) {
                Lifecycle::TornDown => return None,
                Lifecycle::Activated(peer) => Some(peer),
                Lifecycle::Constructed | Lifecycle::Activating(_) => None,
            }
        };
        self.inner.settled.notify_all();
        let released = self.inner.refs.close();
        Some((peer, released))
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Arc::downgrade(&self.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("class", &self.inner.class)
            .field("state", &self.state())
            .finish()
    }
}

struct PeerInner {
    object: PeerObject,
    entry: Arc<TypeEntry>,
    instance: Weak<InstanceInner>,
}

/// The managed object attached to a native instance.
///
/// A peer remembers the bound type it was activated as (and with it the
/// published method set used for dispatch) and, weakly, the instance it
/// belongs to.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

impl Peer {
    pub(crate) fn new(object: PeerObject, entry: Arc<TypeEntry>, instance: &Instance) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                object,
                entry,
                instance: instance.downgrade(),
            }),
        }
    }

    /// The managed object.
    pub fn object(&self) -> &PeerObject {
        &self.inner.object
    }

    /// Borrows the managed object as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.object.downcast_ref()
    }

    /// The bound type this peer was activated as.
    pub fn bound_type(&self) -> &BoundType {
        self.inner.entry.bound_type()
    }

    pub(crate) fn entry(&self) -> &TypeEntry {
        &self.inner.entry
    }

    /// The instance this peer is attached to, while it is still alive.
    pub fn instance(&self) -> Option<Instance> {
        self.inner
            .instance
            .upgrade()
            .map(|inner| Instance { inner })
    }

    /// Whether both handles refer to the same peer.
    pub fn same_peer(&self, other: &Peer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this peer wraps exactly `object`.
    pub fn wraps(&self, object: &PeerObject) -> bool {
        Arc::ptr_eq(&self.inner.object, object)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("bound", &self.inner.entry.bound_type().to_string())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static_assertions::assert_impl_all!(Instance: Send, Sync);
    static_assertions::assert_impl_all!(Peer: Send, Sync);

    #[test]
    fn tear_down_is_terminal_and_idempotent() {
        let instance = Instance::new(1, "com.example.Listener");
        assert_eq!(instance.class(), "com/example/Listener");
        assert_eq!(instance.state(), InstanceState::Constructed);
        assert!(instance.tear_down().is_some());
        assert_eq!(instance.state(), InstanceState::TornDown);
        assert!(instance.tear_down().is_none());
        assert!(instance.claim().is_err());
        assert!(instance.detach().is_none());
    }

    #[test]
    fn reentrant_claim_fails() {
        let instance = Instance::new(2, "com/example/Listener");
        assert!(matches!(instance.claim(), Ok(Claim::Claimed)));
        assert!(instance.claim().is_err());
        assert!(matches!(instance.settle(None), Ok(None)));
        assert_eq!(instance.state(), InstanceState::Constructed);
    }
}
