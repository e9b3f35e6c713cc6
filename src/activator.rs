use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::{
    descriptors::BoundType,
    errors::*,
    instance::{Claim, Instance, Peer},
    managed::{ActivationContext, PeerObject},
    signature::MethodSignature,
    trampoline::check_args,
    value::Value,
    Bridge,
};

impl Bridge {
    /// Gives `instance` a managed peer of `bound`'s managed type.
    ///
    /// This is what a native constructor calls. If the instance's runtime
    /// class is not exactly `bound`'s native class the call does nothing and
    /// returns `Ok(None)`: the instance belongs to a subclass, whose own
    /// constructor performs the activation.
    ///
    /// `ctor_sig` is the signature of the managed constructor to run (the
    /// empty string means `()V`) and `args` are marshalled against it.
    ///
    /// Activation happens at most once per instance. A caller racing with an
    /// activation in progress blocks until it settles and then gets the
    /// winner's peer. A failed activation leaves the instance `Constructed`
    /// so it can be retried.
    pub fn activate(
        &self,
        instance: &Instance,
        bound: &BoundType,
        ctor_sig: &str,
        args: &[Value],
    ) -> Result<Option<Peer>> {
        if instance.class() != bound.native_class() {
            debug!(
                "not activating {:?} as {bound}: runtime class differs",
                instance
            );
            return Ok(None);
        }

        // Fast path: already activated
        if let Some(peer) = instance.peer() {
            return Ok(Some(peer));
        }

        let fail = |reason: String| Error::ActivationFailed {
            class: instance.class().to_owned(),
            managed: bound.managed().clone(),
            reason,
        };

        let entry = self
            .registry
            .entry(bound)
            .ok_or_else(|| fail("bound type is not registered".to_owned()))?;
        let ty = self
            .types
            .find(bound.managed())
            .ok_or_else(|| fail("managed type is unknown".to_owned()))?;
        let ctor = ty
            .get_constructor()
            .cloned()
            .ok_or_else(|| fail("managed type has no constructor".to_owned()))?;

        let sig = MethodSignature::from_str(ctor_sig).map_err(|e| fail(e.to_string()))?;
        if !sig.ret().is_void() {
            return Err(fail(format!("constructor signature '{sig}' must return void")));
        }
        check_args(&sig, args).map_err(|e| fail(e.to_string()))?;

        match instance.claim().map_err(|r| fail(r.to_owned()))? {
            Claim::Attached(peer) => return Ok(Some(peer)),
            Claim::Claimed => {}
        }

        let cx = ActivationContext {
            bridge: self,
            instance,
            bound,
        };
        let object = match panic::catch_unwind(AssertUnwindSafe(|| ctor(&cx, args))) {
            Ok(Ok(object)) => object,
            Ok(Err(t)) => return Err(self.abandon(instance, fail(format!("constructor raised {t}")))),
            Err(payload) => {
                let reason = format!("constructor panicked: {}", panic_message(payload.as_ref()));
                return Err(self.abandon(instance, fail(reason)));
            }
        };

        let peer = Peer::new(object, entry, instance);
        instance
            .settle(Some(peer.clone()))
            .map_err(|r| fail(r.to_owned()))?;
        self.lifecycle(format_args!(
            "activated instance #{} as {bound}",
            instance.id()
        ));
        Ok(Some(peer))
    }

    /// Attaches a peer that managed code created itself to an already
    /// constructed `instance`.
    ///
    /// Follows the same at-most-once rule as [`Bridge::activate`]: attaching
    /// the peer that is already attached is a no-op, attaching a different
    /// one fails with [`Error::ActivationFailed`].
    pub fn attach(&self, instance: &Instance, bound: &BoundType, object: PeerObject) -> Result<Peer> {
        let fail = |reason: &str| Error::ActivationFailed {
            class: instance.class().to_owned(),
            managed: bound.managed().clone(),
            reason: reason.to_owned(),
        };

        let entry = self
            .registry
            .entry(bound)
            .ok_or_else(|| fail("bound type is not registered"))?;

        match instance.claim().map_err(fail)? {
            Claim::Attached(existing) if existing.wraps(&object) => Ok(existing),
            Claim::Attached(_) => Err(fail("a different peer is already attached")),
            Claim::Claimed => {
                let peer = Peer::new(object, entry, instance);
                instance.settle(Some(peer.clone())).map_err(fail)?;
                self.lifecycle(format_args!(
                    "attached managed peer to instance #{} as {bound}",
                    instance.id()
                ));
                Ok(peer)
            }
        }
    }

    /// The peer attached to `instance`.
    pub fn lookup_peer(&self, instance: &Instance) -> Result<Peer> {
        instance.peer().ok_or_else(|| Error::NoPeer {
            id: instance.id(),
            class: instance.class().to_owned(),
        })
    }

    /// The instance `peer` is attached to, if it still is.
    pub fn instance_of(&self, peer: &Peer) -> Option<Instance> {
        peer.instance()
            .filter(|instance| instance.peer().is_some_and(|p| p.same_peer(peer)))
    }

    /// Detaches the peer of `instance`, returning it to `Constructed`.
    ///
    /// Retained references are left alone. Returns the detached peer.
    pub fn detach(&self, instance: &Instance) -> Option<Peer> {
        let peer = instance.detach()?;
        self.lifecycle(format_args!(
            "detached peer from instance #{} ({})",
            instance.id(),
            peer.bound_type()
        ));
        Some(peer)
    }

    fn abandon(&self, instance: &Instance, err: Error) -> Error {
        warn!("{err}");
        if let Err(reason) = instance.settle(None) {
            debug!("instance #{}: {reason}", instance.id());
        }
        err
    }
}
