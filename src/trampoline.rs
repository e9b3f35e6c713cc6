use std::panic::{self, AssertUnwindSafe};

use log::trace;

use crate::{
    errors::*,
    instance::Instance,
    managed::CallContext,
    signature::MethodSignature,
    value::Value,
    Bridge,
};

/// Checks `args` against the argument types of `sig`.
pub(crate) fn check_args(sig: &MethodSignature, args: &[Value]) -> Result<()> {
    if sig.args().len() != args.len() {
        return Err(Error::InvalidArgList {
            sig: sig.sig().to_owned(),
            expected: sig.args().len(),
            actual: args.len(),
        });
    }
    sig.args()
        .iter()
        .zip(args)
        .try_for_each(|(ty, arg)| arg.check(*ty))
}

impl Bridge {
    /// Delivers a native call of `name` + `sig` on `instance` to the managed
    /// handler registered for its peer's bound type.
    ///
    /// Arguments must match the signature exactly, and so must the value the
    /// handler returns. An exception raised by the handler comes back as
    /// [`Error::ManagedException`]; a panic as [`Error::HandlerPanicked`].
    pub fn dispatch(
        &self,
        instance: &Instance,
        name: &str,
        sig: &str,
        args: &[Value],
    ) -> Result<Value> {
        let peer = self.lookup_peer(instance)?;
        let method = peer.entry().resolve(name, sig)?;
        let msig = method.descriptor().sig();
        check_args(msig, args)?;

        if self.verbose_dispatch {
            trace!(
                "dispatching {name}{sig} on instance #{} to {}",
                instance.id(),
                peer.bound_type().managed()
            );
        }

        let handler = method.handler();
        let cx = CallContext {
            bridge: self,
            instance,
            peer: &peer,
        };
        let ret = match panic::catch_unwind(AssertUnwindSafe(|| handler(&cx, args))) {
            Ok(Ok(ret)) => ret,
            Ok(Err(t)) => return Err(Error::ManagedException(t)),
            Err(payload) => return Err(Error::HandlerPanicked(panic_message(payload.as_ref()))),
        };
        ret.check(msig.ret())?;
        Ok(ret)
    }

    /// The entry point a native method body calls.
    ///
    /// Runs [`Bridge::dispatch`] and, if it fails, lets the error policy `P`
    /// turn the failure into the value returned to the native call site.
    /// Failures of `void` methods are always reported to the bridge's
    /// [`UnhandledErrorSink`] first, whichever policy is used.
    ///
    /// Never unwinds.
    pub fn trampoline<P: ErrorPolicy>(
        &self,
        instance: &Instance,
        name: &str,
        sig: &str,
        args: &[Value],
    ) -> Value {
        let err = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(instance, name, sig, args)
        })) {
            Ok(Ok(ret)) => return ret,
            Ok(Err(err)) => Ok(err),
            Err(payload) => Err(payload),
        };

        let cx = FailureContext {
            bridge: self,
            instance,
            name,
            sig,
            ret: MethodSignature::from_str(sig).ok().map(|s| s.ret()),
        };
        match err {
            Ok(err) => {
                if cx.is_void() {
                    cx.report(&err);
                }
                P::on_error(&cx, err)
            }
            Err(payload) => {
                if cx.is_void() {
                    cx.report(&Error::HandlerPanicked(panic_message(payload.as_ref())));
                }
                P::on_panic(&cx, payload)
            }
        }
    }
}
