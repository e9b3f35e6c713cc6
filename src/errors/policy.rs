use std::{cell::RefCell, sync::Mutex};

use log::error;

use crate::{
    errors::{fatal, panic_message, Error, Throwable},
    instance::Instance,
    signature::JavaType,
    value::Value,
    Bridge,
};

/// A dispatch failure that could not be delivered to the native call site.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    /// Id of the instance the call was made on.
    pub instance: u64,
    /// Runtime class of that instance.
    pub class: String,
    /// Native method name.
    pub method: String,
    /// Native method signature.
    pub sig: String,
    /// What went wrong.
    pub error: Error,
}

/// Side channel for failures of native calls that cannot carry an error back
/// to their call site (for example `void` callbacks).
///
/// Configure one with [`BridgeBuilder::error_sink`](crate::BridgeBuilder::error_sink).
pub trait UnhandledErrorSink: Send + Sync {
    /// Receives one failure. Must not panic.
    fn report(&self, failure: &DispatchFailure);
}

impl<F> UnhandledErrorSink for F
where
    F: Fn(&DispatchFailure) + Send + Sync,
{
    fn report(&self, failure: &DispatchFailure) {
        self(failure)
    }
}

/// The default sink: logs every failure at [`log::Level::Error`].
#[derive(Debug, Default)]
pub struct LogSink;

impl UnhandledErrorSink for LogSink {
    fn report(&self, failure: &DispatchFailure) {
        error!(
            "Unhandled failure in {}.{}{} on instance #{}: {}",
            failure.class, failure.method, failure.sig, failure.instance, failure.error
        );
    }
}

/// A sink that keeps every failure until drained.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    failures: Mutex<Vec<DispatchFailure>>,
}

impl DeadLetterQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every queued failure, oldest first.
    pub fn drain(&self) -> Vec<DispatchFailure> {
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|_| fatal("dead letter queue lock poisoned"));
        std::mem::take(&mut *failures)
    }

    /// Number of queued failures.
    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(|_| fatal("dead letter queue lock poisoned"))
            .len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UnhandledErrorSink for DeadLetterQueue {
    fn report(&self, failure: &DispatchFailure) {
        self.failures
            .lock()
            .unwrap_or_else(|_| fatal("dead letter queue lock poisoned"))
            .push(failure.clone());
    }
}

/// The state a policy sees when a trampoline call fails.
pub struct FailureContext<'a> {
    pub(crate) bridge: &'a Bridge,
    pub(crate) instance: &'a Instance,
    pub(crate) name: &'a str,
    pub(crate) sig: &'a str,
    pub(crate) ret: Option<JavaType>,
}

impl FailureContext<'_> {
    /// The instance the failed call was made on.
    pub fn instance(&self) -> &Instance {
        self.instance
    }

    /// Native method name of the failed call.
    pub fn method(&self) -> &str {
        self.name
    }

    /// Native method signature of the failed call.
    pub fn sig(&self) -> &str {
        self.sig
    }

    /// Whether the native call site returns `void`.
    ///
    /// An unparsable signature counts as `void`: there is nothing sensible to
    /// return to such a call site.
    pub fn is_void(&self) -> bool {
        self.ret.is_none_or(|ret| ret.is_void())
    }

    /// The zero value a native call site expects when the call failed.
    pub fn default_value(&self) -> Value {
        self.ret.map(Value::default_for).unwrap_or(Value::Void)
    }

    /// Hands the error to the bridge's unhandled error sink.
    pub fn report(&self, err: &Error) {
        self.bridge.report_unhandled(DispatchFailure {
            instance: self.instance.id(),
            class: self.instance.class().to_owned(),
            method: self.name.to_owned(),
            sig: self.sig.to_owned(),
            error: err.clone(),
        });
    }
}

/// A policy for turning a failed trampoline call into a value the native call
/// site can return.
///
/// Whichever policy is used, failures of `void` methods are always passed to
/// the bridge's [`UnhandledErrorSink`] before the policy runs.
pub trait ErrorPolicy {
    /// Runs for any dispatch error.
    fn on_error(cx: &FailureContext<'_>, err: Error) -> Value;

    /// Runs if the trampoline itself panicked outside of the managed handler.
    fn on_panic(cx: &FailureContext<'_>, payload: Box<dyn std::any::Any + Send + 'static>) -> Value {
        Self::on_error(cx, Error::HandlerPanicked(panic_message(payload.as_ref())))
    }
}

thread_local! {
    static PENDING_EXCEPTION: RefCell<Option<Throwable>> = const { RefCell::new(None) };
}

/// Whether an exception is pending on the current thread.
pub fn exception_check() -> bool {
    PENDING_EXCEPTION.with(|p| p.borrow().is_some())
}

/// Takes the exception pending on the current thread, if any.
pub fn take_pending_exception() -> Option<Throwable> {
    PENDING_EXCEPTION.with(|p| p.borrow_mut().take())
}

/// Raises `t` as the pending exception of the current thread.
///
/// An exception that is already pending takes precedence and is kept.
pub fn throw(t: Throwable) {
    PENDING_EXCEPTION.with(|p| {
        let mut p = p.borrow_mut();
        if p.is_none() {
            *p = Some(t);
        }
    })
}

/// An error policy that raises a pending native exception for any error and
/// returns the default value for the return type.
///
/// If an exception is already pending that takes precedence and no new
/// exception is raised. The pending exception can be observed with
/// [`exception_check`] and [`take_pending_exception`].
#[derive(Debug, Default)]
pub struct ThrowPending;

impl ErrorPolicy for ThrowPending {
    fn on_error(cx: &FailureContext<'_>, err: Error) -> Value {
        throw(err.to_throwable());
        cx.default_value()
    }
}

/// An error policy that reports any error to the bridge's unhandled error
/// sink and returns the default value for the return type.
#[derive(Debug, Default)]
pub struct ReportAndDefault;

impl ErrorPolicy for ReportAndDefault {
    fn on_error(cx: &FailureContext<'_>, err: Error) -> Value {
        // void failures were already reported by the trampoline
        if !cx.is_void() {
            cx.report(&err);
        }
        cx.default_value()
    }
}
