//! Errors raised by the bridge and the policies that map them onto native
//! call sites.

use thiserror::Error;

use crate::descriptors::{BoundType, TypeIdentity};

mod policy;
pub use policy::*;

/// Result type alias using the bridge [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// An exception raised by managed code.
///
/// Handlers and constructors report failures by returning one of these; the
/// trampoline carries it back to the native call site (or to the unhandled
/// error sink when the call site cannot represent it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    /// Class name of the exception, e.g. `java/lang/IllegalStateException`.
    pub class: String,
    /// Human readable message.
    pub message: String,
}

impl Throwable {
    /// Creates a `Throwable` with the given exception class and message.
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a `java/lang/RuntimeException`.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("java/lang/RuntimeException", message)
    }
}

impl std::fmt::Display for Throwable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Errors that can occur while registering, activating or dispatching.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The bound type (or managed type) was already registered with a
    /// different definition, or a descriptor list names the same method twice.
    #[error("Duplicate registration for {key}: {reason}")]
    DuplicateRegistration { key: String, reason: String },

    /// No method with this name and signature is registered for the type.
    #[error("Unknown signature for {bound}: {name}{sig}")]
    UnknownSignature {
        bound: BoundType,
        name: String,
        sig: String,
    },

    /// The managed peer could not be created or attached. The instance stays
    /// peerless and activation may be retried.
    #[error("Activation of {class} as '{managed}' failed: {reason}")]
    ActivationFailed {
        class: String,
        managed: TypeIdentity,
        reason: String,
    },

    /// The instance has no managed peer (never activated, detached or torn
    /// down).
    #[error("No managed peer attached to instance #{id} ({class})")]
    NoPeer { id: u64, class: String },

    /// A descriptor names a connector that the managed type does not expose.
    #[error("Handler '{handler}' not found on managed type '{managed}'")]
    HandlerNotFound {
        managed: TypeIdentity,
        handler: String,
    },

    /// A method table record or type name could not be parsed.
    #[error("Invalid descriptor '{0}'")]
    InvalidDescriptor(String),

    /// A signature string could not be parsed.
    #[error("Failed to parse signature: {0}")]
    ParseFailed(String),

    /// A value did not have the type required by the signature.
    #[error("Invalid value type: expected {expected}, got {actual}")]
    WrongValueType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The number of arguments did not match the signature.
    #[error("Invalid number of arguments for '{sig}': expected {expected}, got {actual}")]
    InvalidArgList {
        sig: String,
        expected: usize,
        actual: usize,
    },

    /// The managed handler raised an exception.
    #[error("Managed handler raised {0}")]
    ManagedException(Throwable),

    /// The managed handler panicked.
    #[error("Managed handler panicked: {0}")]
    HandlerPanicked(String),

    /// The instance has been finalized by the native runtime.
    #[error("Instance #{id} ({class}) has been torn down")]
    TornDown { id: u64, class: String },

    /// A bridge option was not recognized.
    #[error("Unrecognized bridge option '{0}'")]
    InvalidOption(String),
}

impl Error {
    /// Maps the error onto the exception class a native call site would see.
    pub fn exception_class(&self) -> &str {
        match self {
            Error::ManagedException(t) => &t.class,
            Error::NoPeer { .. } | Error::TornDown { .. } => "java/lang/IllegalStateException",
            Error::UnknownSignature { .. } | Error::HandlerNotFound { .. } => {
                "java/lang/AbstractMethodError"
            }
            Error::WrongValueType { .. } | Error::InvalidArgList { .. } => {
                "java/lang/IllegalArgumentException"
            }
            _ => "java/lang/RuntimeException",
        }
    }

    /// Converts the error into a [`Throwable`] suitable for raising on the
    /// native side.
    pub fn to_throwable(&self) -> Throwable {
        match self {
            Error::ManagedException(t) => t.clone(),
            other => Throwable::new(other.exception_class(), other.to_string()),
        }
    }
}

impl From<Throwable> for Error {
    fn from(other: Throwable) -> Self {
        Error::ManagedException(other)
    }
}

/// Reports an internal consistency violation and aborts the process.
///
/// Used when shared bridge state can no longer be trusted, e.g. a table lock
/// was poisoned by a panic in the middle of an update.
#[cold]
pub(crate) fn fatal(context: &str) -> ! {
    log::error!("peer-bridge internal consistency violation: {context}");
    std::process::abort()
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
