//! Identities and descriptors consumed by the bridge: which native class is
//! bound to which managed type, and which native methods it redirects.

use std::fmt;

mod method_desc;
pub use method_desc::*;

mod type_name;
pub use type_name::*;

/// A native class paired with the managed type that implements it.
///
/// The native class name is stored in internal form (`a/b/C`); dotted names
/// are normalized on construction.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct BoundType {
    native_class: String,
    managed: TypeIdentity,
}

impl BoundType {
    /// Binds `native_class` to `managed`.
    pub fn new(native_class: impl AsRef<str>, managed: TypeIdentity) -> Self {
        Self {
            native_class: native_class.as_ref().replace('.', "/"),
            managed,
        }
    }

    /// Internal name of the native class.
    pub fn native_class(&self) -> &str {
        &self.native_class
    }

    /// Identity of the managed type.
    pub fn managed(&self) -> &TypeIdentity {
        &self.managed
    }
}

impl fmt::Display for BoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => [{}]", self.native_class, self.managed)
    }
}
