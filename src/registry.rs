//! The method registry: which managed handler runs in place of each native
//! method of a bound type.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, RwLock},
};

use log::debug;

use crate::{
    descriptors::{BoundType, MethodDescriptor, TypeIdentity},
    errors::*,
    managed::{Handler, TypeManager},
};

/// A registered native method together with its resolved handler.
pub struct RegisteredMethod {
    desc: MethodDescriptor,
    handler: Handler,
}

impl RegisteredMethod {
    /// The descriptor the method was registered with.
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.desc
    }

    /// The managed handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for RegisteredMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegisteredMethod")
            .field(&self.desc.to_string())
            .finish()
    }
}

/// The immutable method set of one bound type.
///
/// Entries are built completely before they are published, and never change
/// afterwards, so a reader holding an `Arc<TypeEntry>` always sees a fully
/// formed method set.
#[derive(Debug)]
pub struct TypeEntry {
    bound: BoundType,
    // name -> signature -> method
    methods: HashMap<String, HashMap<String, RegisteredMethod>>,
    len: usize,
}

impl TypeEntry {
    /// The bound type this entry belongs to.
    pub fn bound_type(&self) -> &BoundType {
        &self.bound
    }

    /// Looks up a method by native name and signature.
    pub fn lookup(&self, name: &str, sig: &str) -> Option<&RegisteredMethod> {
        self.methods.get(name)?.get(sig)
    }

    /// Like [`TypeEntry::lookup`] but fails with [`Error::UnknownSignature`].
    pub fn resolve(&self, name: &str, sig: &str) -> Result<&RegisteredMethod> {
        self.lookup(name, sig).ok_or_else(|| Error::UnknownSignature {
            bound: self.bound.clone(),
            name: name.to_owned(),
            sig: sig.to_owned(),
        })
    }

    /// Iterates over the registered methods in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &RegisteredMethod> {
        self.methods.values().flat_map(HashMap::values)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the type has no methods.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn same_descriptors(&self, descriptors: &[MethodDescriptor]) -> bool {
        descriptors.len() == self.len
            && descriptors.iter().all(|d| {
                self.lookup(d.name(), d.sig().sig())
                    .is_some_and(|m| m.desc == *d)
            })
    }
}

/// Process-wide table mapping (bound type, name, signature) to a managed
/// handler.
///
/// Registration happens once per bound type, typically at module load, while
/// lookups happen on every native call. Writers are serialized around the
/// insert only; readers share an already published `Arc<TypeEntry>`.
#[derive(Default)]
pub struct MethodRegistry {
    entries: RwLock<HashMap<BoundType, Arc<TypeEntry>>>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the native methods of `bound`.
    ///
    /// Every handler is resolved against `types` before anything is
    /// published, so lookups are total for every method of a successfully
    /// registered type.
    ///
    /// Registering the same descriptor set again (in any order) is a no-op
    /// that returns the existing entry. Registering a different set fails
    /// with [`Error::DuplicateRegistration`] and leaves the existing entry
    /// untouched.
    pub fn register(
        &self,
        types: &TypeManager,
        bound: &BoundType,
        descriptors: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Result<Arc<TypeEntry>> {
        let descriptors: Vec<MethodDescriptor> = descriptors.into_iter().collect();

        let mut seen = HashSet::new();
        for d in &descriptors {
            if !seen.insert((d.name(), d.sig().sig())) {
                return Err(Error::DuplicateRegistration {
                    key: bound.to_string(),
                    reason: format!("method {}{} is listed twice", d.name(), d.sig()),
                });
            }
        }

        // Fast path (read-lock)
        if let Some(existing) = self.entry(bound) {
            return Self::reregister(existing, &descriptors);
        }

        // Slow path: resolve every handler without holding any lock. If
        // another thread registers the same type meanwhile, the first insert
        // wins and we compare against it below.
        let entry = Self::build_entry(types, bound, descriptors.clone())?;

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|_| fatal("method registry lock poisoned"));
        if let Some(existing) = entries.get(bound) {
            return Self::reregister(existing.clone(), &descriptors);
        }
        let entry = Arc::new(entry);
        entries.insert(bound.clone(), entry.clone());
        drop(entries);

        debug!("registered {} with {} method(s)", bound, entry.len());
        Ok(entry)
    }

    /// Parses a method table and registers it for the managed type
    /// `type_name` bound to `native_class`.
    ///
    /// This is the form in which generated bindings announce themselves: an
    /// assembly-qualified type name, the native class, and one
    /// `name:signature:connector[:invoker]` record per line.
    pub fn register_table(
        &self,
        types: &TypeManager,
        type_name: &str,
        native_class: &str,
        table: &str,
    ) -> Result<Arc<TypeEntry>> {
        let bound = BoundType::new(native_class, TypeIdentity::from_str(type_name)?);
        self.register(types, &bound, MethodDescriptor::parse_table(table)?)
    }

    /// The published entry for `bound`, if registered.
    ///
    /// Takes the registry's read lock. The returned entry is immutable and can
    /// be kept: lookups through [`TypeEntry::resolve`] on it take no lock.
    pub fn entry(&self, bound: &BoundType) -> Option<Arc<TypeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|_| fatal("method registry lock poisoned"))
            .get(bound)
            .cloned()
    }

    /// Whether `bound` has been registered.
    pub fn is_registered(&self, bound: &BoundType) -> bool {
        self.entry(bound).is_some()
    }

    /// Resolves the handler of `name` + `sig` on `bound`.
    ///
    /// Takes the registry's read lock on every call. Hot paths should hold on
    /// to the [`TypeEntry`] from [`MethodRegistry::entry`] and resolve through
    /// it instead; dispatch does so through the peer's cached entry.
    pub fn resolve(&self, bound: &BoundType, name: &str, sig: &str) -> Result<Handler> {
        let unknown = || Error::UnknownSignature {
            bound: bound.clone(),
            name: name.to_owned(),
            sig: sig.to_owned(),
        };
        let entry = self.entry(bound).ok_or_else(unknown)?;
        let method = entry.lookup(name, sig).ok_or_else(unknown)?;
        Ok(method.handler.clone())
    }

    /// Number of registered bound types.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|_| fatal("method registry lock poisoned"))
            .len()
    }

    /// Whether no type has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reregister(
        existing: Arc<TypeEntry>,
        descriptors: &[MethodDescriptor],
    ) -> Result<Arc<TypeEntry>> {
        if existing.same_descriptors(descriptors) {
            debug!("{} is already registered, ignoring", existing.bound);
            Ok(existing)
        } else {
            Err(Error::DuplicateRegistration {
                key: existing.bound.to_string(),
                reason: "already registered with a different method set".to_owned(),
            })
        }
    }

    fn build_entry(
        types: &TypeManager,
        bound: &BoundType,
        descriptors: Vec<MethodDescriptor>,
    ) -> Result<TypeEntry> {
        let len = descriptors.len();
        let mut methods: HashMap<String, HashMap<String, RegisteredMethod>> = HashMap::new();
        for desc in descriptors {
            let host = desc.invoker().unwrap_or(bound.managed());
            let handler = types.connector(host, desc.handler())?;
            methods
                .entry(desc.name().to_owned())
                .or_default()
                .insert(desc.sig().sig().to_owned(), RegisteredMethod { desc, handler });
        }
        Ok(TypeEntry {
            bound: bound.clone(),
            methods,
            len,
        })
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("types", &self.len())
            .finish()
    }
}
