use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use log::{debug, log, warn, Level};
use once_cell::sync::Lazy;

use crate::{
    descriptors::{BoundType, MethodDescriptor},
    errors::*,
    instance::{Instance, InstanceState},
    managed::{ManagedType, TypeManager},
    refs::ObjectHandle,
    registry::{MethodRegistry, TypeEntry},
};

/// Builder for a [`Bridge`].
///
/// Options can be set through typed setters or as strings, in the style of
/// VM launch options:
///
/// * `-verbose:dispatch` logs every dispatch at [`log::Level::Trace`].
/// * `-verbose:lifecycle` logs activation and teardown at
///   [`log::Level::Info`] instead of [`log::Level::Debug`].
///
/// ```
/// # use peer_bridge::BridgeBuilder;
/// let bridge = BridgeBuilder::new()
///     .option("-verbose:dispatch")
///     .build()
///     .unwrap();
/// ```
pub struct BridgeBuilder {
    opts: Vec<String>,
    ignore_unrecognized: bool,
    verbose_dispatch: bool,
    verbose_lifecycle: bool,
    sink: Option<Arc<dyn UnhandledErrorSink>>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        BridgeBuilder {
            opts: vec![],
            ignore_unrecognized: false,
            verbose_dispatch: false,
            verbose_lifecycle: false,
            sink: None,
        }
    }
}

impl BridgeBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a string option.
    pub fn option(self, opt_string: &str) -> Self {
        let mut s = self;
        s.opts.push(opt_string.into());
        s
    }

    /// Whether unknown string options are skipped instead of failing `build`.
    pub fn ignore_unrecognized(self, ignore: bool) -> Self {
        let mut s = self;
        s.ignore_unrecognized = ignore;
        s
    }

    /// Logs every dispatch at trace level.
    pub fn verbose_dispatch(self, verbose: bool) -> Self {
        let mut s = self;
        s.verbose_dispatch = verbose;
        s
    }

    /// Logs activation and teardown at info level.
    pub fn verbose_lifecycle(self, verbose: bool) -> Self {
        let mut s = self;
        s.verbose_lifecycle = verbose;
        s
    }

    /// Where failures that cannot reach their native call site are sent.
    ///
    /// Defaults to [`LogSink`].
    pub fn error_sink(self, sink: Arc<dyn UnhandledErrorSink>) -> Self {
        let mut s = self;
        s.sink = Some(sink);
        s
    }

    /// Builds the bridge.
    pub fn build(self) -> Result<Bridge> {
        let mut verbose_dispatch = self.verbose_dispatch;
        let mut verbose_lifecycle = self.verbose_lifecycle;
        for opt in &self.opts {
            match opt.as_str() {
                "-verbose:dispatch" => verbose_dispatch = true,
                "-verbose:lifecycle" => verbose_lifecycle = true,
                _ if self.ignore_unrecognized => {
                    debug!("ignoring unrecognized bridge option '{opt}'")
                }
                _ => return Err(Error::InvalidOption(opt.clone())),
            }
        }

        Ok(Bridge {
            types: TypeManager::new(),
            registry: MethodRegistry::new(),
            instances: RwLock::new(HashMap::new()),
            next_instance_id: AtomicU64::new(1),
            sink: self.sink.unwrap_or_else(|| Arc::new(LogSink)),
            verbose_dispatch,
            lifecycle_level: if verbose_lifecycle {
                Level::Info
            } else {
                Level::Debug
            },
        })
    }
}

/// The bridge between a native runtime and the managed code implementing its
/// callbacks.
///
/// A bridge owns the managed [`TypeManager`], the [`MethodRegistry`], and the
/// table of live native instances. Production code normally uses the single
/// process-wide [`Bridge::global`]; independent bridges can be built with a
/// [`BridgeBuilder`].
///
/// All operations are synchronous and may be called from any thread.
pub struct Bridge {
    pub(crate) types: TypeManager,
    pub(crate) registry: MethodRegistry,
    instances: RwLock<HashMap<u64, Instance>>,
    next_instance_id: AtomicU64,
    sink: Arc<dyn UnhandledErrorSink>,
    pub(crate) verbose_dispatch: bool,
    lifecycle_level: Level,
}

static GLOBAL: Lazy<Bridge> = Lazy::new(|| {
    BridgeBuilder::new()
        .build()
        .unwrap_or_else(|_| fatal("default bridge configuration rejected"))
});

impl Bridge {
    /// The process-wide bridge, built with the default configuration on first
    /// use.
    pub fn global() -> &'static Bridge {
        &GLOBAL
    }

    /// The managed type table.
    pub fn types(&self) -> &TypeManager {
        &self.types
    }

    /// The method registry.
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Shorthand for [`TypeManager::register_type`].
    pub fn register_type(&self, ty: ManagedType) -> Result<()> {
        self.types.register_type(ty).map(|_| ())
    }

    /// Shorthand for [`MethodRegistry::register`] against this bridge's
    /// managed types.
    pub fn register(
        &self,
        bound: &BoundType,
        descriptors: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Result<Arc<TypeEntry>> {
        self.registry.register(&self.types, bound, descriptors)
    }

    /// Shorthand for [`MethodRegistry::register_table`] against this
    /// bridge's managed types.
    pub fn register_table(
        &self,
        type_name: &str,
        native_class: &str,
        table: &str,
    ) -> Result<Arc<TypeEntry>> {
        self.registry
            .register_table(&self.types, type_name, native_class, table)
    }

    /// Called by the native runtime when it constructs an object of runtime
    /// class `class`.
    pub fn construct(&self, class: &str) -> Instance {
        let id = self.next_instance_id.fetch_add(1, Ordering::Relaxed);
        let instance = Instance::new(id, class);
        self.instances
            .write()
            .unwrap_or_else(|_| fatal("instance table lock poisoned"))
            .insert(id, instance.clone());
        self.lifecycle(format_args!("constructed {instance:?}"));
        instance
    }

    /// Looks up a live instance by id.
    pub fn instance(&self, id: u64) -> Option<Instance> {
        self.instances
            .read()
            .unwrap_or_else(|_| fatal("instance table lock poisoned"))
            .get(&id)
            .cloned()
    }

    /// Number of constructed instances that have not been finalized.
    pub fn live_instances(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(|_| fatal("instance table lock poisoned"))
            .len()
    }

    /// Called by the native runtime when it finalizes `instance`.
    ///
    /// Detaches the peer and releases every retained reference. The instance
    /// is torn down for good; returns `false` if it already was, or if it was
    /// constructed by another bridge (which leaves it untouched).
    pub fn finalize(&self, instance: &Instance) -> bool {
        let owned = {
            let mut instances = self
                .instances
                .write()
                .unwrap_or_else(|_| fatal("instance table lock poisoned"));
            match instances.get(&instance.id()) {
                Some(known) if known.same_instance(instance) => {
                    instances.remove(&instance.id());
                    true
                }
                _ => false,
            }
        };
        if !owned {
            if instance.state() != InstanceState::TornDown {
                warn!(
                    "refusing to finalize instance #{} ({}): not constructed by this bridge",
                    instance.id(),
                    instance.class()
                );
            }
            return false;
        }

        let Some((peer, released)) = instance.tear_down() else {
            return false;
        };
        self.lifecycle(format_args!(
            "finalized instance #{} ({}): peer {}, released {released} reference(s)",
            instance.id(),
            instance.class(),
            if peer.is_some() { "detached" } else { "absent" },
        ));
        true
    }

    /// Keeps `obj` alive for as long as `instance` is.
    ///
    /// Duplicates are kept: retaining the same object twice pins it twice.
    /// Fails with [`Error::TornDown`] once the instance has been finalized.
    pub fn retain(&self, instance: &Instance, obj: ObjectHandle) -> Result<()> {
        if instance.retained().push(obj) {
            Ok(())
        } else {
            warn!(
                "refusing to retain a reference on torn down instance #{}",
                instance.id()
            );
            Err(Error::TornDown {
                id: instance.id(),
                class: instance.class().to_owned(),
            })
        }
    }

    /// Releases every reference `instance` retains. Returns how many were
    /// released; calling it again is a no-op returning `0`.
    pub fn clear_all(&self, instance: &Instance) -> usize {
        let released = instance.retained().clear();
        if released > 0 {
            debug!(
                "released {released} reference(s) of instance #{}",
                instance.id()
            );
        }
        released
    }

    /// A snapshot of what `instance` currently retains, oldest first.
    pub fn retained(&self, instance: &Instance) -> Vec<ObjectHandle> {
        instance.retained().snapshot()
    }

    pub(crate) fn report_unhandled(&self, failure: DispatchFailure) {
        self.sink.report(&failure);
    }

    pub(crate) fn lifecycle(&self, args: fmt::Arguments<'_>) {
        log!(self.lifecycle_level, "{args}");
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("types", &self.types)
            .field("registry", &self.registry)
            .field("live_instances", &self.live_instances())
            .field("verbose_dispatch", &self.verbose_dispatch)
            .finish()
    }
}
