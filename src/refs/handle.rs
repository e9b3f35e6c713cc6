use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

struct HandleInner {
    id: u64,
    class: String,
    payload: Box<dyn Any + Send + Sync>,
}

/// A strong handle to a foreign object.
///
/// Handles are how reference types cross the bridge: arguments of object or
/// array type are passed as handles, and the reference keeper pins objects by
/// holding on to clones of their handle.
///
/// * Handles are cheap to clone; every clone pins the same object.
///
/// * Handles are [`Send`] and [`Sync`] and can be moved to whichever thread
///   the native runtime delivers a callback on.
///
/// * The object is released when the last strong handle is dropped. Use a
///   [`WeakHandle`] to observe an object without keeping it alive.
#[derive(Clone)]
pub struct ObjectHandle {
    inner: Arc<HandleInner>,
}

impl ObjectHandle {
    /// Wraps `payload` as an object of the given native class.
    ///
    /// Dotted class names are normalized to the internal `a/b/C` form.
    pub fn new<T: Any + Send + Sync>(class: impl AsRef<str>, payload: T) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                class: class.as_ref().replace('.', "/"),
                payload: Box::new(payload),
            }),
        }
    }

    /// Creates a `java/lang/String` object.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new("java/lang/String", s.into())
    }

    /// Process-unique id of the underlying object.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Native class name of the object.
    pub fn class(&self) -> &str {
        &self.inner.class
    }

    /// Borrows the payload if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.payload.downcast_ref()
    }

    /// Borrows a `java/lang/String` payload.
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Whether both handles refer to the same object.
    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a weak handle to the same object.
    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of strong handles currently pinning the object.
    pub fn pin_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl Eq for ObjectHandle {}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.inner.id)
            .field("class", &self.inner.class)
            .finish()
    }
}

/// A handle to a foreign object that does *not* keep it alive.
///
/// Upgrading returns `None` once every strong [`ObjectHandle`] has been
/// dropped.
#[derive(Clone)]
pub struct WeakHandle {
    id: u64,
    inner: Weak<HandleInner>,
}

impl WeakHandle {
    /// Id of the object this handle was created from.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns a strong handle if the object is still alive.
    pub fn upgrade(&self) -> Option<ObjectHandle> {
        self.inner.upgrade().map(|inner| ObjectHandle { inner })
    }

    /// Whether the object is still pinned by some strong handle.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static_assertions::assert_impl_all!(ObjectHandle: Send, Sync);
    static_assertions::assert_impl_all!(WeakHandle: Send, Sync);

    #[test]
    fn weak_handle_does_not_pin() {
        let obj = ObjectHandle::string("r1");
        let weak = obj.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.upgrade().unwrap().as_str(), Some("r1"));
        drop(obj);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clones_are_the_same_object() {
        let a = ObjectHandle::new("com.example.Thing", 5u32);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.pin_count(), 2);
        assert_eq!(b.class(), "com/example/Thing");
        assert_eq!(b.downcast_ref::<u32>(), Some(&5));
        assert_ne!(a, ObjectHandle::new("com/example/Thing", 5u32));
    }
}
