use std::sync::Mutex;

use crate::errors::fatal;

use super::ObjectHandle;

#[derive(Debug, Default)]
struct KeeperState {
    handles: Vec<ObjectHandle>,
    closed: bool,
}

/// The ordered set of foreign objects an instance keeps alive.
///
/// Duplicates are allowed: retaining the same object twice stores two
/// handles. Every mutation happens under one lock, so a clear never
/// interleaves with an in-flight retain and readers never observe a
/// partially cleared set.
#[derive(Debug, Default)]
pub struct RetainedReferenceSet {
    state: Mutex<KeeperState>,
}

impl RetainedReferenceSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KeeperState> {
        self.state
            .lock()
            .unwrap_or_else(|_| fatal("retained reference set lock poisoned"))
    }

    /// Appends `obj`. Returns `false` (dropping `obj`) once the set is closed.
    pub(crate) fn push(&self, obj: ObjectHandle) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.handles.push(obj);
        true
    }

    /// Releases every handle, returning how many were released.
    pub(crate) fn clear(&self) -> usize {
        let released = std::mem::take(&mut self.lock().handles);
        // dropped outside the lock
        released.len()
    }

    /// Releases every handle and rejects all further pushes.
    pub(crate) fn close(&self) -> usize {
        let released = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.handles)
        };
        released.len()
    }

    /// A snapshot of the retained handles, oldest first.
    pub fn snapshot(&self) -> Vec<ObjectHandle> {
        self.lock().handles.clone()
    }

    /// Number of retained handles, counting duplicates.
    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
