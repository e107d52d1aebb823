//! Synchronous, typed listener registry.
//!
//! Replaces engine-style `+=` / `-=` delegates with an explicit registry that
//! each component owns.  Dispatch happens on the caller's thread, inside the
//! call that produced the event, in registration order.
//!
//! # Example
//!
//! ```rust
//! use tagsense_middleware::{Listeners, EventRecorder};
//!
//! let mut listeners: Listeners<u32> = Listeners::new();
//! let recorder = EventRecorder::new();
//! let id = listeners.subscribe(recorder.listener());
//!
//! listeners.emit(&7);
//! assert!(listeners.unsubscribe(id));
//! listeners.emit(&8);
//!
//! assert_eq!(recorder.take(), vec![7]);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Boxed callback invoked with a reference to every emitted event.
pub type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Handle returned by [`Listeners::subscribe`]; pass it back to
/// [`Listeners::unsubscribe`] to detach the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered set of callbacks for one event type.
pub struct Listeners<E> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<E>)>,
}

impl<E> Listeners<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register `listener`.  It will be called after every listener that was
    /// registered before it.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(listener)));
        debug!(listener = id.0, total = self.entries.len(), "listener subscribed");
        id
    }

    /// Remove the listener registered under `id`.
    ///
    /// Returns `false` when `id` is unknown (already removed, or issued by a
    /// different registry).
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = self.entries.len() != before;
        if removed {
            debug!(listener = id.0, total = self.entries.len(), "listener unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every listener, in registration order.
    pub fn emit(&mut self, event: &E) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventRecorder
// ---------------------------------------------------------------------------

/// Cloneable sink that stores a copy of every event it is handed.
///
/// Useful for collaborators that poll once per cycle instead of reacting in
/// the callback, and for tests.
#[derive(Debug)]
pub struct EventRecorder<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Clone for EventRecorder<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> Default for EventRecorder<E> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone + Send + 'static> EventRecorder<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that appends to this recorder.
    pub fn listener(&self) -> impl FnMut(&E) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |event: &E| lock(&events).push(event.clone())
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *lock(&self.events))
    }

    /// Copy of everything recorded so far, without draining.
    pub fn snapshot(&self) -> Vec<E> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

// A panicking listener must not make the recorder unusable.
fn lock<E>(events: &Mutex<Vec<E>>) -> MutexGuard<'_, Vec<E>> {
    events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
