//! Projection trait and the shared read handle.

use std::sync::{Arc, RwLock};

use crate::event::Event;

/// A read model folded from one stream kind's events.
///
/// # Contract
///
/// - [`apply`](Projection::apply) must be a total function: an event whose
///   type the projection does not recognize is a no-op, never an error.
/// - [`apply`](Projection::apply) must be deterministic: given the same
///   sequence of events, it must produce the same state. The state always
///   equals folding the kind's full event list from [`Default::default`].
///
/// Projections attached with [`EventStore::attach`](crate::EventStore::attach)
/// are seeded from history before they go live, so that equality holds from
/// the moment the handle is returned.
pub trait Projection: Default + Clone + Send + Sync + 'static {
    /// Stream kind whose events this projection folds (e.g. `"student"`).
    const KIND: &'static str;

    /// Fold a single event into the state.
    fn apply(&mut self, event: &Event);
}

/// Shared handle to a live projection.
///
/// The store keeps the state current by folding every appended event of the
/// projection's kind; readers access it through [`read`](Self::read) or take
/// an owned copy with [`snapshot`](Self::snapshot).
///
/// `Clone` is cheap -- all clones observe the same underlying state.
pub struct ProjectionHandle<P> {
    shared: Arc<RwLock<P>>,
}

impl<P: Projection> ProjectionHandle<P> {
    pub(crate) fn new(seeded: P) -> Self {
        Self {
            shared: Arc::new(RwLock::new(seeded)),
        }
    }

    /// Run a closure against the current state and return its result.
    ///
    /// The read lock is held only for the duration of the closure; do not
    /// block inside it.
    pub fn read<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        let guard = self.shared.read().expect("projection RwLock poisoned");
        f(&guard)
    }

    /// Take an owned copy of the current state.
    pub fn snapshot(&self) -> P {
        self.read(|projection| projection.clone())
    }

    /// Fold one event into the shared state. Called by the store during
    /// append fan-out.
    pub(crate) fn fold(&self, event: &Event) {
        let mut guard = self.shared.write().expect("projection RwLock poisoned");
        guard.apply(event);
    }
}

impl<P> Clone for ProjectionHandle<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Projection> std::fmt::Debug for ProjectionHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionHandle")
            .field("kind", &P::KIND)
            .finish_non_exhaustive()
    }
}
