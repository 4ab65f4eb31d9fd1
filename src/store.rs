//! File-backed event store: per-kind append-only logs, replay on open,
//! and synchronous subscriber fan-out.
//!
//! The store is opened via [`EventStoreBuilder`], which declares the set of
//! stream kinds up front and replays each kind's log file into memory. Every
//! subsequent append goes to disk first, then to the in-memory list, then to
//! subscribers, all inside the kind's lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::event::Event;
use crate::projection::{Projection, ProjectionHandle};
use crate::storage::{self, LogLayout};

/// Error type subscriber callbacks may return.
///
/// A failing subscriber is logged and skipped; it never fails the append and
/// never prevents later subscribers from seeing the event.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed subscriber callback stored in a kind's fan-out list.
type SubscriberFn = Box<dyn Fn(&Event) -> Result<(), SubscriberError> + Send + Sync>;

/// One registered subscriber, tagged with the id its [`Subscription`] holds.
struct SubscriberEntry {
    id: u64,
    handler: SubscriberFn,
}

/// All state of a single stream kind, guarded by one mutex so the
/// write-notify sequence of an append is never interleaved.
struct KindState {
    /// Log file backing this kind.
    path: PathBuf,
    /// Full event list, oldest first. Always mirrors the log file.
    events: Vec<Event>,
    /// Fan-out list in registration order.
    subscribers: Vec<SubscriberEntry>,
    /// Next id handed to a subscriber.
    next_subscriber_id: u64,
}

struct StoreInner {
    layout: LogLayout,
    /// Kind set is fixed at open; only the per-kind state behind each mutex
    /// changes afterwards.
    kinds: HashMap<String, Mutex<KindState>>,
}

/// Event store over one log file per stream kind.
///
/// `Clone` is cheap -- all internal state is `Arc`-wrapped.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<StoreInner>,
}

// Manual `Debug` because subscriber callbacks are not `Debug`.
impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("data_dir", &self.inner.layout.data_dir())
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl EventStore {
    /// Directory holding the per-kind log files.
    pub fn data_dir(&self) -> &Path {
        self.inner.layout.data_dir()
    }

    /// Registered stream kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.inner.kinds.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    fn kind_state(&self, kind: &str) -> Result<&Mutex<KindState>, StoreError> {
        self.inner
            .kinds
            .get(kind)
            .ok_or_else(|| StoreError::UnknownStreamKind(kind.to_owned()))
    }

    /// Append one event to a kind's log.
    ///
    /// The event is written to disk first; only after the write succeeds is
    /// it added to the in-memory list and handed to every subscriber of the
    /// kind, in registration order. The whole sequence runs under the kind's
    /// lock, so by the time `append` returns, every reader of the store (and
    /// every projection attached to the kind) already observes the event.
    ///
    /// A subscriber returning `Err` is logged and skipped; the append still
    /// succeeds and later subscribers still run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStreamKind`] if `kind` was not declared
    /// at open, [`StoreError::Serialization`] if the event cannot be encoded
    /// (nothing is written in that case), or [`StoreError::Io`] if the disk
    /// write fails.
    pub async fn append(&self, kind: &str, event: Event) -> Result<(), StoreError> {
        let mut state = self.kind_state(kind)?.lock().await;

        // Serialize before touching the file so an unencodable event leaves
        // no partial line behind.
        let line = serde_json::to_string(&event)?;
        storage::append_line(&state.path, &line)?;

        tracing::debug!(
            kind = %kind,
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            "event appended"
        );

        state.events.push(event.clone());

        for entry in &state.subscribers {
            if let Err(e) = (entry.handler)(&event) {
                tracing::warn!(
                    kind = %kind,
                    subscriber_id = entry.id,
                    error = %e,
                    "subscriber failed, continuing fan-out"
                );
            }
        }

        Ok(())
    }

    /// Full event list of a kind, oldest first.
    ///
    /// The returned vector is a copy; mutating it does not affect the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStreamKind`] if `kind` was not declared
    /// at open.
    pub async fn events(&self, kind: &str) -> Result<Vec<Event>, StoreError> {
        let state = self.kind_state(kind)?.lock().await;
        Ok(state.events.clone())
    }

    /// Events of a kind belonging to one aggregate instance, oldest first.
    ///
    /// An id with no events yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStreamKind`] if `kind` was not declared
    /// at open.
    pub async fn events_for(
        &self,
        kind: &str,
        aggregate_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let state = self.kind_state(kind)?.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|event| event.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    /// Register a callback invoked for every event appended to `kind` from
    /// now on. History is not replayed into the callback; use
    /// [`events`](Self::events) first if the caller needs it, or
    /// [`attach`](Self::attach) for a projection that must see everything.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStreamKind`] if `kind` was not declared
    /// at open.
    pub async fn subscribe<F>(&self, kind: &str, handler: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let mut state = self.kind_state(kind)?.lock().await;
        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        state.subscribers.push(SubscriberEntry {
            id,
            handler: Box::new(handler),
        });

        tracing::debug!(kind = %kind, subscriber_id = id, "subscriber registered");

        Ok(Subscription {
            store: self.clone(),
            kind: kind.to_owned(),
            id,
        })
    }

    /// Seed a projection from the kind's history, then subscribe it to every
    /// later append.
    ///
    /// Both steps run under the kind's lock, so no event can fall in the gap
    /// between seeding and going live. The returned handle always reflects
    /// the full stream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStreamKind`] if [`Projection::KIND`] was
    /// not declared at open.
    pub async fn attach<P: Projection>(&self) -> Result<ProjectionHandle<P>, StoreError> {
        let mut state = self.kind_state(P::KIND)?.lock().await;

        let mut projection = P::default();
        for event in &state.events {
            projection.apply(event);
        }
        let seeded = state.events.len();
        let handle = ProjectionHandle::new(projection);

        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        let live = handle.clone();
        state.subscribers.push(SubscriberEntry {
            id,
            handler: Box::new(move |event| {
                live.fold(event);
                Ok(())
            }),
        });

        tracing::debug!(
            kind = P::KIND,
            subscriber_id = id,
            seeded_events = seeded,
            "projection attached"
        );

        Ok(handle)
    }
}

/// Handle to one registered subscriber, returned by
/// [`EventStore::subscribe`]. Dropping it does nothing; call
/// [`unsubscribe`](Subscription::unsubscribe) to stop delivery.
#[derive(Debug)]
pub struct Subscription {
    store: EventStore,
    kind: String,
    id: u64,
}

impl Subscription {
    /// Stream kind this subscription listens on.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Remove the subscriber from the kind's fan-out list. Events appended
    /// after this returns are no longer delivered.
    pub async fn unsubscribe(self) {
        // The kind set is fixed at open and this subscription was created
        // against a registered kind, so the lookup cannot fail.
        let Ok(state_mutex) = self.store.kind_state(&self.kind) else {
            return;
        };
        let mut state = state_mutex.lock().await;
        state.subscribers.retain(|entry| entry.id != self.id);
        tracing::debug!(kind = %self.kind, subscriber_id = self.id, "subscriber removed");
    }
}

/// Builder for configuring and opening an [`EventStore`].
///
/// Collects the data directory and the set of stream kinds, then replays
/// each kind's log file on [`open`](EventStoreBuilder::open).
///
/// # Examples
///
/// ```no_run
/// use campus_es::EventStoreBuilder;
///
/// # async fn example() -> Result<(), campus_es::StoreError> {
/// let store = EventStoreBuilder::new()
///     .data_dir("/var/lib/my-app")
///     .stream_kind("student")
///     .stream_kind("teacher")
///     .open()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct EventStoreBuilder {
    data_dir: Option<PathBuf>,
    kinds: Vec<String>,
}

impl EventStoreBuilder {
    /// Create a new builder with no configuration.
    pub fn new() -> Self {
        Self {
            data_dir: None,
            kinds: Vec::new(),
        }
    }

    /// Set the directory holding the per-kind log files.
    ///
    /// If not set, defaults to a system temp directory.
    pub fn data_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.data_dir = Some(path.as_ref().to_owned());
        self
    }

    /// Declare a stream kind. Appends and reads against any kind not
    /// declared here fail with [`StoreError::UnknownStreamKind`].
    ///
    /// Declaring the same kind twice is harmless.
    pub fn stream_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    /// Create the data directory if needed, replay every declared kind's
    /// log file, and build the [`EventStore`].
    ///
    /// A missing log file is an empty stream. Log files are not created
    /// here; each appears on the kind's first append.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created or a
    /// log file cannot be read, or [`StoreError::Serialization`] if a log
    /// line does not parse. The log is the source of truth, so a corrupt
    /// line fails the open rather than being skipped.
    pub async fn open(self) -> Result<EventStore, StoreError> {
        let data_dir = self
            .data_dir
            .unwrap_or_else(|| std::env::temp_dir().join("campus-es"));
        let layout = LogLayout::new(data_dir);
        layout.ensure_data_dir()?;

        let mut kinds = HashMap::new();
        for kind in self.kinds {
            if kinds.contains_key(&kind) {
                continue;
            }
            let path = layout.stream_file(&kind);
            let events = storage::load_events(&path)?;
            tracing::debug!(kind = %kind, replayed = events.len(), "stream loaded");
            kinds.insert(
                kind,
                Mutex::new(KindState {
                    path,
                    events,
                    subscribers: Vec::new(),
                    next_subscriber_id: 0,
                }),
            );
        }

        Ok(EventStore {
            inner: Arc::new(StoreInner { layout, kinds }),
        })
    }
}

impl Default for EventStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    async fn student_store(dir: &Path) -> EventStore {
        EventStoreBuilder::new()
            .data_dir(dir)
            .stream_kind("student")
            .open()
            .await
            .expect("open should succeed")
    }

    fn created(id: &str, name: &str) -> Event {
        Event::new("StudentCreated", id, json!({ "name": name }))
    }

    #[tokio::test]
    async fn append_then_read_preserves_order() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");
        store
            .append(
                "student",
                Event::new("StudentNameUpdated", "s-1", json!({ "name": "Anna" })),
            )
            .await
            .expect("append should succeed");

        let events = store.events("student").await.expect("read should succeed");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "StudentCreated");
        assert_eq!(events[1].event_type, "StudentNameUpdated");
    }

    #[tokio::test]
    async fn events_returns_a_defensive_copy() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;
        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");

        let mut copy = store.events("student").await.expect("read should succeed");
        copy.clear();

        let events = store.events("student").await.expect("read should succeed");
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn events_for_filters_by_aggregate_id() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;
        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");
        store
            .append("student", created("s-2", "Bo"))
            .await
            .expect("append should succeed");
        store
            .append(
                "student",
                Event::new("StudentNameUpdated", "s-1", json!({ "name": "Anna" })),
            )
            .await
            .expect("append should succeed");

        let events = store
            .events_for("student", "s-1")
            .await
            .expect("read should succeed");
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.aggregate_id == "s-1"));

        let none = store
            .events_for("student", "s-9")
            .await
            .expect("read should succeed");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn append_to_unknown_kind_fails_and_writes_nothing() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        let err = store
            .append("invoice", created("i-1", "x"))
            .await
            .expect_err("append should fail");
        assert!(
            matches!(err, StoreError::UnknownStreamKind(ref kind) if kind == "invoice"),
            "got: {err}"
        );
        assert!(!tmp.path().join("invoice.jsonl").exists());
    }

    #[tokio::test]
    async fn reads_of_unknown_kind_fail() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        assert!(store.events("invoice").await.is_err());
        assert!(store.events_for("invoice", "i-1").await.is_err());
    }

    #[tokio::test]
    async fn log_file_appears_on_first_append_only() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;
        let path = tmp.path().join("student.jsonl");
        assert!(!path.exists());

        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn subscriber_sees_only_appends_after_registration() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;
        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store
            .subscribe("student", move |event: &Event| {
                sink.lock().unwrap().push(event.aggregate_id.clone());
                Ok(())
            })
            .await
            .expect("subscribe should succeed");

        store
            .append("student", created("s-2", "Bo"))
            .await
            .expect("append should succeed");

        assert_eq!(*seen.lock().unwrap(), vec!["s-2".to_string()]);
    }

    #[tokio::test]
    async fn subscribers_run_in_registration_order() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        let order = Arc::new(StdMutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let sink = Arc::clone(&order);
            store
                .subscribe("student", move |_event: &Event| {
                    sink.lock().unwrap().push(tag);
                    Ok(())
                })
                .await
                .expect("subscribe should succeed");
        }

        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_stop_fan_out() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        store
            .subscribe("student", |_event: &Event| Err("handler exploded".into()))
            .await
            .expect("subscribe should succeed");

        let seen = Arc::new(StdMutex::new(0usize));
        let sink = Arc::clone(&seen);
        store
            .subscribe("student", move |_event: &Event| {
                *sink.lock().unwrap() += 1;
                Ok(())
            })
            .await
            .expect("subscribe should succeed");

        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed despite failing subscriber");

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;

        let seen = Arc::new(StdMutex::new(0usize));
        let sink = Arc::clone(&seen);
        let subscription = store
            .subscribe("student", move |_event: &Event| {
                *sink.lock().unwrap() += 1;
                Ok(())
            })
            .await
            .expect("subscribe should succeed");

        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");
        subscription.unsubscribe().await;
        store
            .append("student", created("s-2", "Bo"))
            .await
            .expect("append should succeed");

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn reopen_replays_the_log() {
        let tmp = tempfile::tempdir().expect("temp dir");
        {
            let store = student_store(tmp.path()).await;
            store
                .append("student", created("s-1", "Ann"))
                .await
                .expect("append should succeed");
            store
                .append("student", created("s-2", "Bo"))
                .await
                .expect("append should succeed");
        }

        let reopened = student_store(tmp.path()).await;
        let events = reopened
            .events("student")
            .await
            .expect("read should succeed");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], created("s-1", "Ann"));
        assert_eq!(events[1], created("s-2", "Bo"));
    }

    #[tokio::test]
    async fn open_fails_on_corrupt_log_line() {
        let tmp = tempfile::tempdir().expect("temp dir");
        std::fs::write(tmp.path().join("student.jsonl"), "not valid json!!!\n")
            .expect("write should succeed");

        let err = EventStoreBuilder::new()
            .data_dir(tmp.path())
            .stream_kind("student")
            .open()
            .await
            .expect_err("open should fail");
        assert!(matches!(err, StoreError::Serialization(_)), "got: {err}");
    }

    #[tokio::test]
    async fn attach_seeds_history_then_tracks_appends() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Roll {
            ids: Vec<String>,
        }

        impl Projection for Roll {
            const KIND: &'static str = "student";
            fn apply(&mut self, event: &Event) {
                self.ids.push(event.aggregate_id.clone());
            }
        }

        let tmp = tempfile::tempdir().expect("temp dir");
        let store = student_store(tmp.path()).await;
        store
            .append("student", created("s-1", "Ann"))
            .await
            .expect("append should succeed");

        let handle = store.attach::<Roll>().await.expect("attach should succeed");
        assert_eq!(handle.snapshot().ids, vec!["s-1".to_string()]);

        store
            .append("student", created("s-2", "Bo"))
            .await
            .expect("append should succeed");
        assert_eq!(
            handle.snapshot().ids,
            vec!["s-1".to_string(), "s-2".to_string()]
        );
    }

    #[tokio::test]
    async fn kinds_are_sorted_and_deduplicated() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let store = EventStoreBuilder::new()
            .data_dir(tmp.path())
            .stream_kind("teacher")
            .stream_kind("student")
            .stream_kind("teacher")
            .open()
            .await
            .expect("open should succeed");

        assert_eq!(store.kinds(), vec!["student", "teacher"]);
    }
}
