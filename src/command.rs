//! Command envelope, command bus, and the generic write-side handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::{Aggregate, decode_command};
use crate::error::{DispatchError, StoreError};
use crate::event::encode_domain_event;
use crate::store::EventStore;

/// A command envelope: a string `type` routing key plus a JSON payload.
///
/// The envelope shape matches the adjacently tagged command enums of the
/// aggregates, so a typed command serializes to a dispatchable envelope and
/// back.
///
/// # Examples
///
/// ```
/// use campus_es::Command;
/// use serde_json::json;
///
/// let command = Command::new("CreateStudent", json!({ "id": "s-1", "name": "Ann" }));
/// assert_eq!(command.command_type, "CreateStudent");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Routing key, serialized as `type`.
    #[serde(rename = "type")]
    pub command_type: String,
    /// Command arguments. Missing on the wire means `null`.
    #[serde(default)]
    pub payload: Value,
}

impl Command {
    /// Build a command envelope.
    pub fn new(command_type: impl Into<String>, payload: Value) -> Self {
        Self {
            command_type: command_type.into(),
            payload,
        }
    }
}

/// Boxed future returned by bus handlers.
type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, DispatchError>> + Send>>;

/// Type-erased async handler stored in the routing table.
type CommandHandler = dyn Fn(Command) -> HandlerFuture + Send + Sync;

/// Routes command envelopes to registered handlers by their `type` field.
///
/// `Clone` is cheap -- the routing table is `Arc`-wrapped and shared.
#[derive(Clone)]
pub struct CommandBus {
    handlers: Arc<RwLock<HashMap<String, Arc<CommandHandler>>>>,
}

// Manual `Debug` because handler closures are not `Debug`.
impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus").finish_non_exhaustive()
    }
}

impl CommandBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handler for one command type.
    ///
    /// Registering a type that already has a handler silently replaces it;
    /// the previous handler is dropped.
    pub async fn register<F, Fut>(&self, command_type: impl Into<String>, handler: F)
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DispatchError>> + Send + 'static,
    {
        let command_type = command_type.into();
        let boxed: Arc<CommandHandler> = Arc::new(move |command| Box::pin(handler(command)));
        let replaced = self
            .handlers
            .write()
            .await
            .insert(command_type.clone(), boxed)
            .is_some();
        tracing::debug!(command_type = %command_type, replaced, "command handler registered");
    }

    /// Dispatch a command to its registered handler and return the handler's
    /// result.
    ///
    /// The routing table lock is released before the handler runs, so a
    /// handler may itself dispatch further commands.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoHandler`] if no handler is registered for
    /// the command's type. Handler errors are returned as-is, never
    /// swallowed.
    pub async fn dispatch(&self, command: Command) -> Result<Value, DispatchError> {
        let command_type = command.command_type.clone();
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&command_type).cloned()
        }
        .ok_or_else(|| DispatchError::NoHandler(command_type.clone()))?;

        let correlation_id = Uuid::new_v4();
        tracing::debug!(
            command_type = %command_type,
            correlation_id = %correlation_id,
            "dispatching command"
        );

        let result = handler(command).await;
        if let Err(ref e) = result {
            tracing::debug!(
                command_type = %command_type,
                correlation_id = %correlation_id,
                error = %e,
                "command failed"
            );
        }
        result
    }

    /// Register the generic write-side handler for every command type of
    /// `A`, routing each through [`execute_command`] against `store`.
    pub async fn register_aggregate<A>(&self, store: &EventStore)
    where
        A: Aggregate,
        A::Command: DeserializeOwned,
    {
        for command_type in A::COMMAND_TYPES {
            let store = store.clone();
            self.register(*command_type, move |command| {
                let store = store.clone();
                async move { execute_command::<A>(&store, command).await }
            })
            .await;
        }
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode, rehydrate, handle, append: the write-side sequence behind every
/// handler installed by [`CommandBus::register_aggregate`].
///
/// The aggregate is rebuilt from its instance's history, the typed command
/// is validated against that state, and every produced event is appended to
/// the aggregate's stream kind in order. Returns the appended events as a
/// JSON array.
///
/// # Errors
///
/// Returns [`DispatchError::UnsupportedCommand`] or
/// [`DispatchError::InvalidPayload`] if the envelope does not decode,
/// [`DispatchError::Domain`] if the aggregate rejects the command (nothing
/// is appended in that case), or [`DispatchError::Store`] if reading or
/// appending fails.
pub async fn execute_command<A>(store: &EventStore, command: Command) -> Result<Value, DispatchError>
where
    A: Aggregate,
    A::Command: DeserializeOwned,
{
    let typed = decode_command::<A>(&command)?;
    let aggregate_id = A::aggregate_id(&typed).to_owned();

    let history = store.events_for(A::KIND, &aggregate_id).await?;
    let state = A::load_from(&history);

    let domain_events = state.handle(typed).map_err(DispatchError::domain)?;

    let mut appended = Vec::with_capacity(domain_events.len());
    for domain_event in &domain_events {
        let event =
            encode_domain_event(&aggregate_id, domain_event).map_err(StoreError::from)?;
        store.append(A::KIND, event.clone()).await?;
        appended.push(event);
    }

    tracing::debug!(
        kind = A::KIND,
        aggregate_id = %aggregate_id,
        appended = appended.len(),
        "command executed"
    );

    let value = serde_json::to_value(&appended).map_err(StoreError::from)?;
    Ok(value)
}
