//! Query envelope and query bus for the read side.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DispatchError;

/// A query envelope: a string `type` routing key plus a JSON payload.
///
/// Shaped like [`Command`](crate::Command), but handlers on this bus read
/// projections instead of appending events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Routing key, serialized as `type`.
    #[serde(rename = "type")]
    pub query_type: String,
    /// Query arguments. Missing on the wire means `null`.
    #[serde(default)]
    pub payload: Value,
}

impl Query {
    /// Build a query envelope.
    pub fn new(query_type: impl Into<String>, payload: Value) -> Self {
        Self {
            query_type: query_type.into(),
            payload,
        }
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, DispatchError>> + Send>>;
type QueryHandler = dyn Fn(Query) -> HandlerFuture + Send + Sync;

/// Routes query envelopes to registered handlers by their `type` field.
///
/// `Clone` is cheap -- the routing table is `Arc`-wrapped and shared.
#[derive(Clone)]
pub struct QueryBus {
    handlers: Arc<RwLock<HashMap<String, Arc<QueryHandler>>>>,
}

// Manual `Debug` because handler closures are not `Debug`.
impl std::fmt::Debug for QueryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBus").finish_non_exhaustive()
    }
}

impl QueryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handler for one query type.
    ///
    /// Registering a type that already has a handler silently replaces it.
    pub async fn register<F, Fut>(&self, query_type: impl Into<String>, handler: F)
    where
        F: Fn(Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DispatchError>> + Send + 'static,
    {
        let query_type = query_type.into();
        let boxed: Arc<QueryHandler> = Arc::new(move |query| Box::pin(handler(query)));
        let replaced = self
            .handlers
            .write()
            .await
            .insert(query_type.clone(), boxed)
            .is_some();
        tracing::debug!(query_type = %query_type, replaced, "query handler registered");
    }

    /// Dispatch a query to its registered handler and return the handler's
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoHandler`] if no handler is registered for
    /// the query's type. Handler errors are returned as-is, never swallowed.
    pub async fn dispatch(&self, query: Query) -> Result<Value, DispatchError> {
        let query_type = query.query_type.clone();
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&query_type).cloned()
        }
        .ok_or_else(|| DispatchError::NoHandler(query_type.clone()))?;

        let correlation_id = Uuid::new_v4();
        tracing::debug!(
            query_type = %query_type,
            correlation_id = %correlation_id,
            "dispatching query"
        );

        handler(query).await
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new()
    }
}
