//! Crate-level error types for the event store and the dispatch buses.

/// Error returned by [`EventStore`](crate::store::EventStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Append, read, or subscribe named a stream kind that was never
    /// registered on the store builder.
    ///
    /// This is a configuration error, not a transient condition; callers
    /// should not retry.
    #[error("unknown stream kind: {0}")]
    UnknownStreamKind(String),

    /// Disk I/O failure.
    ///
    /// The durable write (or boot-time replay read) failed. On append this
    /// prevents the in-memory list update and subscriber fan-out, so memory
    /// and disk never diverge.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized for the log, or a log line could
    /// not be parsed back into an event during boot replay.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned when dispatching a command or query fails.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No handler is registered for this command or query type.
    ///
    /// Surfaced to the caller as a client-class error; the bus never
    /// retries.
    #[error("no handler registered for type: {0}")]
    NoHandler(String),

    /// The command type is not one the target aggregate implements.
    #[error("unsupported command type: {0}")]
    UnsupportedCommand(String),

    /// The type is recognized but its payload failed structural validation.
    #[error("invalid payload for type {request_type}: {source}")]
    InvalidPayload {
        /// The command or query type whose payload was rejected.
        request_type: String,
        /// The underlying deserialization failure.
        source: serde_json::Error,
    },

    /// The event store rejected an operation inside the handler.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Command rejected by aggregate logic.
    ///
    /// Wraps the domain-specific error returned from the aggregate's
    /// command handler, forwarding its `Display` and `Error` impls.
    #[error(transparent)]
    Domain(Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Wrap a domain error for propagation through the bus.
    pub fn domain(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Domain(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal domain error for testing `DispatchError::Domain`.
    #[derive(Debug, thiserror::Error)]
    #[error("enrollment window closed")]
    struct WindowClosed;

    #[test]
    fn unknown_stream_kind_names_the_kind() {
        let err = StoreError::UnknownStreamKind("invoice".to_string());
        assert_eq!(err.to_string(), "unknown stream kind: invoice");
    }

    #[test]
    fn store_error_io_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = StoreError::from(io_err);
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn no_handler_names_the_type() {
        let err = DispatchError::NoHandler("DeleteGalaxy".to_string());
        assert_eq!(
            err.to_string(),
            "no handler registered for type: DeleteGalaxy"
        );
    }

    #[test]
    fn unsupported_command_names_the_type() {
        let err = DispatchError::UnsupportedCommand("FreezeStudent".to_string());
        assert_eq!(err.to_string(), "unsupported command type: FreezeStudent");
    }

    #[test]
    fn invalid_payload_names_type_and_cause() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = DispatchError::InvalidPayload {
            request_type: "GetStudentById".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("GetStudentById"), "got: {msg}");
    }

    #[test]
    fn domain_error_displays_inner() {
        let err = DispatchError::domain(WindowClosed);
        assert_eq!(err.to_string(), "enrollment window closed");
    }

    #[test]
    fn store_error_converts_into_dispatch_error() {
        let err = DispatchError::from(StoreError::UnknownStreamKind("invoice".to_string()));
        assert_eq!(err.to_string(), "unknown stream kind: invoice");
    }

    // Verify `Send + Sync` bounds are satisfied so errors can cross task
    // boundaries inside tokio.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<StoreError>();
            assert_send_sync::<DispatchError>();
        }
    };
}
