//! Aggregate trait and the typed-command bridge.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::command::Command;
use crate::error::DispatchError;
use crate::event::{Event, decode_event};

/// A domain aggregate whose state is derived from its event history.
///
/// The implementing type itself serves as the aggregate's state. State is
/// built by folding domain events through the [`apply`](Aggregate::apply)
/// method; [`load_from`](Aggregate::load_from) performs that fold over raw
/// envelope events so command handling can validate against history.
///
/// # Associated Types
///
/// - `Command`: the set of commands this aggregate can handle.
/// - `DomainEvent`: the set of events this aggregate can produce and apply.
/// - `Error`: command rejection / validation error.
///
/// # Contract
///
/// - [`handle`](Aggregate::handle) must be a pure decision function: no I/O,
///   no side effects, no hidden timestamps. It validates a command against
///   the current state and returns zero or more events, in order.
/// - [`apply`](Aggregate::apply) must be a pure, total function. It takes
///   ownership of the current state and a reference to a domain event,
///   returning the next state.
pub trait Aggregate: Default + Clone + Send + Sync + 'static {
    /// Stream kind this aggregate reads and writes (e.g. `"student"`).
    const KIND: &'static str;

    /// Command type tags this aggregate accepts, in the envelope's `type`
    /// field. Drives bus registration and separates an unsupported command
    /// type from a malformed payload of a supported one.
    const COMMAND_TYPES: &'static [&'static str];

    /// The set of commands this aggregate can handle.
    type Command: Send + 'static;

    /// The set of events this aggregate can produce and apply.
    type DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + 'static;

    /// Command rejection / validation error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The instance id a command targets. Every command payload carries it.
    fn aggregate_id(command: &Self::Command) -> &str;

    /// Validate a command against the current state and produce events.
    ///
    /// Returns `Ok(vec![])` if the command is a no-op.
    /// Returns `Err` to reject the command.
    fn handle(&self, command: Self::Command) -> Result<Vec<Self::DomainEvent>, Self::Error>;

    /// Apply a single event to produce the next state.
    fn apply(self, event: &Self::DomainEvent) -> Self;

    /// Rebuild state by folding envelope events from the default state.
    ///
    /// Events whose type the kind's enum does not know (or whose payload no
    /// longer matches) are skipped, so old state can be rebuilt after new
    /// event types are introduced.
    fn load_from(events: &[Event]) -> Self {
        events.iter().fold(Self::default(), |state, event| {
            match decode_event::<Self::DomainEvent>(event) {
                Some(domain_event) => state.apply(&domain_event),
                None => state,
            }
        })
    }
}

/// Decode a raw command envelope into the aggregate's typed command.
///
/// A `type` that is not in [`Aggregate::COMMAND_TYPES`] fails with
/// [`DispatchError::UnsupportedCommand`]; a recognized type whose payload
/// does not deserialize fails with [`DispatchError::InvalidPayload`].
pub fn decode_command<A>(command: &Command) -> Result<A::Command, DispatchError>
where
    A: Aggregate,
    A::Command: DeserializeOwned,
{
    if !A::COMMAND_TYPES.contains(&command.command_type.as_str()) {
        return Err(DispatchError::UnsupportedCommand(
            command.command_type.clone(),
        ));
    }

    // The typed command enum uses the same adjacently tagged shape as the
    // envelope, so rebuilding `{"type", "payload"}` is enough to decode.
    let tagged = if command.payload.is_null() {
        serde_json::json!({ "type": command.command_type })
    } else {
        serde_json::json!({
            "type": command.command_type,
            "payload": command.payload,
        })
    };

    serde_json::from_value(tagged).map_err(|source| DispatchError::InvalidPayload {
        request_type: command.command_type.clone(),
        source,
    })
}
