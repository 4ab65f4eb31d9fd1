//! Event-sourced campus records: per-kind append-only logs, aggregates,
//! projections, and string-keyed command/query buses.

mod aggregate;
pub use aggregate::{Aggregate, decode_command};
mod command;
pub use command::{Command, CommandBus, execute_command};
pub mod domain;
pub use domain::Registrar;
mod error;
pub use error::{DispatchError, StoreError};
mod event;
pub use event::{Event, decode_event, encode_domain_event};
mod projection;
pub use projection::{Projection, ProjectionHandle};
mod query;
pub use query::{Query, QueryBus};
mod storage;
mod store;
pub use store::{EventStore, EventStoreBuilder, SubscriberError, Subscription};
