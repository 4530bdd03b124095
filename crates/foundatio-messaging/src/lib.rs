//! Type-routed publish/subscribe building block for foundatio.
//!
//! Messages are routed by their concrete type: subscribing for `T` yields
//! every message published as `T`, each subscriber receiving its own copy.
//! Publication can be deferred (`publish_delayed`), subscriptions are
//! cancelled through their `CancellationToken`, and handler failures are
//! isolated per subscription.
//!
//! The object-safe [`MessageBus`] trait is the seam remote brokers
//! implement; [`InMemoryMessageBus`] is the local implementation. The
//! [`MessageEnvelope`] defines the wire shape messages take when a bus
//! crosses a process boundary.

mod bus;
mod config;
mod envelope;
mod error;
mod memory;

pub use bus::{
    ErasedHandler, MessageBody, MessageBus, MessageBusExt, MessagePayload, SubscriptionId,
};
pub use config::InMemoryMessageBusBuilder;
pub use envelope::MessageEnvelope;
pub use error::MessagingError;
pub use memory::InMemoryMessageBus;
